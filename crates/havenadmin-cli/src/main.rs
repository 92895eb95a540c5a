//! havenadmin - command-line admin client for the LocalHaven survey.
//!
//! Logs in against the survey backend, keeps the session token in local
//! storage between runs, and shows survey results and dashboard metrics.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use havenadmin_core::models::{ChartData, DashboardMetrics, SurveyResponse};
use havenadmin_core::utils::{format_date, format_expiry, format_percent, truncate_string};
use havenadmin_core::{Config, LoginOutcome, SessionState, SessionStore, VerifyOutcome};

/// Width of the free-text column in result listings
const ANSWER_COLUMN_WIDTH: usize = 40;

/// Width of the widest bar in distribution charts
const BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "havenadmin", version, about = "Admin client for the LocalHaven survey")]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Show the current session
    Status,
    /// Check the stored token with the backend
    Verify,
    /// List survey responses
    Results {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Delete a survey response
    Delete { id: String },
    /// Show backend metrics
    Metrics,
    /// Show dashboard figures computed from the raw results
    Dashboard,
    /// Check that the backend is up
    Health,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().context("Log file path has no file name")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;
    debug!("havenadmin starting");

    let mut config = Config::load()?;
    let mut store = SessionStore::from_config(&config)?;
    let _subscription = store.subscribe(|state| {
        debug!(authenticated = state.is_authenticated(), "Session state changed");
    });
    store.initialize();

    match cli.command {
        Command::Login { username } => login(&mut store, &mut config, username).await,
        Command::Logout => {
            store.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Status => {
            store.expire_if_stale();
            print_status(store.state());
            Ok(())
        }
        Command::Verify => verify(&mut store).await,
        Command::Results { limit } => {
            require_session(&mut store)?;
            let results = store.api().fetch_results().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results, limit);
            }
            Ok(())
        }
        Command::Delete { id } => {
            require_session(&mut store)?;
            let message = store.api().delete_result(&id).await?;
            info!(id = %id, "Deleted survey response");
            println!("{}", message);
            Ok(())
        }
        Command::Metrics => {
            require_session(&mut store)?;
            let metrics = store.api().fetch_metrics().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("Responses:      {}", metrics.total_responses);
                println!("Beta interest:  {}", metrics.beta_interest_count);
                print_scores(&metrics.average_feature_scores);
                print_distribution("Usage frequency", &metrics.usage_frequency_stats);
                print_distribution("Team size", &metrics.team_size_distribution);
                print_distribution("Pricing", &metrics.pricing_preferences);
            }
            Ok(())
        }
        Command::Dashboard => dashboard(&mut store, cli.json).await,
        Command::Health => {
            let health = store.api().health().await?;
            println!("{} ({})", health.status, store.api().base_url());
            Ok(())
        }
    }
}

async fn login(store: &mut SessionStore, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| std::env::var("HAVEN_USERNAME").ok()) {
        Some(u) => u,
        None => prompt_username(config.last_username.as_deref())?,
    };
    let password = match std::env::var("HAVEN_PASSWORD") {
        Ok(p) => p,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    if username.is_empty() || password.is_empty() {
        bail!("Username and password required");
    }

    match store.login(&username, &password).await {
        LoginOutcome::Authenticated => {
            config.last_username = Some(username);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Logged in ({})", format_expiry(store.state().minutes_until_expiry()));
            Ok(())
        }
        outcome => bail!("{}", outcome.user_message()),
    }
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => eprint!("Username [{}]: ", last),
        None => eprint!("Username: "),
    }
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let entered = line.trim();
    Ok(match (entered.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => entered.to_string(),
    })
}

async fn verify(store: &mut SessionStore) -> Result<()> {
    match store.verify().await {
        VerifyOutcome::Valid { username } => {
            println!("Token valid for {}", username.as_deref().unwrap_or("unknown user"));
            Ok(())
        }
        VerifyOutcome::Invalid => bail!("Token rejected; session cleared. Please log in again."),
        VerifyOutcome::Unreachable { reason } => bail!("Could not reach the backend: {}", reason),
        VerifyOutcome::NotAuthenticated => bail!("Not logged in"),
    }
}

fn require_session(store: &mut SessionStore) -> Result<()> {
    if store.expire_if_stale() {
        bail!("Session expired. Please log in again.");
    }
    if !store.is_authenticated() {
        bail!("Not logged in. Run `havenadmin login` first.");
    }
    Ok(())
}

async fn dashboard(store: &mut SessionStore, json: bool) -> Result<()> {
    require_session(store)?;
    let api = store.api().clone();
    let (results, server) = futures::try_join!(api.fetch_results(), api.fetch_metrics())?;
    let metrics = DashboardMetrics::from_responses(&results);

    if json {
        let charts = serde_json::json!({
            "metrics": metrics,
            "charts": {
                "features": ChartData::from_feature_scores(&metrics.feature_scores),
                "roles": ChartData::from_distribution("Roles", &metrics.distributions.roles),
                "cmsUsage": ChartData::from_distribution("CMS usage", &metrics.distributions.cms_usage),
                "teamSizes": ChartData::from_distribution("Team size", &metrics.distributions.team_sizes),
                "pricing": ChartData::from_distribution("Pricing", &metrics.distributions.pricing),
            }
        });
        println!("{}", serde_json::to_string_pretty(&charts)?);
        return Ok(());
    }

    println!("Responses:      {}", metrics.total_responses);
    println!(
        "Beta interest:  {} ({})",
        metrics.beta_interest_count,
        format_percent(metrics.beta_interest_percent())
    );
    if server.total_responses != metrics.total_responses {
        // The backend caches results for a few minutes
        println!("(backend reports {} responses)", server.total_responses);
    }
    print_scores(&metrics.feature_scores);
    print_distribution("Roles", &metrics.distributions.roles);
    print_distribution("CMS usage", &metrics.distributions.cms_usage);
    print_distribution("Team size", &metrics.distributions.team_sizes);
    print_distribution("Pricing", &metrics.distributions.pricing);
    Ok(())
}

fn print_status(state: &SessionState) {
    match state {
        SessionState::Anonymous => println!("Not logged in"),
        SessionState::Authenticated { .. } => {
            println!("Logged in ({})", format_expiry(state.minutes_until_expiry()));
            if state.needs_refresh() {
                println!("Session expires soon; log in again to renew it");
            }
        }
    }
}

fn print_results(results: &[SurveyResponse], limit: Option<usize>) {
    let shown = limit.unwrap_or(results.len()).min(results.len());
    for response in &results[..shown] {
        println!(
            "{:<36}  {:<12}  {:<18}  {:<14}  {}",
            response.id,
            format_date(response.created_at),
            truncate_string(response.display_role(), 18),
            truncate_string(&response.cms_usage, 14),
            truncate_string(&response.biggest_frustrations, ANSWER_COLUMN_WIDTH),
        );
    }
    println!("{} of {} responses", shown, results.len());
}

fn print_scores(scores: &std::collections::BTreeMap<String, f64>) {
    let chart = ChartData::from_feature_scores(scores);
    println!("\nFeature importance (avg of 5):");
    for (label, value) in chart.labels.iter().zip(&chart.datasets[0].data) {
        println!("  {:<16} {:.2}", label, value);
    }
}

fn print_distribution(title: &str, distribution: &std::collections::BTreeMap<String, u64>) {
    let chart = ChartData::from_distribution(title, distribution);
    let max = chart.datasets[0].data.iter().cloned().fold(0.0, f64::max);
    println!("\n{}:", title);
    for (label, value) in chart.labels.iter().zip(&chart.datasets[0].data) {
        let width = if max > 0.0 { (value / max * BAR_WIDTH as f64).round() as usize } else { 0 };
        println!("  {:<20} {:>5}  {}", truncate_string(label, 20), value, "#".repeat(width));
    }
}
