//! The client-side session store.
//!
//! Owns the in-memory `SessionState` and is its only writer. Every change
//! goes through one path that also keeps the persisted token copies in
//! lockstep: the key-value store (canonical, read back by `initialize`)
//! and the cookie (written for the server, never read back here).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::{Config, StorageBackend};
use crate::storage::{Cookie, CookieJar, FileCookieJar, FileStore, KeyValueStore, KeyringStore};

use super::observers::{Observers, Subscription};
use super::{Credentials, LoginOutcome, SessionState, VerifyOutcome};

/// Key the token is stored under in the key-value store
pub const TOKEN_KEY: &str = "token";

/// Name of the cookie carrying the token
pub const TOKEN_COOKIE: &str = "token";

pub struct SessionStore {
    api: ApiClient,
    storage: Box<dyn KeyValueStore>,
    cookies: Box<dyn CookieJar>,
    state: SessionState,
    observers: Observers,
    watch_tx: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(
        api: ApiClient,
        storage: impl KeyValueStore + 'static,
        cookies: impl CookieJar + 'static,
    ) -> Self {
        let (watch_tx, _) = watch::channel(SessionState::Anonymous);
        Self {
            api,
            storage: Box::new(storage),
            cookies: Box::new(cookies),
            state: SessionState::Anonymous,
            observers: Observers::default(),
            watch_tx,
        }
    }

    /// Build a store from configuration: API location from the environment
    /// and config file, token copies in the configured backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = ApiClient::new(config.api_settings().resolve(), config.request_timeout())?;
        let dir = config.storage_dir()?;
        let cookies = FileCookieJar::in_dir(&dir);

        let store = match config.storage {
            StorageBackend::File => Self::new(api, FileStore::in_dir(&dir), cookies),
            StorageBackend::Keyring => Self::new(api, KeyringStore::default(), cookies),
        };
        debug!(api = store.api.base_url(), dir = %dir.display(), backend = ?config.storage, "Session store created");
        Ok(store)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// API client carrying the current token (if any)
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Register an observer. It is called once right away with the current
    /// state, then on every change until the returned handle is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        let subscription = self.observers.add(observer.clone());
        observer(&self.state);
        subscription
    }

    /// Receiver for async consumers; starts at the current state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.watch_tx.subscribe()
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        match state.token() {
            Some(token) => self.api.set_token(token.to_string()),
            None => self.api.clear_token(),
        }
        self.state = state;
        self.watch_tx.send_replace(self.state.clone());
        self.observers.notify(&self.state);
    }

    /// Exchange credentials for a token and persist it.
    ///
    /// Never fails past this boundary: every failure is reported through
    /// the outcome and leaves the session untouched.
    pub async fn login(&mut self, username: &str, password: &str) -> LoginOutcome {
        let credentials = Credentials::new(username, password);

        let token = match self.api.login(&credentials).await {
            Ok(token) => token,
            Err(e) => return Self::classify_login_error(e),
        };

        if let Err(e) = self.persist_token(&token) {
            error!(error = %format!("{:#}", e), "Failed to persist session token");
            return LoginOutcome::StorageFailure {
                reason: format!("{:#}", e),
            };
        }

        self.set_state(SessionState::from_token(token));
        info!("Login successful");
        LoginOutcome::Authenticated
    }

    fn classify_login_error(e: anyhow::Error) -> LoginOutcome {
        match e.downcast_ref::<ApiError>() {
            Some(api_error) if api_error.is_server_answer() => {
                debug!(error = %api_error, "Login rejected");
                LoginOutcome::Rejected {
                    reason: api_error.to_string(),
                }
            }
            _ => {
                let reason = format!("{:#}", e);
                error!(error = %reason, "Login error");
                LoginOutcome::TransportFailure { reason }
            }
        }
    }

    /// Write both copies of the token. If the cookie cannot be written the
    /// key-value entry is restored so the two never disagree.
    fn persist_token(&self, token: &str) -> Result<()> {
        let previous = self.storage.get(TOKEN_KEY).unwrap_or(None);

        self.storage
            .set(TOKEN_KEY, token)
            .context("Failed to store token")?;

        if let Err(e) = self.cookies.set(Cookie::session(TOKEN_COOKIE, token)) {
            let restored = match previous {
                Some(ref value) => self.storage.set(TOKEN_KEY, value),
                None => self.storage.remove(TOKEN_KEY),
            };
            if let Err(restore_error) = restored {
                warn!(error = %restore_error, "Failed to roll back stored token");
            }
            return Err(e).context("Failed to set token cookie");
        }
        Ok(())
    }

    /// Clear both token copies and return to anonymous. Safe to repeat.
    pub fn logout(&mut self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            warn!(error = %e, "Failed to remove stored token");
        }
        if let Err(e) = self.cookies.set(Cookie::expired(TOKEN_COOKIE)) {
            warn!(error = %e, "Failed to expire token cookie");
        }
        self.set_state(SessionState::Anonymous);
        debug!("Logged out");
    }

    /// Restore the session from the key-value store. Reads only: no network
    /// I/O, no storage writes. An absent or expired token leaves the state
    /// as it is.
    pub fn initialize(&mut self) {
        match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => {
                let state = SessionState::from_token(token);
                if state.is_expired() {
                    info!("Stored token has expired, not restoring session");
                    return;
                }
                self.set_state(state);
                debug!("Session restored from storage");
            }
            Ok(_) => debug!("No stored token"),
            Err(e) => warn!(error = %e, "Failed to read stored token"),
        }
    }

    /// Log out if the current token's expiry has passed. Returns whether
    /// the session was ended.
    pub fn expire_if_stale(&mut self) -> bool {
        if self.state.is_authenticated() && self.state.is_expired() {
            info!("Session token expired");
            self.logout();
            return true;
        }
        false
    }

    /// Ask the backend whether the current token is still accepted. A
    /// refused token ends the session; an unreachable backend does not.
    pub async fn verify(&mut self) -> VerifyOutcome {
        if !self.state.is_authenticated() {
            return VerifyOutcome::NotAuthenticated;
        }

        match self.api.verify().await {
            Ok(response) if response.valid => VerifyOutcome::Valid {
                username: response.username,
            },
            Ok(_) => {
                info!("Backend reported token as invalid");
                self.logout();
                VerifyOutcome::Invalid
            }
            Err(e) => match e.downcast_ref::<ApiError>() {
                Some(api_error) if api_error.is_auth_failure() => {
                    info!(error = %api_error, "Token refused by backend");
                    self.logout();
                    VerifyOutcome::Invalid
                }
                _ => {
                    let reason = format!("{:#}", e);
                    warn!(error = %reason, "Could not verify session");
                    VerifyOutcome::Unreachable { reason }
                }
            },
        }
    }
}
