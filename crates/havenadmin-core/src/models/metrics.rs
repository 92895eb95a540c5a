use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::survey::{Features, SurveyResponse};

/// Aggregates served by the backend's `/metrics` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ServerMetrics {
    pub total_responses: u64,
    pub beta_interest_count: u64,
    #[serde(default)]
    pub average_feature_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub usage_frequency_stats: BTreeMap<String, u64>,
    #[serde(default)]
    pub team_size_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub pricing_preferences: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Distributions {
    pub roles: BTreeMap<String, u64>,
    pub cms_usage: BTreeMap<String, u64>,
    pub team_sizes: BTreeMap<String, u64>,
    pub pricing: BTreeMap<String, u64>,
}

/// Dashboard figures computed from the raw survey results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_responses: u64,
    pub beta_interest_count: u64,
    pub feature_scores: BTreeMap<String, f64>,
    pub distributions: Distributions,
}

/// Truncate (not round) to two decimals, matching the backend.
fn truncate_two_decimals(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

impl DashboardMetrics {
    pub fn from_responses(responses: &[SurveyResponse]) -> Self {
        let mut metrics = DashboardMetrics {
            total_responses: responses.len() as u64,
            ..Default::default()
        };

        let mut sums = [0i64; 6];
        for response in responses {
            if response.beta_interest {
                metrics.beta_interest_count += 1;
            }
            for (sum, (_, score)) in sums.iter_mut().zip(response.features.scores()) {
                *sum += i64::from(score);
            }

            let d = &mut metrics.distributions;
            *d.roles.entry(response.display_role().to_string()).or_default() += 1;
            *d.cms_usage.entry(response.cms_usage.clone()).or_default() += 1;
            *d.team_sizes.entry(response.team_size.clone()).or_default() += 1;
            *d.pricing.entry(response.pricing_model.clone()).or_default() += 1;
        }

        for (key, sum) in Features::KEYS.iter().zip(sums) {
            let average = if responses.is_empty() {
                0.0
            } else {
                sum as f64 / responses.len() as f64
            };
            metrics
                .feature_scores
                .insert((*key).to_string(), truncate_two_decimals(average));
        }

        metrics
    }

    /// Share of respondents interested in the beta, 0-100.
    pub fn beta_interest_percent(&self) -> f64 {
        if self.total_responses == 0 {
            return 0.0;
        }
        self.beta_interest_count as f64 * 100.0 / self.total_responses as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Colors>,
}

/// One color for the whole dataset, or one per data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(untagged)]
pub enum Colors {
    Single(String),
    PerPoint(Vec<String>),
}

impl Colors {
    /// Color of the point at `index`
    pub fn at(&self, index: usize) -> Option<&str> {
        match self {
            Colors::Single(color) => Some(color),
            Colors::PerPoint(colors) => colors.get(index).map(String::as_str),
        }
    }
}

/// Chart input: one label per data point, one or more datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Colors cycled through for chart segments.
const PALETTE: [&str; 6] = [
    "#4F46E5", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#06B6D4",
];

/// Label used for answers left blank.
const UNANSWERED_LABEL: &str = "(no answer)";

impl ChartData {
    pub fn from_distribution(label: &str, distribution: &BTreeMap<String, u64>) -> Self {
        let labels = distribution
            .keys()
            .map(|k| {
                if k.is_empty() {
                    UNANSWERED_LABEL.to_string()
                } else {
                    k.clone()
                }
            })
            .collect();
        let data: Vec<f64> = distribution.values().map(|v| *v as f64).collect();
        let background_color = (0..data.len())
            .map(|i| PALETTE[i % PALETTE.len()].to_string())
            .collect();

        Self {
            labels,
            datasets: vec![Dataset {
                label: Some(label.to_string()),
                data,
                background_color: Some(Colors::PerPoint(background_color)),
            }],
        }
    }

    /// Bar chart of average feature scores in the survey's question order.
    pub fn from_feature_scores(scores: &BTreeMap<String, f64>) -> Self {
        let labels: Vec<String> = Features::KEYS.iter().map(|k| k.to_string()).collect();
        let data = Features::KEYS
            .iter()
            .map(|k| scores.get(*k).copied().unwrap_or(0.0))
            .collect();

        Self {
            labels,
            datasets: vec![Dataset {
                label: Some("Average importance".to_string()),
                data,
                background_color: Some(Colors::Single(PALETTE[0].to_string())),
            }],
        }
    }
}
