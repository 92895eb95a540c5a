use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address format accepted for beta program sign-ups.
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("role is required")]
    MissingRole,

    #[error("CMS usage is required")]
    MissingCmsUsage,

    #[error("valid email is required for beta program")]
    InvalidBetaEmail,
}

/// Importance scores (1-5) for each candidate feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Features {
    #[serde(default)]
    pub offline: i32,
    #[serde(default)]
    pub collaboration: i32,
    #[serde(default)]
    pub asset_management: i32,
    #[serde(default)]
    pub pdf_handling: i32,
    #[serde(default)]
    pub version_control: i32,
    #[serde(default)]
    pub workflows: i32,
}

impl Features {
    /// Feature keys in display order, as they appear on the wire.
    pub const KEYS: [&'static str; 6] = [
        "offline",
        "collaboration",
        "assetManagement",
        "pdfHandling",
        "versionControl",
        "workflows",
    ];

    /// Scores paired with their wire keys, in `KEYS` order.
    pub fn scores(&self) -> [(&'static str, i32); 6] {
        [
            ("offline", self.offline),
            ("collaboration", self.collaboration),
            ("assetManagement", self.asset_management),
            ("pdfHandling", self.pdf_handling),
            ("versionControl", self.version_control),
            ("workflows", self.workflows),
        ]
    }
}

/// One submitted survey, as stored and served by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    #[serde(default)]
    pub id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_role: Option<String>,
    pub cms_usage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_cms_usage: Option<String>,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub beta_interest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub biggest_frustrations: String,
    #[serde(default)]
    pub specific_problems: String,
    #[serde(default)]
    pub usage_frequency: String,
    #[serde(default)]
    pub primary_purpose: String,
    #[serde(default)]
    pub platforms: String,
    #[serde(default)]
    pub cms_preference: String,
    #[serde(default)]
    pub wished_features: String,
    #[serde(default)]
    pub workflow_importance: String,
    #[serde(default)]
    pub team_size: String,
    #[serde(default)]
    pub collaboration_frequency: String,
    #[serde(default)]
    pub pricing_sensitivity: String,
    #[serde(default)]
    pub pricing_model: String,
    #[serde(default)]
    pub integrations: String,
    #[serde(default)]
    pub integration_importance: String,
    #[serde(default)]
    pub content_types: String,
    #[serde(default)]
    pub custom_formats: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_suggestions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excitement_factors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration_challenges: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_work_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_workarounds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_change_conflict_handling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_control_challenges: Option<String>,
}

impl SurveyResponse {
    /// Check the fields the backend refuses to store without. Presence is
    /// checked the way the backend does it, so whitespace counts as an answer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.role.is_empty() {
            return Err(ValidationError::MissingRole);
        }
        if self.cms_usage.is_empty() {
            return Err(ValidationError::MissingCmsUsage);
        }
        if self.beta_interest {
            let valid = self
                .email
                .as_deref()
                .map(|e| email_regex().is_match(e))
                .unwrap_or(false);
            if !valid {
                return Err(ValidationError::InvalidBetaEmail);
            }
        }
        Ok(())
    }

    /// Role as entered, preferring the free-text answer when "Other" was picked.
    pub fn display_role(&self) -> &str {
        match self.other_role.as_deref() {
            Some(other) if !other.is_empty() && self.role.eq_ignore_ascii_case("other") => other,
            _ => &self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> SurveyResponse {
        SurveyResponse {
            role: "developer".to_string(),
            cms_usage: "wordpress".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_role_and_cms_usage() {
        assert_eq!(response().validate(), Ok(()));

        let mut missing_role = response();
        missing_role.role.clear();
        assert_eq!(missing_role.validate(), Err(ValidationError::MissingRole));

        // The backend only refuses an empty string
        let mut blank_role = response();
        blank_role.role = "  ".to_string();
        assert_eq!(blank_role.validate(), Ok(()));

        let mut missing_cms = response();
        missing_cms.cms_usage.clear();
        assert_eq!(missing_cms.validate(), Err(ValidationError::MissingCmsUsage));
    }

    #[test]
    fn test_validate_beta_interest_needs_email() {
        let mut beta = response();
        beta.beta_interest = true;
        assert_eq!(beta.validate(), Err(ValidationError::InvalidBetaEmail));

        beta.email = Some("not-an-email".to_string());
        assert_eq!(beta.validate(), Err(ValidationError::InvalidBetaEmail));

        beta.email = Some("alice@example.com".to_string());
        assert_eq!(beta.validate(), Ok(()));
    }

    #[test]
    fn test_deserialize_backend_payload() {
        let json = r#"{
            "id": "5f8c",
            "role": "Other",
            "otherRole": "Archivist",
            "cmsUsage": "none",
            "features": {"offline": 5, "collaboration": 3, "assetManagement": 4,
                         "pdfHandling": 2, "versionControl": 1, "workflows": 3},
            "betaInterest": false,
            "createdAt": "2024-11-02T10:15:00Z",
            "teamSize": "2-5",
            "pricingModel": "subscription",
            "feedbackSuggestions": ""
        }"#;
        let parsed: SurveyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.features.asset_management, 4);
        assert_eq!(parsed.team_size, "2-5");
        assert_eq!(parsed.display_role(), "Archivist");
        assert!(parsed.created_at.is_some());
    }

    #[test]
    fn test_features_scores_follow_key_order() {
        let features = Features {
            offline: 1,
            collaboration: 2,
            asset_management: 3,
            pdf_handling: 4,
            version_control: 5,
            workflows: 6,
        };
        let keys: Vec<&str> = features.scores().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, Features::KEYS);
    }
}
