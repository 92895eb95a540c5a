use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::token::TokenClaims;

/// Buffer before expiry after which the session should be renewed (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Whether the client is authenticated, and with which token.
///
/// A token exists exactly when the state is `Authenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated {
        token: String,
        /// Decoded from the token's `exp` claim when it has one
        expires_at: Option<DateTime<Utc>>,
    },
}

impl SessionState {
    pub fn from_token(token: String) -> Self {
        let expires_at = TokenClaims::decode(&token).and_then(|c| c.expires_at());
        SessionState::Authenticated { token, expires_at }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { token, .. } => Some(token),
            SessionState::Anonymous => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SessionState::Authenticated { expires_at, .. } => *expires_at,
            SessionState::Anonymous => None,
        }
    }

    /// Tokens without an expiry claim never expire locally.
    pub fn is_expired(&self) -> bool {
        self.expires_at().map(|e| Utc::now() >= e).unwrap_or(false)
    }

    /// Check if the session will expire soon and should be renewed
    pub fn needs_refresh(&self) -> bool {
        self.expires_at()
            .map(|e| Utc::now() > e - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES))
            .unwrap_or(false)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at().map(|e| e - Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }
}

/// Login credentials. Only ever serialized into the login request body.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    /// The backend answered with a non-success status
    Rejected { reason: String },
    /// The exchange failed: connection, timeout, or an undecodable body
    TransportFailure { reason: String },
    /// The token was issued but could not be persisted
    StorageFailure { reason: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Authenticated)
    }

    /// Message suitable for showing to the person logging in
    pub fn user_message(&self) -> &'static str {
        match self {
            LoginOutcome::Authenticated => "Login successful",
            LoginOutcome::Rejected { .. } => "Invalid username or password",
            LoginOutcome::TransportFailure { .. } => "Unable to reach the server. Please try again.",
            LoginOutcome::StorageFailure { .. } => "Logged in, but the session could not be saved",
        }
    }
}

/// Result of checking the current token with the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid { username: Option<String> },
    /// The backend refused the token; the session has been cleared
    Invalid,
    /// The backend could not be asked; the session is unchanged
    Unreachable { reason: String },
    NotAuthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::tests::jwt;

    #[test]
    fn test_token_presence_matches_authentication() {
        let anonymous = SessionState::default();
        assert!(!anonymous.is_authenticated());
        assert_eq!(anonymous.token(), None);

        let authenticated = SessionState::from_token("abc123".to_string());
        assert!(authenticated.is_authenticated());
        assert_eq!(authenticated.token(), Some("abc123"));
        assert_eq!(authenticated.expires_at(), None);
        assert!(!authenticated.is_expired());
        assert!(!authenticated.needs_refresh());
    }

    #[test]
    fn test_expiry_from_claims() {
        let past = (Utc::now() - Duration::hours(1)).timestamp();
        let expired = SessionState::from_token(jwt(serde_json::json!({"exp": past})));
        assert!(expired.is_expired());
        assert_eq!(expired.minutes_until_expiry(), Some(0));

        let soon = (Utc::now() + Duration::minutes(3)).timestamp();
        let expiring = SessionState::from_token(jwt(serde_json::json!({"exp": soon})));
        assert!(!expiring.is_expired());
        assert!(expiring.needs_refresh());

        let later = (Utc::now() + Duration::hours(24)).timestamp();
        let fresh = SessionState::from_token(jwt(serde_json::json!({"exp": later})));
        assert!(!fresh.needs_refresh());
        assert!(fresh.minutes_until_expiry().unwrap() > 60);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_login_outcome_boolean() {
        assert!(LoginOutcome::Authenticated.is_success());
        assert!(!LoginOutcome::Rejected { reason: "401".into() }.is_success());
        assert_ne!(
            LoginOutcome::Rejected { reason: String::new() }.user_message(),
            LoginOutcome::TransportFailure { reason: String::new() }.user_message()
        );
    }
}
