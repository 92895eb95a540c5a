use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expiry written when clearing a cookie.
const CLEARED_EXPIRY_TIMESTAMP: i64 = 1;

/// Format used for the `Expires` attribute (RFC 1123, always GMT).
const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub same_site: Option<SameSite>,
    pub secure: bool,
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// A root-path, same-site, secure session cookie.
    pub fn session(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: Some("/".to_string()),
            same_site: Some(SameSite::Strict),
            secure: true,
            expires: None,
        }
    }

    /// An empty root-path cookie dated in the past, which removes `name`.
    pub fn expired(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            path: Some("/".to_string()),
            same_site: None,
            secure: false,
            expires: Some(DateTime::from_timestamp(CLEARED_EXPIRY_TIMESTAMP, 0).unwrap_or_default()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires.map(|e| e <= Utc::now()).unwrap_or(false)
    }

    /// Render as a `document.cookie` / `Set-Cookie` attribute string.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(ref path) = self.path {
            out.push_str(&format!("; Path={}", path));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!("; Expires={}", expires.format(EXPIRES_FORMAT)));
        }
        if let Some(same_site) = self.same_site {
            out.push_str(&format!("; SameSite={}", same_site));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}
