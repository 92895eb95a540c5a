//! Unverified decoding of JWT claims.
//!
//! The signature is not checked: the backend is the only party that can
//! validate a token. Claims are read solely to stop trusting a locally
//! stored token once its `exp` has passed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub username: Option<String>,
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued-at, seconds since the epoch
    #[serde(default)]
    pub iat: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT. Returns `None` for opaque
    /// tokens or anything that is not a three-segment JWT with a JSON body.
    pub fn decode(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
        if segments.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| DateTime::from_timestamp(iat, 0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned JWT-shaped token with the given claims.
    pub(crate) fn jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.c2lnbmF0dXJl", header, payload)
    }

    #[test]
    fn test_decode_backend_claims() {
        let token = jwt(serde_json::json!({"username": "admin", "exp": 1_900_000_000, "iat": 1_899_913_600}));
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.username.as_deref(), Some("admin"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_900_000_000);
        assert!(claims.issued_at().unwrap() < claims.expires_at().unwrap());
    }

    #[test]
    fn test_opaque_tokens_have_no_claims() {
        assert_eq!(TokenClaims::decode("abc123"), None);
        assert_eq!(TokenClaims::decode("a.b"), None);
        assert_eq!(TokenClaims::decode("a.b.c.d"), None);
        assert_eq!(TokenClaims::decode("a.!!!.c"), None);
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":1}"#);
        let token = format!("h.{}.s", payload);
        assert_eq!(TokenClaims::decode(&token).unwrap().exp, Some(1));
    }
}
