//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionStore`: owns the session state, performs login/logout,
//!   restores the session at startup and notifies observers
//! - `SessionState`: anonymous, or authenticated with a token
//! - `TokenClaims`: unverified JWT claims used for local expiry
//!
//! The token is mirrored into a key-value store and a cookie; the
//! key-value copy is the one read back on startup.

mod observers;
pub mod state;
pub mod store;
pub mod token;

pub use observers::Subscription;
pub use state::{Credentials, LoginOutcome, SessionState, VerifyOutcome};
pub use store::{SessionStore, TOKEN_COOKIE, TOKEN_KEY};
pub use token::TokenClaims;
