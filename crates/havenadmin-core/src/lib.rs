//! Core library for the LocalHaven survey admin client.
//!
//! - `auth`: the client-side session store and its observers
//! - `storage`: key-value and cookie persistence backends
//! - `api`: HTTP client for the survey backend
//! - `config`: configuration file and API base URL resolution
//! - `models`: survey, metrics and chart types
//! - `utils`: display formatting helpers

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{Credentials, LoginOutcome, SessionState, SessionStore, Subscription, VerifyOutcome};
pub use config::{ApiSettings, Config, StorageBackend};
