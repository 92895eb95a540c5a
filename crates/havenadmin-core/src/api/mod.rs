//! REST API client module for the LocalHaven survey backend.
//!
//! This module provides the `ApiClient` for logging in, verifying the
//! session token, and fetching survey results and metrics.
//!
//! The admin endpoints use JWT bearer token authentication obtained
//! through `POST /login`.

pub mod client;
pub mod error;

pub use client::{ApiClient, HealthStatus, VerifyResponse, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
