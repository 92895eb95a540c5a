//! Formatting helpers for terminal output.

pub mod format;

pub use format::{format_date, format_expiry, format_percent, truncate_string};
