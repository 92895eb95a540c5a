//! Client-side persistence for the session token.
//!
//! Two independent mechanisms hold a copy of the token:
//! - a durable `KeyValueStore` (canonical, read back at startup)
//! - a `CookieJar` (derived copy, forwarded to the server)
//!
//! Backends: in-memory (tests, embedding), JSON file, and the OS keychain.

pub mod cookie;
pub mod file;
pub mod keychain;
pub mod memory;

use anyhow::Result;

pub use cookie::{Cookie, SameSite};
pub use file::{FileCookieJar, FileStore};
pub use keychain::KeyringStore;
pub use memory::{MemoryCookieJar, MemoryStore};

/// Durable string key-value storage scoped to one origin.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Cookie storage with browser semantics: setting a cookie whose expiry
/// has passed deletes it.
pub trait CookieJar: Send + Sync {
    fn set(&self, cookie: Cookie) -> Result<()>;

    fn get(&self, name: &str) -> Result<Option<Cookie>>;
}
