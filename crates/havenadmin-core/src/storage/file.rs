use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::{Cookie, CookieJar, KeyValueStore};

/// Key-value store file name in the storage directory
pub const STORE_FILE: &str = "storage.json";

/// Cookie jar file name in the storage directory
pub const COOKIE_FILE: &str = "cookies.json";

fn read_map<V: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, V>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read the map about to be rewritten. A file that no longer parses is
/// treated as empty so the write replaces it instead of failing forever.
fn read_map_for_write<V: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, V>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str(&contents) {
        Ok(map) => Ok(map),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Discarding unreadable storage file");
            Ok(BTreeMap::new())
        }
    }
}

/// Write through a sibling temp file so a crash never leaves a truncated file.
fn write_map<V: Serialize>(path: &Path, map: &BTreeMap<String, V>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(map)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Key-value store persisted as a JSON object. The file is only created
/// on the first write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<dir>/storage.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow!("storage lock poisoned"))?;
        let mut map = read_map_for_write(&self.path)?;
        f(&mut map);
        write_map(&self.path, &map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut map: BTreeMap<String, String> = read_map(&self.path)?;
        Ok(map.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.modify(|map| {
            map.remove(key);
        })
    }
}

/// Cookie jar persisted as a JSON object keyed by cookie name.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Jar at `<dir>/cookies.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(COOKIE_FILE))
    }
}

impl CookieJar for FileCookieJar {
    fn set(&self, cookie: Cookie) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| anyhow!("cookie lock poisoned"))?;
        if cookie.is_expired() && !self.path.exists() {
            return Ok(());
        }
        let mut cookies: BTreeMap<String, Cookie> = read_map_for_write(&self.path)?;
        if cookie.is_expired() {
            cookies.remove(&cookie.name);
        } else {
            cookies.insert(cookie.name.clone(), cookie);
        }
        write_map(&self.path, &cookies)
    }

    fn get(&self, name: &str) -> Result<Option<Cookie>> {
        let mut cookies: BTreeMap<String, Cookie> = read_map(&self.path)?;
        Ok(cookies.remove(name).filter(|c| !c.is_expired()))
    }
}
