//! Persistent key/value store
//!
//! Every durable collection (watchlist, notifications, discovery cache and
//! timestamps) is a JSON string stored under a versioned key. A schema
//! change bumps the key suffix: the old key is simply never read again and
//! the new one starts empty.

use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::APP_NAME;

pub const WATCHLIST_KEY: &str = "modinfo_watchlist_v2";
pub const NOTIFICATIONS_KEY: &str = "modinfo_notifications_v3";
pub const DISCOVER_CACHE_KEY: &str = "modinfo_discover_cache_v1";
pub const DISCOVER_TIME_KEY: &str = "modinfo_discover_time_v1";
pub const LAST_REFRESH_KEY: &str = "modinfo_last_refresh_v1";
pub const SEEN_DISCOVERY_KEY: &str = "modinfo_seen_discovery_v1";
pub const SEEN_RELEASES_KEY: &str = "modinfo_seen_releases_v1";

/// Errors that can occur when reading or writing the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable storage of opaque strings
pub trait Store: Send + Sync {
    /// Returns the stored value, or `None` if the key was never written
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Stores each key as a JSON file in a directory
///
/// Uses `~/.local/share/modinfo-plus/` on Linux, or the equivalent XDG
/// data path on other platforms.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store in the XDG data directory
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", APP_NAME)?;
        Some(Self {
            dir: project_dirs.data_dir().to_path_buf(),
        })
    }

    /// Creates a store in a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        // Write-then-rename so a crash mid-write leaves the old value intact
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(tmp, self.path(key))?;
        Ok(())
    }
}

/// Non-durable store used when no data directory is available, and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads and decodes a collection, falling back to its default
///
/// A missing key is the normal first-run state. Unreadable or undecodable
/// data is logged and replaced by the default so start-up never fails.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn Store, key: &str) -> T {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Stored value is not decodable, starting empty");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            error!(key, error = %e, "Failed to read store, starting empty");
            T::default()
        }
    }
}

/// Encodes and writes a value
pub fn save<T: Serialize + ?Sized>(
    store: &dyn Store,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    store.put(key, &json)
}

/// Encodes and writes a value, logging instead of failing
///
/// Returns whether the write succeeded. On failure the in-memory state is
/// still authoritative; it just will not survive a restart.
pub fn persist<T: Serialize + ?Sized>(store: &dyn Store, key: &str, value: &T) -> bool {
    match save(store, key, value) {
        Ok(()) => true,
        Err(e) => {
            error!(key, error = %e, "Failed to persist, continuing without durability");
            false
        }
    }
}
