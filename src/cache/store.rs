//! Key-value storage backends for the response cache
//!
//! The cache never talks to a concrete global store. It is handed something
//! implementing [`KeyValueStore`], which can be an in-memory map (tests, short
//! lived processes) or a JSON document on disk (the CLI).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use directories::ProjectDirs;
use thiserror::Error;
use tracing::warn;

/// File name used by [`FileStore::new`] inside the platform cache directory
const STORE_FILE_NAME: &str = "store.json";

/// Errors raised by a key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write would exceed the store's capacity
    #[error("Storage quota exceeded: {used} of {limit} bytes in use")]
    QuotaExceeded { used: usize, limit: usize },

    /// Reading or writing the backing file failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The backing document could not be encoded or decoded
    #[error("Storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store is in an unusable state
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string-to-string persistent store, shaped like browser local storage.
pub trait KeyValueStore {
    /// Returns the raw value for `key`, or `None` if it is not set
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key currently in the store
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
}

/// Total bytes a map would occupy, counting keys and values
fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Returns the size the map would have after replacing `key` with `value`
fn size_after_set(entries: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    used_bytes(entries) - replaced + key.len() + value.len()
}

/// In-memory store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Creates an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that rejects writes once keys plus values
    /// would exceed `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries)?;
        if let Some(limit) = self.quota_bytes {
            let used = size_after_set(&entries, key, value);
            if used > limit {
                return Err(StoreError::QuotaExceeded { used, limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.entries)?.keys().cloned().collect())
    }
}

/// Store persisted as a single JSON object on disk
///
/// Every operation re-reads the file so separate processes sharing the same
/// path see each other's writes. A missing file is an empty store; a corrupt
/// file is logged and treated as empty, and is replaced by the next write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    quota_bytes: Option<usize>,
    guard: Mutex<()>,
}

impl FileStore {
    /// Creates a FileStore in the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/booth/store.json` on Linux, or the platform equivalent.
    /// Returns `None` if no home directory can be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "booth")?;
        Some(Self::with_path(project_dirs.cache_dir().join(STORE_FILE_NAME)))
    }

    /// Creates a FileStore backed by a specific file
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            quota_bytes: None,
            guard: Mutex::new(()),
        }
    }

    /// Limits the total size of keys plus values held in the file
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), "Store file is corrupt, treating as empty: {}", e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = lock(&self.guard)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard)?;
        let mut entries = self.load()?;
        if let Some(limit) = self.quota_bytes {
            let used = size_after_set(&entries, key, value);
            if used > limit {
                return Err(StoreError::QuotaExceeded { used, limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard)?;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let _guard = lock(&self.guard)?;
        Ok(self.load()?.into_keys().collect())
    }
}
