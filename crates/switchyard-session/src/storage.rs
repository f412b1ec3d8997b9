//! Durable key/value storage behind the session store.
//!
//! Two string entries live here (credential and identity). Backends:
//! - [`MemoryStorage`]: process-local map
//! - [`JsonFileStorage`]: one JSON file with `0o600` permissions
//! - [`SqliteStorage`](crate::sqlite::SqliteStorage): `kv` table in `SQLite`

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// String key/value storage that outlives a single store instance.
pub trait DurableStorage: Send + Sync {
    /// Read a value. Absence is `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage. Clones of an `Arc<MemoryStorage>` share entries.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _ = self
            .entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _ = self.entries.lock().remove(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON file
// ─────────────────────────────────────────────────────────────────────────────

const FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
    #[serde(default)]
    last_updated: String,
}

impl StorageFile {
    fn new() -> Self {
        Self {
            version: FILE_VERSION,
            entries: BTreeMap::new(),
            last_updated: String::new(),
        }
    }
}

/// Storage persisted to a single JSON file.
///
/// Every operation re-reads the file, so several stores (or processes)
/// pointed at the same path observe each other's writes. A missing, corrupt,
/// or wrong-version file reads as empty and is replaced on the next write.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Storage backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StorageFile, StorageError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StorageFile::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<StorageFile>(&data) {
            Ok(file) if file.version == FILE_VERSION => Ok(file),
            Ok(file) => {
                tracing::warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "unsupported session storage version, treating as empty"
                );
                Ok(StorageFile::new())
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to parse session storage, treating as empty"
                );
                Ok(StorageFile::new())
            }
        }
    }

    fn save(&self, file: &mut StorageFile) -> Result<(), StorageError> {
        file.last_updated = chrono::Utc::now().to_rfc3339();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(file)?;
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}

impl DurableStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.entries.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut file = self.load()?;
        let _ = file.entries.insert(key.to_string(), value.to_string());
        self.save(&mut file)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut file = self.load()?;
        if file.entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&mut file)
    }
}
