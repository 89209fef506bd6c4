//! Key-value backends for the session store
//!
//! - `MemoryStore`: process-local map, optional byte quota
//! - `FileStore`: one JSON object file, rewritten atomically on every change

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use thiserror::Error;

/// Backend fault. Never escapes `SessionStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Synchronous string key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push keys + values over `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let items = self.items.read().map_err(|_| StoreError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| StoreError::Poisoned)?;

        if let Some(quota) = self.quota {
            let needed: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
                + key.len()
                + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| StoreError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// File backend: a JSON object of string values
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = private_file(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Current contents for a read-modify-write. Only an unparseable file
    /// counts as empty; IO faults propagate so other keys are not lost.
    fn load_for_write(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.load() {
            Err(StoreError::Serialization(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Replacing corrupt session file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }
}

/// Truncating writer readable by the owner only
#[cfg(unix)]
fn private_file(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation; a leftover temp file keeps its bits
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn private_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut items = self.load_for_write()?;
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut items = self.load_for_write()?;
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set_item("k", "one").unwrap();
        store.set_item("k", "two").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.len(), 1);

        store.remove_item("k").unwrap();
        assert!(store.get_item("k").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(10);
        store.set_item("ab", "cdef").unwrap();
        let err = store.set_item("gh", "ijklmn").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { needed: 14, quota: 10 }));

        // Replacing an existing key only counts the new value
        store.set_item("ab", "12345678").unwrap();
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileStore::new(&path);
        store.set_item("token", "A1").unwrap();
        drop(store);

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get_item("token").unwrap().as_deref(), Some("A1"));
        assert!(reopened.get_item("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get_item("token"),
            Err(StoreError::Serialization(_))
        ));

        store.set_item("token", "A2").unwrap();
        assert_eq!(store.get_item("token").unwrap().as_deref(), Some("A2"));
    }

    #[test]
    fn test_file_store_io_error_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the session path cannot be read as a file
        let path = dir.path().join("session.json");
        std::fs::create_dir(&path).unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get_item("token"), Err(StoreError::Io(_))));
        assert!(matches!(store.set_item("token", "A1"), Err(StoreError::Io(_))));
        assert!(matches!(store.remove_item("token"), Err(StoreError::Io(_))));
        assert!(path.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::new(&path);
        store.set_item("paydesk:refresh", "R1").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // Rewrites keep the same bits
        store.set_item("paydesk:token", "A1").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }
}
