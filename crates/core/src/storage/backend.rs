//! Key-value persistence media backing the token store

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// String-keyed, string-valued storage in the style of browser local storage
pub trait StorageBackend: Send + Sync + fmt::Debug {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> CoreResult<()>;
    fn remove_item(&self, key: &str) -> CoreResult<()>;
    fn keys(&self) -> CoreResult<Vec<String>>;
}

/// In-process storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> CoreError {
    CoreError::storage(format!("{what} lock poisoned"))
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>> {
        let items = self.items.read().map_err(|_| poisoned("memory storage"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut items = self.items.write().map_err(|_| poisoned("memory storage"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        let mut items = self.items.write().map_err(|_| poisoned("memory storage"))?;
        items.remove(key);
        Ok(())
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        let items = self.items.read().map_err(|_| poisoned("memory storage"))?;
        Ok(items.keys().cloned().collect())
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// Every operation re-reads the file so several processes sharing the same
/// data directory observe each other's writes (last write wins).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CoreResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, items: &BTreeMap<String, String>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> CoreResult<()> {
        let _lock = self.guard.lock().map_err(|_| poisoned("file storage"))?;
        let mut items = self.load()?;
        f(&mut items);
        self.store(&items)
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>> {
        let _lock = self.guard.lock().map_err(|_| poisoned("file storage"))?;
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        self.update(|items| {
            items.remove(key);
        })
    }

    fn keys(&self) -> CoreResult<Vec<String>> {
        let _lock = self.guard.lock().map_err(|_| poisoned("file storage"))?;
        Ok(self.load()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("token").unwrap(), None);

        storage.set_item("token", "\"abc\"").unwrap();
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("\"abc\""));

        storage.remove_item("token").unwrap();
        assert_eq!(storage.get_item("token").unwrap(), None);
    }

    #[test]
    fn file_storage_persists_between_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local-storage.json");

        let first = FileStorage::new(&path);
        first.set_item("refreshToken", "\"r-1\"").unwrap();
        first.set_item("darkMode", "true").unwrap();

        let second = FileStorage::new(&path);
        assert_eq!(second.get_item("refreshToken").unwrap().as_deref(), Some("\"r-1\""));
        assert_eq!(second.keys().unwrap(), vec!["darkMode", "refreshToken"]);

        second.remove_item("refreshToken").unwrap();
        assert_eq!(first.get_item("refreshToken").unwrap(), None);
    }

    #[test]
    fn file_storage_treats_missing_or_empty_file_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local-storage.json");

        let storage = FileStorage::new(&path);
        assert!(storage.keys().unwrap().is_empty());

        fs::write(&path, "  ").unwrap();
        assert_eq!(storage.get_item("token").unwrap(), None);
    }

    #[test]
    fn file_storage_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local-storage.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileStorage::new(&path).get_item("token").unwrap_err();
        assert!(matches!(err, CoreError::Serialization { .. }));
    }
}
