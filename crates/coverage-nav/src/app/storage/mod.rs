//! Local key/value storage used by the app.
//!
//! A single trait `StorageBackend` with a file-backed implementation that
//! keeps a JSON map of string keys to string values. It holds the last loaded
//! area id and the driven segment ids the demo persistence sink records.
//!
//! The abstraction exposes string-level APIs and free `save_json_backend` /
//! `load_json_backend` helpers that use `serde` for structured values.

use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Key holding the last successfully loaded area id
pub const LAST_AREA_KEY: &str = "last_area";

/// Key holding the persisted driven segment ids of an area
pub fn coverage_key(area_id: &str) -> String {
    format!("coverage/{area_id}")
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Platform storage error: {0}")]
    Platform(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Simple generic storage backend trait.
///
/// Keys and values are UTF-8 strings. Structured values go through the free
/// JSON helpers so the trait stays object-safe.
pub trait StorageBackend: Send + Sync {
    /// Store a string value for a key.
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read a string value for a key. Returns Ok(None) when key is missing.
    fn get_string(&self, key: &str) -> StorageResult<Option<String>>;
}

pub fn save_json_backend<T: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    match serde_json::to_string(value) {
        Ok(s) => backend.set_string(key, &s),
        Err(e) => Err(StorageError::Json(e.to_string())),
    }
}

pub fn load_json_backend<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> StorageResult<Option<T>> {
    match backend.get_string(key)? {
        Some(s) => match serde_json::from_str::<T>(&s) {
            Ok(v) => Ok(Some(v)),
            Err(e) => Err(StorageError::Json(e.to_string())),
        },
        None => Ok(None),
    }
}

/// File-based storage: a single JSON file which is a map of key -> string value.
///
/// On init the file is read into memory; every mutation writes it back
/// synchronously.
pub struct FileStorage {
    /// Path to the backing JSON file.
    path: PathBuf,
    /// In-memory copy of key -> value
    inner: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Default storage file path for the current user:
    /// - On Windows: %APPDATA%/CoverageNav/storage.json
    /// - Else: $HOME/.config/coverage-nav/storage.json
    fn default_storage_path() -> PathBuf {
        if cfg!(windows)
            && let Ok(appdata) = std::env::var("APPDATA")
        {
            return Path::new(&appdata).join("CoverageNav").join("storage.json");
        }

        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home)
                .join(".config")
                .join("coverage-nav")
                .join("storage.json");
        }

        // Fallback to current directory
        Path::new(".").join("coverage-nav-storage.json")
    }

    pub fn new_with_path(path: Option<PathBuf>) -> StorageResult<Self> {
        let path = path.unwrap_or_else(Self::default_storage_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create storage parent directory: {e}"))
            })?;
        }

        let mut map: HashMap<String, String> = HashMap::new();
        if path.exists() {
            let s = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read storage file: {e}")))?;
            if !s.trim().is_empty() {
                map = serde_json::from_str(&s).map_err(|e| {
                    StorageError::Json(format!("Failed to parse storage JSON: {e}"))
                })?;
            }
        }
        tracing::debug!(path = %path.display(), keys = map.len(), "Opened storage");

        Ok(FileStorage {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Platform(format!("mutex poisoned: {e:?}")))
    }

    fn flush_locked(&self, locked: &HashMap<String, String>) -> StorageResult<()> {
        let s =
            serde_json::to_string_pretty(locked).map_err(|e| StorageError::Json(e.to_string()))?;
        fs::write(&self.path, s).map_err(|e| StorageError::Io(format!("write failed: {e}")))
    }
}

impl StorageBackend for FileStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.lock()?;
        guard.insert(key.to_string(), value.to_string());
        self.flush_locked(&guard)
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A fresh storage file under the system temp directory
    pub(crate) fn temp_storage(name: &str) -> FileStorage {
        let path = std::env::temp_dir()
            .join(format!("coverage-nav-test-{}-{name}", std::process::id()))
            .join("storage.json");
        let _ = fs::remove_file(&path);
        FileStorage::new_with_path(Some(path)).unwrap()
    }

    #[test]
    fn test_set_get_overwrite() {
        let storage = temp_storage("set-get");
        assert_eq!(storage.get_string("missing").unwrap(), None);

        storage.set_string(LAST_AREA_KEY, "downtown").unwrap();
        assert_eq!(storage.get_string(LAST_AREA_KEY).unwrap().as_deref(), Some("downtown"));

        storage.set_string(LAST_AREA_KEY, "harbour").unwrap();
        assert_eq!(storage.get_string(LAST_AREA_KEY).unwrap().as_deref(), Some("harbour"));
    }

    #[test]
    fn test_values_survive_reopen() {
        let storage = temp_storage("reopen");
        save_json_backend(&storage, &coverage_key("a"), &vec![3u64, 5, 8]).unwrap();

        let reopened = FileStorage::new_with_path(Some(storage.path().to_path_buf())).unwrap();
        let ids: Option<Vec<u64>> = load_json_backend(&reopened, &coverage_key("a")).unwrap();
        assert_eq!(ids, Some(vec![3, 5, 8]));
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let storage = temp_storage("corrupt");
        fs::write(storage.path(), "{ not json").unwrap();
        assert!(matches!(
            FileStorage::new_with_path(Some(storage.path().to_path_buf())),
            Err(StorageError::Json(_))
        ));
    }
}
