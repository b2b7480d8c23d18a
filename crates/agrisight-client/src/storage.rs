//! Durable key/value storage backed by a JSON document.
//!
//! # Design
//! - Every write rewrites the whole document through a temporary file and a rename.
//! - A missing or unreadable document starts empty instead of failing the command.
//! - [`SharedStore`] lets the HTTP client and the flows share one store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use agrisight_core::{KeyValueStore, MemoryStore, StorageError};

/// File name used inside the state directory.
pub const STATE_FILE: &str = "state.json";

/// Key/value store persisted to a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory when missing.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] when the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            operation: "create_dir",
            source,
        })?;
        let path = dir.join(STATE_FILE);
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "discarding malformed state file"
                );
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StorageError::Io {
                    operation: "read",
                    source,
                });
            }
        };
        Ok(Self { path, values })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let encoded =
            serde_json::to_string_pretty(&self.values).map_err(|source| StorageError::Malformed {
                key: STATE_FILE.to_string(),
                source,
            })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(|source| StorageError::Io {
            operation: "write",
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| StorageError::Io {
            operation: "rename",
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.values.clear();
        self.flush()
    }
}

/// Store shared between the HTTP client, session and flows.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Box<dyn KeyValueStore>>>,
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("SharedStore")
    }
}

impl SharedStore {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(store))),
        }
    }

    /// Volatile in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(MemoryStore::default())
    }

    /// File store in `dir`, or an in-memory store when `dir` is `None`.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the file store cannot be opened.
    pub fn open(dir: Option<&Path>) -> Result<Self, StorageError> {
        match dir {
            Some(dir) => FileStore::open(dir).map(Self::new),
            None => Ok(Self::memory()),
        }
    }

    /// Run `f` with exclusive access to the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn KeyValueStore) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut())
    }
}
