use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::lock::{LockError, StoreLock};
use crate::io::recovery::atomic_write;

/// Error type for snapshot storage
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("could not read {key}: {source}")]
    Read {
        key: String,
        source: std::io::Error,
    },
    #[error("could not write {key}: {source}")]
    Write {
        key: String,
        source: std::io::Error,
    },
    #[error("malformed snapshot {key}: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
    #[error("could not serialize {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    #[error("invalid snapshot key: {0:?}")]
    InvalidKey(String),
    #[error("order batch for {project} is not a contiguous 1..N numbering of its tasks")]
    InvalidOrder { project: String },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Durable string storage addressed by key. Each `set` replaces the whole
/// value; the last write to a key wins.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;

    /// Directory for the recovery log, if this store lives on disk
    fn log_dir(&self) -> Option<&Path> {
        None
    }
}

/// One `<key>.json` file per key in a directory. Writes are atomic and
/// serialized across processes by a [`StoreLock`].
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    log_dir: PathBuf,
}

impl FileStore {
    /// Store files under `dir`; recovery entries go to `log_dir`
    pub fn new(dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            dir: dir.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Read {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let write_err = |source| PersistenceError::Write {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(write_err)?;
        let _lock = StoreLock::acquire_default(&self.dir)?;
        atomic_write(&path, value.as_bytes()).map_err(write_err)
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::Write {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn log_dir(&self) -> Option<&Path> {
        Some(&self.log_dir)
    }
}

/// In-memory store, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    /// When set, every `set` fails (simulates a full disk)
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.fail_writes {
            return Err(PersistenceError::Write {
                key: key.to_string(),
                source: std::io::Error::other("storage quota exceeded"),
            });
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }
}
