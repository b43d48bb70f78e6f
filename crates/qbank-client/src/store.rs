//! Key-value stores for persisting the session.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use tracing::{debug, instrument, warn};

use qbank_core::{KeyValueStore, StoreError};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every operation takes an advisory lock on a sibling `.lock` file, so
/// several processes sharing the same file see whole writes only. Writes go
/// to a temporary file that replaces the data file by rename, and both are
/// created with owner-only permissions on unix.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store at `path`. The file is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn with_lock<T>(
        &self,
        exclusive: bool,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;

        if exclusive {
            lock_file.lock_exclusive()?;
        } else {
            lock_file.lock_shared()?;
        }

        let result = f();
        lock_file.unlock()?;
        result
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(json) if json.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(map)?;
        let temp_path = self.path.with_extension("tmp");

        // A leftover temp file would keep its old permissions.
        match fs::remove_file(&temp_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut temp = options.open(&temp_path)?;
        temp.write_all(json.as_bytes())?;
        temp.sync_all()?;
        drop(temp);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        self.with_lock(true, || {
            let (mut map, unreadable) = match self.read_map() {
                Ok(map) => (map, false),
                Err(StoreError::Serialization(e)) => {
                    warn!(error = %e, path = %self.path.display(), "Discarding unreadable store file");
                    (BTreeMap::new(), true)
                }
                Err(e) => return Err(e),
            };
            // An unreadable file is always replaced, even by a no-op update.
            if f(&mut map) || unreadable {
                self.write_map(&map)?;
            }
            Ok(())
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_lock(false, || Ok(self.read_map()?.get(key).cloned()))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        debug!("Writing key");
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|map| map.remove(key).is_some())
    }
}
