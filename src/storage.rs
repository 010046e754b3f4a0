//! Persisted "key -> set of strings" slots.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::sync::{Mutex, RwLock};

use crate::error::{CycleMapError, Result};

/// Durable mapping from a key to a set of strings. `put` replaces the whole
/// set for that key; it never merges.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<BTreeSet<String>>> + Send;

    fn put(&self, key: &str, values: BTreeSet<String>) -> impl Future<Output = Result<()>> + Send;
}

/// In-process store, mostly for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.slots.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn put(&self, key: &str, values: BTreeSet<String>) -> Result<()> {
        self.slots.write().await.insert(key.to_string(), values);
        Ok(())
    }
}

/// Stores every slot in one JSON object file (`{"key": ["a", "b"]}`).
///
/// Writes go to a sibling temp file which is then renamed over the original,
/// so readers see either the old or the new file, never a partial one.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("[storage] {} does not exist yet", self.path.display());
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| CycleMapError::Storage {
            message: format!("{} is not a valid store file: {e}", self.path.display()),
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.read_all().await?.remove(key).unwrap_or_default())
    }

    async fn put(&self, key: &str, values: BTreeSet<String>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.read_all().await?;
        all.insert(key.to_string(), values);
        let serialized = serde_json::to_vec_pretty(&all).map_err(|e| CycleMapError::Storage {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("[storage] wrote slot '{key}' to {}", self.path.display());
        Ok(())
    }
}
