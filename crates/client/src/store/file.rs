//! File-backed store: one JSON document per namespace.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{KeyValueStore, StoreError};

/// Stores each namespace as `{dir}/{namespace}.json`.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-write leaves the previous document intact. All operations are
/// serialized through one lock.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "opened file store");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn namespace_path(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::Io(format!("invalid namespace '{namespace}'")));
        }
        Ok(self.dir.join(format!("{namespace}.json")))
    }

    async fn read_namespace(&self, namespace: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let path = self.namespace_path(namespace)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_namespace(
        &self,
        namespace: &str,
        entries: &BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        let path = self.namespace_path(namespace)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_namespace(namespace).await?.remove(key))
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_namespace(namespace).await?;
        entries.insert(key.to_string(), value);
        self.write_namespace(namespace, &entries).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_namespace(namespace).await?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.write_namespace(namespace, &entries).await?;
        Ok(true)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_namespace(namespace).await?.into_iter().collect())
    }
}
