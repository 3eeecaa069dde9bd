//! Key-value persistence port.
//!
//! Everything the client persists locally (the mutation queue, pending
//! uploads) goes through [`KeyValueStore`], so the backing medium can be
//! swapped without touching call sites. Values are opaque JSON documents
//! grouped by namespace.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Key-value store abstraction.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch one value.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace a value.
    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;

    /// Delete a value. Returns whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError>;

    /// All entries of a namespace, ordered by key.
    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

#[async_trait]
impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).put(namespace, key, value).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        (**self).delete(namespace, key).await
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, StoreError> {
        (**self).list(namespace).await
    }
}

/// Store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Resolve the default local data directory: `{app_data_dir}/fabricsync`.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("fabricsync");
    Ok(dir)
}
