//! Remote backend port.
//!
//! The sync manager talks to the backend-as-a-service only through
//! [`RemoteBackend`]: table CRUD keyed by record id.

pub mod memory;
#[cfg(feature = "rest")]
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use fabricsync_core::{Record, RecordId, TableName};

pub use memory::InMemoryBackend;
#[cfg(feature = "rest")]
pub use rest::RestBackend;

/// Remote CRUD abstraction.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Cheap reachability probe.
    async fn ping(&self) -> bool;

    /// Current server-side record, `None` if it does not exist.
    async fn fetch(&self, table: &TableName, id: RecordId) -> Result<Option<Record>, RemoteError>;

    /// Insert a new record; returns the stored row.
    async fn insert(&self, table: &TableName, id: RecordId, data: &Record) -> Result<Record, RemoteError>;

    /// Patch the given fields of an existing record; returns the stored row.
    async fn update(&self, table: &TableName, id: RecordId, fields: &Record) -> Result<Record, RemoteError>;

    /// Delete a record.
    async fn delete(&self, table: &TableName, id: RecordId) -> Result<(), RemoteError>;
}

#[async_trait]
impl<B> RemoteBackend for Arc<B>
where
    B: RemoteBackend + ?Sized,
{
    async fn ping(&self) -> bool {
        (**self).ping().await
    }

    async fn fetch(&self, table: &TableName, id: RecordId) -> Result<Option<Record>, RemoteError> {
        (**self).fetch(table, id).await
    }

    async fn insert(&self, table: &TableName, id: RecordId, data: &Record) -> Result<Record, RemoteError> {
        (**self).insert(table, id, data).await
    }

    async fn update(&self, table: &TableName, id: RecordId, fields: &Record) -> Result<Record, RemoteError> {
        (**self).update(table, id, fields).await
    }

    async fn delete(&self, table: &TableName, id: RecordId) -> Result<(), RemoteError> {
        (**self).delete(table, id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Transport failure or server-side outage; worth retrying.
    #[error("network error: {0}")]
    Network(String),
    /// The backend refused the request (validation, permissions, duplicates).
    #[error("rejected by backend ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("record not found")]
    NotFound,
    #[error("parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}
