use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use fabricsync_core::{Record, RecordId, TableName};
use serde_json::Value;

use super::{RemoteBackend, RemoteError};

/// In-memory backend for tests/dev.
///
/// Supports failure injection: `fail_next(n)` makes the next `n` calls fail
/// with a network error, and `set_online(false)` fails every call.
#[derive(Debug)]
pub struct InMemoryBackend {
    rows: RwLock<HashMap<(TableName, RecordId), Record>>,
    online: AtomicBool,
    fail_next: AtomicU32,
    calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            fail_next: AtomicU32::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Put a row directly (simulates another client's write).
    pub fn seed(&self, table: &TableName, id: RecordId, row: Record) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert((table.clone(), id), row);
        }
    }

    /// Read a row without going through the failure injection.
    pub fn row(&self, table: &TableName, id: RecordId) -> Option<Record> {
        let rows = self.rows.read().ok()?;
        rows.get(&(table.clone(), id)).cloned()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of CRUD calls received (including failed ones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("backend unreachable".into()));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(RemoteError::Network("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn ping(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn fetch(&self, table: &TableName, id: RecordId) -> Result<Option<Record>, RemoteError> {
        self.check()?;
        Ok(self.row(table, id))
    }

    async fn insert(&self, table: &TableName, id: RecordId, data: &Record) -> Result<Record, RemoteError> {
        self.check()?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RemoteError::Network("lock poisoned".into()))?;
        let key = (table.clone(), id);
        if rows.contains_key(&key) {
            return Err(RemoteError::Rejected {
                status: 409,
                message: format!("duplicate key {id} in {table}"),
            });
        }
        let mut row = data.clone();
        row.insert("id".into(), Value::String(id.to_string()));
        rows.insert(key, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &TableName, id: RecordId, fields: &Record) -> Result<Record, RemoteError> {
        self.check()?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RemoteError::Network("lock poisoned".into()))?;
        let row = rows
            .get_mut(&(table.clone(), id))
            .ok_or(RemoteError::NotFound)?;
        for (field, value) in fields {
            row.insert(field.clone(), value.clone());
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &TableName, id: RecordId) -> Result<(), RemoteError> {
        self.check()?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RemoteError::Network("lock poisoned".into()))?;
        rows.remove(&(table.clone(), id))
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }
}
