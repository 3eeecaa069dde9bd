//! Offline-first mutation queue.
//!
//! Local writes are recorded as [`QueuedMutation`]s in the key-value store
//! (namespace `mutation_queue`, one entry per mutation) and replayed in queue
//! order once connectivity returns.

use std::sync::Arc;

use fabricsync_core::{
    mutation_from_json, mutation_to_json, DomainError, MutationId, MutationKind, MutationStatus,
    QueuedMutation, Record, RecordId, TableName,
};

use crate::store::{KeyValueStore, StoreError};

pub const QUEUE_NAMESPACE: &str = "mutation_queue";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("mutation not found: {0}")]
    NotFound(MutationId),
}

/// Store-backed mutation queue.
///
/// This struct is cheap to clone and is safe to share across threads.
#[derive(Clone)]
pub struct MutationQueue {
    store: Arc<dyn KeyValueStore>,
}

impl MutationQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Record a local write.
    pub async fn record(
        &self,
        table: TableName,
        record_id: RecordId,
        kind: MutationKind,
        data: Record,
        original_data: Record,
    ) -> Result<QueuedMutation, QueueError> {
        let mutation = QueuedMutation::new(table, record_id, kind, data, original_data)?;
        self.save(&mutation).await?;

        tracing::info!(
            mutation_id = %mutation.id,
            table = %mutation.table,
            record_id = %mutation.record_id,
            kind = %mutation.kind,
            "queued local mutation"
        );

        Ok(mutation)
    }

    /// Persist a mutation (insert or replace).
    pub async fn save(&self, mutation: &QueuedMutation) -> Result<(), QueueError> {
        self.store
            .put(QUEUE_NAMESPACE, &mutation.id.to_string(), mutation_to_json(mutation))
            .await?;
        Ok(())
    }

    /// All queued mutations in queue order (creation time, then id).
    ///
    /// Entries that fail validation are skipped and logged rather than
    /// blocking the whole queue.
    pub async fn list(&self) -> Result<Vec<QueuedMutation>, QueueError> {
        let entries = self.store.list(QUEUE_NAMESPACE).await?;

        let mut mutations = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match mutation_from_json(value) {
                Ok(m) => mutations.push(m),
                Err(err) => {
                    tracing::error!(key = %key, "skipping malformed queued mutation: {err}");
                }
            }
        }

        mutations.sort_by_key(QueuedMutation::queue_key);
        Ok(mutations)
    }

    /// Mutations the next replay should pick up (pending or failed).
    pub async fn pending(&self) -> Result<Vec<QueuedMutation>, QueueError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|m| m.status.is_replayable())
            .collect())
    }

    /// Mutations waiting for an operator decision.
    pub async fn conflicted(&self) -> Result<Vec<QueuedMutation>, QueueError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|m| m.status == MutationStatus::Conflicted)
            .collect())
    }

    pub async fn get(&self, id: MutationId) -> Result<Option<QueuedMutation>, QueueError> {
        match self.store.get(QUEUE_NAMESPACE, &id.to_string()).await? {
            Some(value) => Ok(Some(mutation_from_json(value)?)),
            None => Ok(None),
        }
    }

    /// Remove a synced or resolved mutation. Returns whether it was queued.
    pub async fn remove(&self, id: MutationId) -> Result<bool, QueueError> {
        let removed = self.store.delete(QUEUE_NAMESPACE, &id.to_string()).await?;
        if removed {
            tracing::debug!(mutation_id = %id, "dequeued mutation");
        }
        Ok(removed)
    }

    pub async fn mark_conflicted(&self, id: MutationId) -> Result<(), QueueError> {
        self.update(id, |m| {
            m.status = MutationStatus::Conflicted;
            m.last_error = None;
        })
        .await
    }

    /// Record a failed replay attempt.
    pub async fn mark_failed(&self, id: MutationId, error: String) -> Result<(), QueueError> {
        self.update(id, |m| {
            m.status = MutationStatus::Failed;
            m.attempts += 1;
            m.last_error = Some(error);
        })
        .await
    }

    /// Move a mutation back to pending and clear its error.
    pub async fn mark_pending(&self, id: MutationId) -> Result<(), QueueError> {
        self.update(id, |m| {
            m.status = MutationStatus::Pending;
            m.last_error = None;
        })
        .await
    }

    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.store.list(QUEUE_NAMESPACE).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    async fn update<F>(&self, id: MutationId, f: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut QueuedMutation),
    {
        let mut mutation = self.get(id).await?.ok_or(QueueError::NotFound(id))?;
        f(&mut mutation);
        self.save(&mutation).await
    }
}
