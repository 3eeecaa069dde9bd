//! Serial replay of the mutation queue with conflict detection.
//!
//! This module provides a `SyncManager` that:
//! - Replays queued mutations against the backend in queue order
//! - Three-way merges updates against the current server record
//! - Surfaces true conflicts and holds back later writes to the same record
//! - Retries transient failures with capped exponential backoff
//! - Applies operator resolutions (`local`, `server`, `merge`)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use fabricsync_core::{
    analyze, apply_with_analysis, DomainError, MutationId, MutationKind, MutationStatus,
    QueuedMutation, Record, RecordId, ResolutionMap, Side, TableName,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::offline::OfflineMode;
use crate::queue::{MutationQueue, QueueError};
use crate::remote::{RemoteBackend, RemoteError};
use crate::retry::{retry_transient, RetryPolicy, RetryScheduler};
pub use crate::types::{FailedMutation, PendingConflict, Resolution, SyncReport};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("client is offline")]
    Offline,
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("mutation not found: {0}")]
    NotFound(MutationId),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_transient())
    }
}

/// Receives operator decisions for conflicted mutations.
#[async_trait]
pub trait ResolveHandler: Send + Sync {
    async fn on_resolve(&self, id: MutationId, resolution: Resolution) -> Result<(), SyncError>;
}

enum Replayed {
    Synced,
    Conflict(PendingConflict),
}

/// Replays the mutation queue against a remote backend.
pub struct SyncManager {
    queue: MutationQueue,
    remote: Arc<dyn RemoteBackend>,
    scheduler: Arc<dyn RetryScheduler>,
    policy: RetryPolicy,
    offline: Arc<Mutex<OfflineMode>>,
}

impl SyncManager {
    pub fn new(
        queue: MutationQueue,
        remote: Arc<dyn RemoteBackend>,
        scheduler: Arc<dyn RetryScheduler>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            remote,
            scheduler,
            policy,
            offline: Arc::new(Mutex::new(OfflineMode::new())),
        }
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn remote(&self) -> &Arc<dyn RemoteBackend> {
        &self.remote
    }

    pub fn offline_mode(&self) -> Arc<Mutex<OfflineMode>> {
        self.offline.clone()
    }

    /// Replay every replayable mutation once, in queue order.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        if self.offline.lock().await.is_offline() {
            return Err(SyncError::Offline);
        }

        let mutations = self.queue.list().await?;
        tracing::info!("Starting replay of {} queued mutations", mutations.len());

        let mut report = SyncReport::default();
        let mut blocked: HashSet<(TableName, RecordId)> = HashSet::new();

        for mutation in mutations {
            let key = (mutation.table.clone(), mutation.record_id);

            if mutation.status == MutationStatus::Conflicted {
                blocked.insert(key);
                continue;
            }
            if blocked.contains(&key) {
                tracing::debug!(mutation_id = %mutation.id, "holding back mutation behind unresolved write");
                report.held_back.push(mutation.id);
                continue;
            }

            match self.replay(&mutation).await {
                Ok(Replayed::Synced) => {
                    self.queue.remove(mutation.id).await?;
                    report.synced.push(mutation.id);
                    tracing::info!(mutation_id = %mutation.id, table = %mutation.table, "synced mutation");
                }
                Ok(Replayed::Conflict(conflict)) => {
                    self.queue.mark_conflicted(mutation.id).await?;
                    tracing::warn!(
                        mutation_id = %mutation.id,
                        table = %mutation.table,
                        record_id = %mutation.record_id,
                        fields = conflict.analysis.conflicts.len(),
                        "conflict detected"
                    );
                    blocked.insert(key);
                    report.conflicts.push(conflict);
                }
                Err(err) => {
                    let message = err.to_string();
                    self.queue.mark_failed(mutation.id, message.clone()).await?;
                    report.failed.push(FailedMutation {
                        id: mutation.id,
                        error: message,
                    });

                    if err.is_transient() {
                        tracing::warn!(mutation_id = %mutation.id, "backend unreachable, stopping replay: {err}");
                        self.offline.lock().await.set_offline();
                        report.interrupted = true;
                        break;
                    }

                    tracing::error!(mutation_id = %mutation.id, "failed to sync mutation: {err}");
                    blocked.insert(key);
                }
            }
        }

        if !report.interrupted {
            self.offline.lock().await.mark_synced();
        }

        tracing::info!(
            "Replay complete: {} synced, {} conflicts, {} failed, {} held back",
            report.synced.len(),
            report.conflicts.len(),
            report.failed.len(),
            report.held_back.len()
        );

        Ok(report)
    }

    /// Recompute the analysis for every conflicted mutation against the
    /// current server record.
    ///
    /// Mutations whose conflicts have disappeared meanwhile are moved back to
    /// pending so the next replay auto-merges them.
    pub async fn pending_conflicts(&self) -> Result<Vec<PendingConflict>, SyncError> {
        let mut out = Vec::new();

        for mutation in self.queue.conflicted().await? {
            let server = match self.fetch(&mutation.table, mutation.record_id).await? {
                Some(server) => server,
                None => {
                    tracing::warn!(mutation_id = %mutation.id, "conflicted record no longer exists on server");
                    self.queue
                        .mark_failed(mutation.id, RemoteError::NotFound.to_string())
                        .await?;
                    continue;
                }
            };

            let local = mutation.local_proposed();
            let analysis = analyze(&mutation.original_data, &local, &server);
            if analysis.has_conflicts() {
                out.push(PendingConflict::new(mutation, server, analysis));
            } else {
                self.queue.mark_pending(mutation.id).await?;
            }
        }

        Ok(out)
    }

    /// Apply an operator decision and dequeue the mutation.
    pub async fn resolve(&self, id: MutationId, resolution: Resolution) -> Result<(), SyncError> {
        let mutation = self.queue.get(id).await?.ok_or(SyncError::NotFound(id))?;
        tracing::info!(mutation_id = %id, resolution = resolution.label(), "resolving conflict");

        match resolution {
            Resolution::Server => {}
            Resolution::Local if mutation.kind == MutationKind::Update => {
                self.keep_local(&mutation).await?;
            }
            Resolution::Local => {
                // Creates and deletes never conflict; replay them as-is.
                self.replay(&mutation).await?;
            }
            Resolution::Merge(merged) => {
                if mutation.kind != MutationKind::Update {
                    return Err(DomainError::validation(format!(
                        "cannot merge a {} mutation",
                        mutation.kind
                    ))
                    .into());
                }
                self.push_full(&mutation, &merged).await?;
            }
        }

        self.queue.remove(id).await?;
        Ok(())
    }

    async fn replay(&self, mutation: &QueuedMutation) -> Result<Replayed, SyncError> {
        let table = &mutation.table;
        let id = mutation.record_id;

        match mutation.kind {
            MutationKind::Create => {
                match self.with_retry("insert", || self.remote.insert(table, id, &mutation.data)).await {
                    Ok(_) => Ok(Replayed::Synced),
                    Err(err @ RemoteError::Rejected { status: 409, .. }) => {
                        // An earlier attempt may have committed with its response lost.
                        if self.already_inserted(mutation).await? {
                            tracing::info!(mutation_id = %mutation.id, "row already inserted, treating create as synced");
                            Ok(Replayed::Synced)
                        } else {
                            Err(err.into())
                        }
                    }
                    Err(err) => Err(err.into()),
                }
            }
            MutationKind::Update => {
                let server = self.fetch(table, id).await?.ok_or(RemoteError::NotFound)?;
                let local = mutation.local_proposed();
                let analysis = analyze(&mutation.original_data, &local, &server);

                if analysis.has_conflicts() {
                    return Ok(Replayed::Conflict(PendingConflict::new(
                        mutation.clone(),
                        server,
                        analysis,
                    )));
                }

                let merged = apply_with_analysis(&analysis, &local, &server, &ResolutionMap::new())?;
                self.push_patch(table, id, &server, &merged).await?;
                Ok(Replayed::Synced)
            }
            MutationKind::Delete => {
                match self.with_retry("delete", || self.remote.delete(table, id)).await {
                    Ok(()) | Err(RemoteError::NotFound) => Ok(Replayed::Synced),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Whether the server row for a CREATE already holds exactly its data.
    async fn already_inserted(&self, mutation: &QueuedMutation) -> Result<bool, SyncError> {
        let row = self.fetch(&mutation.table, mutation.record_id).await?;
        Ok(row.is_some_and(|row| {
            mutation
                .data
                .iter()
                .all(|(field, value)| row.get(field) == Some(value))
        }))
    }

    /// Keep the local side of every conflicting field; fields only the
    /// server changed keep their server values.
    async fn keep_local(&self, mutation: &QueuedMutation) -> Result<(), SyncError> {
        let table = &mutation.table;
        let id = mutation.record_id;
        let local = mutation.local_proposed();

        let Some(server) = self.fetch(table, id).await? else {
            self.with_retry("insert", || self.remote.insert(table, id, &local))
                .await?;
            return Ok(());
        };

        let analysis = analyze(&mutation.original_data, &local, &server);
        let choices: ResolutionMap = analysis
            .conflict_fields()
            .map(|field| (field.to_string(), Side::Local))
            .collect();
        let merged = apply_with_analysis(&analysis, &local, &server, &choices)?;
        self.push_patch(table, id, &server, &merged).await
    }

    /// Write `target` over whatever the server currently holds, re-creating
    /// the record if it has been deleted remotely.
    async fn push_full(&self, mutation: &QueuedMutation, target: &Record) -> Result<(), SyncError> {
        let table = &mutation.table;
        let id = mutation.record_id;

        match self.fetch(table, id).await? {
            Some(server) => self.push_patch(table, id, &server, target).await,
            None => {
                self.with_retry("insert", || self.remote.insert(table, id, target))
                    .await?;
                Ok(())
            }
        }
    }

    async fn push_patch(
        &self,
        table: &TableName,
        id: RecordId,
        server: &Record,
        target: &Record,
    ) -> Result<(), SyncError> {
        let patch = diff_patch(server, target);
        if patch.is_empty() {
            tracing::debug!(%table, record_id = %id, "server already matches, nothing to push");
            return Ok(());
        }
        self.with_retry("update", || self.remote.update(table, id, &patch))
            .await?;
        Ok(())
    }

    async fn fetch(&self, table: &TableName, id: RecordId) -> Result<Option<Record>, RemoteError> {
        self.with_retry("fetch", || self.remote.fetch(table, id)).await
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RemoteError>>,
    {
        retry_transient(&self.policy, self.scheduler.as_ref(), what, op).await
    }
}

#[async_trait]
impl ResolveHandler for SyncManager {
    async fn on_resolve(&self, id: MutationId, resolution: Resolution) -> Result<(), SyncError> {
        self.resolve(id, resolution).await
    }
}

/// Fields to send so the server row becomes `target`.
///
/// Fields the target drops are nulled (a patch cannot remove columns); the
/// primary key is never part of a patch.
fn diff_patch(server: &Record, target: &Record) -> Record {
    let mut patch = Record::new();

    for (field, value) in target {
        if field != "id" && server.get(field) != Some(value) {
            patch.insert(field.clone(), value.clone());
        }
    }
    for (field, value) in server {
        if field != "id" && !target.contains_key(field) && !value.is_null() {
            patch.insert(field.clone(), Value::Null);
        }
    }

    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryBackend;
    use crate::retry::ManualScheduler;
    use crate::store::InMemoryStore;
    use fabricsync_core::{record_from_value, Side};
    use serde_json::json;

    struct Harness {
        manager: SyncManager,
        backend: Arc<InMemoryBackend>,
        scheduler: Arc<ManualScheduler>,
    }

    fn harness() -> Harness {
        let backend = InMemoryBackend::arc();
        let scheduler = Arc::new(ManualScheduler::new(RetryPolicy::default()));
        let manager = SyncManager::new(
            MutationQueue::new(InMemoryStore::arc()),
            backend.clone(),
            scheduler.clone(),
            RetryPolicy::default(),
        );
        Harness {
            manager,
            backend,
            scheduler,
        }
    }

    fn rec(v: Value) -> Record {
        record_from_value(v).unwrap()
    }

    fn lots() -> TableName {
        TableName::new("lots").unwrap()
    }

    async fn queue_update(h: &Harness, id: RecordId, data: Value, original: Value) -> QueuedMutation {
        h.manager
            .queue()
            .record(lots(), id, MutationKind::Update, rec(data), rec(original))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn one_sided_update_auto_merges() {
        let h = harness();
        let id = RecordId::new();
        h.backend.seed(&lots(), id, rec(json!({"qty": 5, "location": "B-7"})));
        let m = queue_update(&h, id, json!({"qty": 10}), json!({"qty": 5, "location": "A-1"})).await;

        let report = h.manager.sync().await.unwrap();

        assert_eq!(report.synced, vec![m.id]);
        assert!(report.is_clean());
        assert_eq!(
            Value::Object(h.backend.row(&lots(), id).unwrap()),
            json!({"qty": 10, "location": "B-7"})
        );
        assert!(h.manager.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn conflicts_hold_back_later_writes_to_the_same_record() {
        let h = harness();
        let contested = RecordId::new();
        let other = RecordId::new();
        h.backend.seed(&lots(), contested, rec(json!({"status": "C"})));
        h.backend.seed(&lots(), other, rec(json!({"qty": 1})));

        let first = queue_update(&h, contested, json!({"status": "B"}), json!({"status": "A"})).await;
        let second = queue_update(&h, contested, json!({"note": "x"}), json!({"status": "B"})).await;
        let third = queue_update(&h, other, json!({"qty": 2}), json!({"qty": 1})).await;

        let report = h.manager.sync().await.unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].mutation_id, first.id);
        assert_eq!(report.conflicts[0].analysis.conflicts[0].field, "status");
        assert_eq!(report.held_back, vec![second.id]);
        assert_eq!(report.synced, vec![third.id]);

        let stored = h.manager.queue().get(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MutationStatus::Conflicted);

        // Still blocked on the next pass, and not reported again.
        let again = h.manager.sync().await.unwrap();
        assert!(again.conflicts.is_empty());
        assert_eq!(again.held_back, vec![second.id]);
    }

    #[tokio::test]
    async fn transient_failures_retry_with_backoff() {
        let h = harness();
        let id = RecordId::new();
        h.backend.fail_next(2);
        h.manager
            .queue()
            .record(lots(), id, MutationKind::Create, rec(json!({"meters": 40})), Record::new())
            .await
            .unwrap();

        let report = h.manager.sync().await.unwrap();

        assert_eq!(report.synced.len(), 1);
        assert_eq!(h.scheduler.attempts(), vec![1, 2]);
        assert_eq!(h.backend.row(&lots(), id).unwrap().get("meters"), Some(&json!(40)));
    }

    #[tokio::test]
    async fn exhausted_retries_stop_replay_and_go_offline() {
        let h = harness();
        h.backend.set_online(false);
        let first = h
            .manager
            .queue()
            .record(lots(), RecordId::new(), MutationKind::Create, rec(json!({"meters": 1})), Record::new())
            .await
            .unwrap();
        h.manager
            .queue()
            .record(lots(), RecordId::new(), MutationKind::Create, rec(json!({"meters": 2})), Record::new())
            .await
            .unwrap();

        let report = h.manager.sync().await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, first.id);
        assert_eq!(h.backend.calls(), 3);

        let stored = h.manager.queue().get(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MutationStatus::Failed);
        assert_eq!(stored.attempts, 1);

        assert!(matches!(h.manager.sync().await, Err(SyncError::Offline)));
    }

    #[tokio::test]
    async fn rejected_mutation_fails_without_stopping_replay() {
        let h = harness();
        let dup = RecordId::new();
        h.backend.seed(&lots(), dup, rec(json!({"meters": 5})));

        let rejected = h
            .manager
            .queue()
            .record(lots(), dup, MutationKind::Create, rec(json!({"meters": 1})), Record::new())
            .await
            .unwrap();
        let later = h
            .manager
            .queue()
            .record(lots(), RecordId::new(), MutationKind::Create, rec(json!({"meters": 2})), Record::new())
            .await
            .unwrap();

        let report = h.manager.sync().await.unwrap();

        assert_eq!(report.failed[0].id, rejected.id);
        assert!(!report.interrupted);
        assert_eq!(report.synced, vec![later.id]);
        assert!(h.scheduler.attempts().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_missing_record_counts_as_synced() {
        let h = harness();
        let m = h
            .manager
            .queue()
            .record(lots(), RecordId::new(), MutationKind::Delete, Record::new(), rec(json!({"qty": 1})))
            .await
            .unwrap();

        let report = h.manager.sync().await.unwrap();
        assert_eq!(report.synced, vec![m.id]);
    }

    #[tokio::test]
    async fn update_of_remotely_deleted_record_fails() {
        let h = harness();
        let m = queue_update(&h, RecordId::new(), json!({"qty": 2}), json!({"qty": 1})).await;

        let report = h.manager.sync().await.unwrap();
        assert_eq!(report.failed[0].id, m.id);
        assert_eq!(report.failed[0].error, "record not found");
    }

    #[tokio::test]
    async fn resolve_local_keeps_server_only_changes() {
        let h = harness();
        let id = RecordId::new();
        h.backend.seed(&lots(), id, rec(json!({"status": "C", "qty": 3, "location": "L2"})));
        let m = queue_update(
            &h,
            id,
            json!({"status": "B"}),
            json!({"status": "A", "qty": 1, "location": "L1"}),
        )
        .await;
        h.manager.sync().await.unwrap();

        h.manager.on_resolve(m.id, Resolution::Local).await.unwrap();

        assert_eq!(
            Value::Object(h.backend.row(&lots(), id).unwrap()),
            json!({"status": "B", "qty": 3, "location": "L2"})
        );
        assert!(h.manager.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn resolve_local_recreates_remotely_deleted_record() {
        let h = harness();
        let id = RecordId::new();
        h.backend.seed(&lots(), id, rec(json!({"status": "C"})));
        let m = queue_update(&h, id, json!({"status": "B"}), json!({"status": "A", "qty": 1})).await;
        h.manager.sync().await.unwrap();
        h.backend.delete(&lots(), id).await.unwrap();

        h.manager.resolve(m.id, Resolution::Local).await.unwrap();

        let row = h.backend.row(&lots(), id).unwrap();
        assert_eq!(row.get("status"), Some(&json!("B")));
        assert_eq!(row.get("qty"), Some(&json!(1)));
    }

    /// Commits inserts but drops the response of the next one.
    struct DroppedInsertResponse {
        inner: Arc<InMemoryBackend>,
        drop_next: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl RemoteBackend for DroppedInsertResponse {
        async fn ping(&self) -> bool {
            self.inner.ping().await
        }

        async fn fetch(&self, table: &TableName, id: RecordId) -> Result<Option<Record>, RemoteError> {
            self.inner.fetch(table, id).await
        }

        async fn insert(&self, table: &TableName, id: RecordId, data: &Record) -> Result<Record, RemoteError> {
            let row = self.inner.insert(table, id, data).await?;
            if self.drop_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(RemoteError::Network("response lost".into()));
            }
            Ok(row)
        }

        async fn update(&self, table: &TableName, id: RecordId, fields: &Record) -> Result<Record, RemoteError> {
            self.inner.update(table, id, fields).await
        }

        async fn delete(&self, table: &TableName, id: RecordId) -> Result<(), RemoteError> {
            self.inner.delete(table, id).await
        }
    }

    #[tokio::test]
    async fn create_with_lost_response_is_synced_once() {
        let inner = InMemoryBackend::arc();
        let scheduler = Arc::new(ManualScheduler::new(RetryPolicy::default()));
        let manager = SyncManager::new(
            MutationQueue::new(InMemoryStore::arc()),
            Arc::new(DroppedInsertResponse {
                inner: inner.clone(),
                drop_next: std::sync::atomic::AtomicBool::new(true),
            }),
            scheduler.clone(),
            RetryPolicy::default(),
        );
        let id = RecordId::new();
        let m = manager
            .queue()
            .record(lots(), id, MutationKind::Create, rec(json!({"meters": 40})), Record::new())
            .await
            .unwrap();

        let report = manager.sync().await.unwrap();

        assert_eq!(report.synced, vec![m.id]);
        assert!(report.failed.is_empty());
        assert_eq!(scheduler.attempts(), vec![1]);
        assert!(manager.queue().is_empty().await.unwrap());
        assert_eq!(inner.row(&lots(), id).unwrap().get("meters"), Some(&json!(40)));
    }

    #[tokio::test]
    async fn resolve_server_discards_mutation() {
        let h = harness();
        let id = RecordId::new();
        h.backend.seed(&lots(), id, rec(json!({"status": "C"})));
        let m = queue_update(&h, id, json!({"status": "B"}), json!({"status": "A"})).await;
        h.manager.sync().await.unwrap();
        let calls = h.backend.calls();

        h.manager.resolve(m.id, Resolution::Server).await.unwrap();

        assert_eq!(h.backend.calls(), calls);
        assert_eq!(h.backend.row(&lots(), id).unwrap().get("status"), Some(&json!("C")));
        assert!(h.manager.queue().get(m.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_merge_pushes_merged_record() {
        let h = harness();
        let id = RecordId::new();
        h.backend.seed(&lots(), id, rec(json!({"status": "C", "qty": 3})));
        let m = queue_update(&h, id, json!({"status": "B", "qty": 9}), json!({"status": "A", "qty": 1})).await;
        let report = h.manager.sync().await.unwrap();
        let conflict = &report.conflicts[0];

        let mut choices = ResolutionMap::new();
        choices.insert("status".into(), Side::Local);
        choices.insert("qty".into(), Side::Server);
        let merged =
            apply_with_analysis(&conflict.analysis, &conflict.local, &conflict.server, &choices).unwrap();

        h.manager.resolve(m.id, Resolution::Merge(merged)).await.unwrap();

        assert_eq!(
            Value::Object(h.backend.row(&lots(), id).unwrap()),
            json!({"status": "B", "qty": 3})
        );
    }

    #[tokio::test]
    async fn merge_is_rejected_for_non_updates() {
        let h = harness();
        let m = h
            .manager
            .queue()
            .record(lots(), RecordId::new(), MutationKind::Delete, Record::new(), Record::new())
            .await
            .unwrap();

        let err = h.manager.resolve(m.id, Resolution::Merge(Record::new())).await.unwrap_err();
        assert!(matches!(err, SyncError::Domain(DomainError::Validation(_))));

        let missing = h.manager.resolve(MutationId::new(), Resolution::Server).await.unwrap_err();
        assert!(matches!(missing, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn pending_conflicts_are_recomputed_against_server() {
        let h = harness();
        let id = RecordId::new();
        h.backend.seed(&lots(), id, rec(json!({"status": "C"})));
        let m = queue_update(&h, id, json!({"status": "B"}), json!({"status": "A"})).await;
        h.manager.sync().await.unwrap();

        assert_eq!(h.manager.pending_conflicts().await.unwrap().len(), 1);

        // Another client reverts the server value: the conflict disappears.
        h.backend.seed(&lots(), id, rec(json!({"status": "A"})));
        assert!(h.manager.pending_conflicts().await.unwrap().is_empty());

        let report = h.manager.sync().await.unwrap();
        assert_eq!(report.synced, vec![m.id]);
        assert_eq!(h.backend.row(&lots(), id).unwrap().get("status"), Some(&json!("B")));
    }

    #[test]
    fn patch_nulls_dropped_fields_and_skips_id() {
        let server = rec(json!({"id": "x", "note": "fragile", "qty": 1, "gone": null}));
        let target = rec(json!({"qty": 2}));
        assert_eq!(Value::Object(diff_patch(&server, &target)), json!({"note": null, "qty": 2}));
    }
}
