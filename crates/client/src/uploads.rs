//! Persisted retry queue for failed file uploads.
//!
//! Failed uploads are stored with their bytes (base64 in the persisted form)
//! and retried by [`UploadRetryQueue::process_due`] with the shared backoff
//! policy. Only one processing pass runs at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::remote::RemoteError;
use crate::retry::RetryPolicy;
use crate::store::{KeyValueStore, StoreError};

pub const UPLOAD_NAMESPACE: &str = "upload_retries";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed upload entry: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("an upload retry pass is already running")]
    AlreadyRunning,
}

/// Object storage port.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), RemoteError>;
}

/// In-memory object storage with failure injection.
#[derive(Debug, Default)]
pub struct InMemoryBlobStorage {
    objects: RwLock<HashMap<(String, String), (Vec<u8>, String)>>,
    fail_next: AtomicU32,
}

impl InMemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        let objects = self.objects.read().ok()?;
        objects.get(&(bucket.to_string(), path.to_string())).cloned()
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), RemoteError> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(RemoteError::Network("injected upload failure".into()));
        }

        let mut objects = self
            .objects
            .write()
            .map_err(|_| RemoteError::Network("lock poisoned".into()))?;
        objects.insert(
            (bucket.to_string(), path.to_string()),
            (bytes.to_vec(), content_type.to_string()),
        );
        Ok(())
    }
}

/// A failed upload waiting for retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpload {
    pub id: Uuid,
    pub bucket: String,
    pub path: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Attempts made so far, including the original failed one.
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Outcome of one [`UploadRetryQueue::process_due`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: Vec<Uuid>,
    pub rescheduled: Vec<Uuid>,
    /// Dropped after exhausting the retry policy.
    pub abandoned: Vec<Uuid>,
}

pub struct UploadRetryQueue {
    store: Arc<dyn KeyValueStore>,
    storage: Arc<dyn BlobStorage>,
    policy: RetryPolicy,
    running: tokio::sync::Mutex<()>,
}

impl UploadRetryQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, storage: Arc<dyn BlobStorage>, policy: RetryPolicy) -> Self {
        Self {
            store,
            storage,
            policy,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Persist an upload whose first attempt failed.
    pub async fn enqueue_failed(
        &self,
        bucket: impl Into<String>,
        path: impl Into<String>,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<PendingUpload, UploadError> {
        let upload = PendingUpload {
            id: Uuid::now_v7(),
            bucket: bucket.into(),
            path: path.into(),
            bytes,
            content_type: content_type.into(),
            attempts: 1,
            last_error: Some(error.into()),
            next_attempt_at: now + self.retry_delay(1),
        };
        self.save(&upload).await?;

        tracing::info!(
            upload_id = %upload.id,
            bucket = %upload.bucket,
            path = %upload.path,
            "queued failed upload for retry"
        );
        Ok(upload)
    }

    /// All queued uploads, soonest first.
    pub async fn pending(&self) -> Result<Vec<PendingUpload>, UploadError> {
        let mut uploads = Vec::new();
        for (key, value) in self.store.list(UPLOAD_NAMESPACE).await? {
            match serde_json::from_value::<PendingUpload>(value) {
                Ok(upload) => uploads.push(upload),
                Err(err) => tracing::error!(key = %key, "skipping malformed upload entry: {err}"),
            }
        }
        uploads.sort_by_key(|u| (u.next_attempt_at, u.id));
        Ok(uploads)
    }

    /// Retry every upload due at `now`.
    ///
    /// Fails with [`UploadError::AlreadyRunning`] if another pass is in
    /// flight.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<UploadReport, UploadError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| UploadError::AlreadyRunning)?;

        let mut report = UploadReport::default();

        for mut upload in self.pending().await? {
            if upload.next_attempt_at > now {
                continue;
            }

            let result = self
                .storage
                .upload(&upload.bucket, &upload.path, &upload.bytes, &upload.content_type)
                .await;

            match result {
                Ok(()) => {
                    self.store.delete(UPLOAD_NAMESPACE, &upload.id.to_string()).await?;
                    tracing::info!(upload_id = %upload.id, path = %upload.path, "upload retry succeeded");
                    report.uploaded.push(upload.id);
                }
                Err(err) => {
                    upload.attempts += 1;
                    upload.last_error = Some(err.to_string());

                    if self.policy.should_retry(upload.attempts) {
                        upload.next_attempt_at = now + self.retry_delay(upload.attempts);
                        self.save(&upload).await?;
                        tracing::warn!(
                            upload_id = %upload.id,
                            attempts = upload.attempts,
                            "upload retry failed, rescheduled: {err}"
                        );
                        report.rescheduled.push(upload.id);
                    } else {
                        self.store.delete(UPLOAD_NAMESPACE, &upload.id.to_string()).await?;
                        tracing::error!(
                            upload_id = %upload.id,
                            attempts = upload.attempts,
                            "abandoning upload: {err}"
                        );
                        report.abandoned.push(upload.id);
                    }
                }
            }
        }

        Ok(report)
    }

    async fn save(&self, upload: &PendingUpload) -> Result<(), UploadError> {
        let value = serde_json::to_value(upload)?;
        self.store
            .put(UPLOAD_NAMESPACE, &upload.id.to_string(), value)
            .await?;
        Ok(())
    }

    fn retry_delay(&self, attempt: u32) -> chrono::Duration {
        let delay = {
            let mut rng = rand::thread_rng();
            self.policy.delay_for_attempt(attempt, &mut rng)
        };
        chrono::Duration::milliseconds(delay.as_millis() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        }
    }

    fn queue(storage: Arc<InMemoryBlobStorage>) -> UploadRetryQueue {
        UploadRetryQueue::new(InMemoryStore::arc(), storage, policy())
    }

    #[tokio::test]
    async fn due_uploads_are_retried_and_removed() {
        let storage = Arc::new(InMemoryBlobStorage::new());
        let queue = queue(storage.clone());
        let now = Utc::now();

        let upload = queue
            .enqueue_failed("lot-photos", "lots/42.jpg", vec![1, 2, 3], "image/jpeg", "timeout", now)
            .await
            .unwrap();
        assert_eq!(upload.next_attempt_at, now + chrono::Duration::seconds(1));

        let early = queue.process_due(now).await.unwrap();
        assert_eq!(early, UploadReport::default());

        let report = queue.process_due(now + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(report.uploaded, vec![upload.id]);
        assert_eq!(
            storage.object("lot-photos", "lots/42.jpg"),
            Some((vec![1, 2, 3], "image/jpeg".to_string()))
        );
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_reschedule_then_abandon() {
        let storage = Arc::new(InMemoryBlobStorage::new());
        storage.fail_next(10);
        let queue = queue(storage);
        let now = Utc::now();

        let upload = queue
            .enqueue_failed("docs", "invoice.pdf", b"%PDF".to_vec(), "application/pdf", "reset", now)
            .await
            .unwrap();

        let later = now + chrono::Duration::seconds(5);
        let report = queue.process_due(later).await.unwrap();
        assert_eq!(report.rescheduled, vec![upload.id]);

        let stored = queue.pending().await.unwrap().remove(0);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.next_attempt_at, later + chrono::Duration::seconds(2));
        assert_eq!(stored.last_error.as_deref(), Some("network error: injected upload failure"));

        let report = queue.process_due(later + chrono::Duration::seconds(2)).await.unwrap();
        assert_eq!(report.abandoned, vec![upload.id]);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bytes_are_persisted_as_base64() {
        let store = InMemoryStore::arc();
        let queue = UploadRetryQueue::new(store.clone(), Arc::new(InMemoryBlobStorage::new()), policy());

        let upload = queue
            .enqueue_failed("b", "p", b"hi".to_vec(), "text/plain", "x", Utc::now())
            .await
            .unwrap();

        let raw = store
            .get(UPLOAD_NAMESPACE, &upload.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw["bytes"], "aGk=");
        assert_eq!(raw["contentType"], "text/plain");
    }

    #[tokio::test]
    async fn concurrent_passes_are_rejected() {
        let queue = queue(Arc::new(InMemoryBlobStorage::new()));
        let _held = queue.running.lock().await;

        let err = queue.process_due(Utc::now()).await.unwrap_err();
        assert!(matches!(err, UploadError::AlreadyRunning));
    }
}
