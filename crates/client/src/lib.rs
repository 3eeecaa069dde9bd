//! `fabricsync-client`: offline-first sync engine.
//!
//! Local writes are recorded in a persisted mutation queue and replayed
//! against the backend when it is reachable. Updates are three-way merged
//! against the current server record; true conflicts are handed to a
//! [`session::ResolutionSession`] for the operator to decide.

pub mod config;
pub mod offline;
pub mod queue;
pub mod remote;
pub mod retry;
pub mod session;
pub mod store;
pub mod sync_manager;
pub mod sync_worker;
pub mod types;
pub mod uploads;
pub mod view;

pub use config::{ClientConfig, StoreKind};
pub use offline::{ConnectivityState, OfflineMode};
pub use queue::{MutationQueue, QueueError, QUEUE_NAMESPACE};
pub use remote::{InMemoryBackend, RemoteBackend, RemoteError};
pub use retry::{retry_transient, ManualScheduler, RetryPolicy, RetryScheduler, TokioScheduler};
pub use session::{Decision, ResolutionSession, ViewMode};
pub use store::{KeyValueStore, StoreError};
pub use sync_manager::{ResolveHandler, SyncError, SyncManager};
pub use sync_worker::{SyncEvent, SyncWorker};
pub use types::{FailedMutation, PendingConflict, Resolution, SyncReport};
pub use uploads::{BlobStorage, InMemoryBlobStorage, PendingUpload, UploadError, UploadRetryQueue};
