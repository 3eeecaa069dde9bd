//! Background worker for periodic queue replay.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Notify};

use crate::sync_manager::{SyncError, SyncManager};
use crate::types::{PendingConflict, SyncReport};

/// Default replay interval.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

const MAX_FAILURE_BACKOFF: Duration = Duration::from_secs(300);

/// Events published after each replay attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    #[serde(rename_all = "camelCase")]
    Completed {
        synced: usize,
        conflicts: usize,
        failed: usize,
        held_back: usize,
    },
    Conflicts { conflicts: Vec<PendingConflict> },
    Failed { error: String },
}

/// Background sync worker that periodically replays the mutation queue.
pub struct SyncWorker {
    manager: Arc<SyncManager>,
    interval: Duration,
    shutdown: Arc<Notify>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncWorker {
    pub fn new(manager: Arc<SyncManager>, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            manager,
            interval,
            shutdown: Arc::new(Notify::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Handle used to stop the worker (`notify_one`).
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// One tick: check connectivity, then replay.
    ///
    /// Returns `Ok(None)` when the backend is unreachable and the tick was
    /// skipped.
    pub async fn run_once(&self) -> Result<Option<SyncReport>, SyncError> {
        let offline = self.manager.offline_mode();

        if !self.manager.remote().ping().await {
            tracing::debug!("Skipping sync - no connectivity");
            offline.lock().await.set_offline();
            return Ok(None);
        }
        offline.lock().await.set_online();

        match self.manager.sync().await {
            Ok(report) => {
                self.publish(&report);
                Ok(Some(report))
            }
            Err(err) => {
                self.emit(SyncEvent::Failed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Start the background loop.
    ///
    /// Ticks every configured interval, skips while the backend does not
    /// answer, backs off after consecutive failures and stops on the
    /// shutdown signal.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval = ?self.interval, "Background sync worker started");

            let mut sync_interval = tokio::time::interval(self.interval);
            sync_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut consecutive_failures = 0u32;

            loop {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        tracing::info!("Background sync worker received shutdown signal");
                        break;
                    }
                    _ = sync_interval.tick() => {
                        let failed = match self.run_once().await {
                            Ok(Some(report)) => report.interrupted,
                            Ok(None) => false,
                            Err(err) => {
                                tracing::warn!("Sync failed: {err}");
                                true
                            }
                        };

                        if !failed {
                            consecutive_failures = 0;
                            continue;
                        }

                        consecutive_failures += 1;
                        let backoff = failure_backoff(consecutive_failures);
                        tracing::debug!(
                            "Applying backoff of {:?} after {} consecutive failures",
                            backoff,
                            consecutive_failures
                        );

                        tokio::select! {
                            _ = self.shutdown.notified() => {
                                tracing::info!("Background sync worker received shutdown signal");
                                break;
                            }
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }

            tracing::info!("Background sync worker stopped");
        })
    }

    fn publish(&self, report: &SyncReport) {
        if !report.conflicts.is_empty() {
            tracing::warn!("Sync completed with {} conflicts", report.conflicts.len());
            self.emit(SyncEvent::Conflicts {
                conflicts: report.conflicts.clone(),
            });
        }
        if report.interrupted {
            self.emit(SyncEvent::Failed {
                error: "backend became unreachable during replay".into(),
            });
        }
        self.emit(SyncEvent::Completed {
            synced: report.synced.len(),
            conflicts: report.conflicts.len(),
            failed: report.failed.len(),
            held_back: report.held_back.len(),
        });
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Delay applied after `failures` consecutive failed ticks.
pub fn failure_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32 << failures.min(9);
    (Duration::from_secs(1) * factor).min(MAX_FAILURE_BACKOFF)
}
