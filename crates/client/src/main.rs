//! `fabricsync-agent`: replays the local mutation queue against a REST
//! backend until Ctrl-C.

#[cfg(feature = "rest")]
use std::sync::Arc;

#[cfg(feature = "rest")]
use anyhow::Context;
#[cfg(feature = "rest")]
use fabricsync_client::remote::RestBackend;
#[cfg(feature = "rest")]
use fabricsync_client::{ClientConfig, MutationQueue, SyncEvent, SyncManager, SyncWorker, TokioScheduler};

#[cfg(feature = "rest")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("failed to load configuration")?;
    fabricsync_observability::init_with(config.log_format);

    let store = config.open_store().await?;

    let mut backend = RestBackend::new(config.api_url.clone(), config.api_key.clone());
    if let Some(token) = &config.auth_token {
        tracing::info!("Using authentication token");
        backend = backend.with_token(token.clone());
    }

    let manager = Arc::new(SyncManager::new(
        MutationQueue::new(store),
        Arc::new(backend),
        Arc::new(TokioScheduler::new(config.retry.clone())),
        config.retry.clone(),
    ));

    let worker = SyncWorker::new(manager, config.sync_interval);
    let mut events = worker.subscribe();
    let shutdown = worker.shutdown_signal();
    let handle = worker.start();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SyncEvent::Completed { synced, conflicts, failed, held_back } => {
                    tracing::info!(synced, conflicts, failed, held_back, "sync pass finished");
                }
                SyncEvent::Conflicts { conflicts } => {
                    for conflict in conflicts {
                        tracing::warn!(
                            mutation_id = %conflict.mutation_id,
                            fields = conflict.analysis.conflicts.len(),
                            "conflict awaiting resolution"
                        );
                    }
                }
                SyncEvent::Failed { error } => tracing::error!("sync failed: {error}"),
            }
        }
    });

    tracing::info!(api_url = %config.api_url, "fabricsync agent running");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    shutdown.notify_one();
    handle.await.context("sync worker panicked")?;
    Ok(())
}

#[cfg(not(feature = "rest"))]
fn main() {
    eprintln!("This binary requires the 'rest' feature to be enabled.");
    eprintln!("Build with: cargo build --features rest");
    std::process::exit(1);
}
