//! Periodic authoritative status polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::errors::Result;
use crate::liveness::{Reconciler, StatusSnapshot};

/// Default poll cadence while a liveness-dependent screen is active.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Source of authoritative status snapshots.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, checker_id: &str) -> Result<StatusSnapshot>;
}

/// Single cancellable polling loop for one checker.
///
/// Fetch failures never terminate the loop; the reconciler simply keeps its
/// prior state until the next attempt. Cancellation is cooperative and takes
/// effect at the sleep boundary, never mid-request.
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    reconciler: Arc<Reconciler>,
    checker_id: String,
    poll_interval: Duration,
    task: AsyncMutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        reconciler: Arc<Reconciler>,
        checker_id: impl Into<String>,
    ) -> Self {
        Self::with_interval(source, reconciler, checker_id, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        source: Arc<dyn StatusSource>,
        reconciler: Arc<Reconciler>,
        checker_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            reconciler,
            checker_id: checker_id.into(),
            poll_interval,
            task: AsyncMutex::new(None),
        }
    }

    /// Start the loop. Idempotent: a live loop is left alone, a finished one
    /// is respawned.
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.task.lock().await;
        if let Some((_, handle)) = guard.as_ref() {
            if !handle.is_finished() {
                return Ok(());
            }
            guard.take();
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let source = Arc::clone(&self.source);
        let reconciler = Arc::clone(&self.reconciler);
        let checker_id = self.checker_id.clone();
        let poll_interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            loop {
                match source.fetch_status(&checker_id).await {
                    Ok(snapshot) => {
                        if let Err(err) = reconciler.apply_snapshot(&snapshot).await {
                            warn!("[Poller] applying snapshot for {} failed: {}", checker_id, err);
                        }
                    }
                    Err(err) => {
                        // Transient by policy: keep prior state, retry after
                        // the same fixed delay.
                        warn!("[Poller] status fetch for {} failed: {}", checker_id, err);
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("[Poller] loop for {} stopped", checker_id);
        });

        *guard = Some((stop_tx, handle));
        Ok(())
    }

    /// Request cooperative shutdown and wait for the loop to exit at its
    /// next sleep boundary.
    pub async fn stop(&self) {
        let taken = self.task.lock().await.take();
        if let Some((stop_tx, handle)) = taken {
            let _ = stop_tx.send(true);
            let _ = handle.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        let guard = self.task.lock().await;
        matches!(guard.as_ref(), Some((_, handle)) if !handle.is_finished())
    }
}
