//! Best-effort acknowledgment of alarm and emergency alerts.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::errors::Result;
use crate::liveness::{AlertCategory, AlertPresenter, Reconciler};

/// Server-side acknowledgment call. Idempotent: repeating it after a
/// success has no additional effect.
#[async_trait]
pub trait AlarmAcknowledger: Send + Sync {
    async fn acknowledge_alarm(&self, checker_id: &str) -> Result<()>;
}

/// Fire-and-forget acknowledgment submission, independent of any UI
/// lifecycle.
pub struct AckDispatcher {
    remote: Arc<dyn AlarmAcknowledger>,
    reconciler: Arc<Reconciler>,
    presenter: Arc<AlertPresenter>,
}

impl AckDispatcher {
    pub fn new(
        remote: Arc<dyn AlarmAcknowledger>,
        reconciler: Arc<Reconciler>,
        presenter: Arc<AlertPresenter>,
    ) -> Self {
        Self {
            remote,
            reconciler,
            presenter,
        }
    }

    /// Acknowledge the active alarm/emergency for a checker. Returns true
    /// when the server accepted the acknowledgment.
    ///
    /// On failure the local alert state is left untouched so the next poll
    /// cycle's reconciliation remains authoritative; there is no retry
    /// beyond that implicit one.
    pub async fn acknowledge(&self, checker_id: &str) -> Result<bool> {
        if let Err(err) = self.remote.acknowledge_alarm(checker_id).await {
            warn!(
                "[AckDispatch] acknowledgment for {} failed, leaving alert state untouched: {}",
                checker_id, err
            );
            return Ok(false);
        }

        let outcome = self.reconciler.mark_acknowledged(checker_id).await?;
        if outcome.cleared_alarm {
            if let Err(err) = self.presenter.clear(AlertCategory::Alarm).await {
                warn!("[AckDispatch] clearing alarm presentation failed: {}", err);
            }
        }
        if outcome.cleared_emergency {
            if let Err(err) = self.presenter.clear(AlertCategory::Emergency).await {
                warn!(
                    "[AckDispatch] clearing emergency presentation failed: {}",
                    err
                );
            }
        }
        info!("[AckDispatch] alarm acknowledged for {}", checker_id);
        Ok(true)
    }
}
