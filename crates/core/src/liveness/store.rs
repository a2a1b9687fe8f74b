//! Persistence contract for liveness bookkeeping.

use crate::errors::Result;
use crate::liveness::{AlertCategory, CheckerLiveness};

/// Durable store for cached liveness rows and notification bookkeeping.
///
/// Implementations are last-write-wins at the key level; no cross-key
/// transactions are required. Reads may happen concurrently, writes are
/// serialized by the implementation.
pub trait LivenessStore: Send + Sync {
    /// All persisted liveness rows, for rehydration after a restart.
    fn load_all_liveness(&self) -> Result<Vec<CheckerLiveness>>;

    fn save_liveness(&self, liveness: &CheckerLiveness) -> Result<()>;

    /// Drop a checker's cached row. Only unregister/reset call this.
    fn delete_liveness(&self, checker_id: &str) -> Result<()>;

    /// Last-delivered notification id for a category, used to cancel the
    /// previous delivery before re-posting under the same tag.
    fn last_notification_id(&self, category: AlertCategory) -> Result<Option<i64>>;

    fn set_last_notification_id(&self, category: AlertCategory, id: i64) -> Result<()>;

    fn clear_last_notification_id(&self, category: AlertCategory) -> Result<()>;
}
