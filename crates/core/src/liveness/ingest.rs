//! Push event ingestion.
//!
//! This is the only guaranteed wake path while the app is backgrounded: the
//! push callback must present the alert itself, synchronously, before the
//! reconciler or the next poll get a chance to run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::Result;
use crate::liveness::{
    AlertCategory, AlertPresenter, LivenessState, PushEvent, PushKind, Reconciler,
};

/// Upper bound on how long a push callback may hold the device awake.
pub const MAX_WAKE_HOLD: Duration = Duration::from_secs(60);

/// Platform hook keeping the process alive while a push payload is handled.
pub trait WakeSource: Send + Sync {
    /// Acquire a lease bounded by `max_hold`. The lease is released when
    /// dropped, which must happen regardless of success or failure.
    fn acquire(&self, label: &str, max_hold: Duration) -> WakeLease;
}

/// RAII wake lease; releases on drop.
pub struct WakeLease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WakeLease {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Lease that holds nothing. For platforms without wake locks.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for WakeLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Wake source for platforms that do not need one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWakeSource;

impl WakeSource for NoopWakeSource {
    fn acquire(&self, _label: &str, _max_hold: Duration) -> WakeLease {
        WakeLease::noop()
    }
}

/// Receives raw push payloads, normalizes them, presents the alert, and
/// forwards the event to the reconciler.
pub struct PushIngestor {
    reconciler: Arc<Reconciler>,
    presenter: Arc<AlertPresenter>,
    wake: Arc<dyn WakeSource>,
}

impl PushIngestor {
    pub fn new(
        reconciler: Arc<Reconciler>,
        presenter: Arc<AlertPresenter>,
        wake: Arc<dyn WakeSource>,
    ) -> Self {
        Self {
            reconciler,
            presenter,
            wake,
        }
    }

    /// Handle one delivered payload. Returns the resulting state, or `None`
    /// when the payload was unrecognized and dropped.
    ///
    /// Duplicate delivery of the same logical message is harmless: the
    /// presenter replaces under the same tag and the reconciler discards
    /// no-op updates.
    pub async fn ingest(&self, payload: &HashMap<String, String>) -> Result<Option<LivenessState>> {
        let _lease = self.wake.acquire("push-ingest", MAX_WAKE_HOLD);

        let Some(event) = PushEvent::from_payload(payload) else {
            warn!(
                "[PushIngest] dropping unrecognized payload (type={:?})",
                payload.get("type")
            );
            return Ok(None);
        };
        debug!(
            "[PushIngest] {:?} for {} (emergency={})",
            event.kind, event.checker_id, event.emergency
        );

        // Present first: the user must be alerted even if persistence or
        // reconciliation below fails.
        let (category, title, body) = compose_alert(&event);
        if let Err(err) = self
            .presenter
            .present(category, &title, &body, &event.checker_id)
            .await
        {
            warn!("[PushIngest] presentation failed: {}", err);
        }

        let state = self.reconciler.apply_event(&event).await?;
        Ok(Some(state))
    }
}

/// Compose the user-facing alert for a push event.
fn compose_alert(event: &PushEvent) -> (AlertCategory, String, String) {
    let checker = &event.checker_id;
    match event.kind {
        PushKind::Alarm | PushKind::Missed if event.emergency => (
            AlertCategory::Emergency,
            "EMERGENCY ALARM!".to_string(),
            format!("{} triggered an emergency!", checker),
        ),
        PushKind::Alarm => (
            AlertCategory::Alarm,
            "Alarm: check-in missed!".to_string(),
            format!("{} missed their check-in. Tap to acknowledge.", checker),
        ),
        PushKind::Missed => (
            AlertCategory::Alarm,
            "Missed check-in".to_string(),
            format!("{} missed their check-in.", checker),
        ),
        PushKind::Reminder => (
            AlertCategory::Reminder,
            "Time to check in!".to_string(),
            "Please check in now.".to_string(),
        ),
        PushKind::Sleep => (
            AlertCategory::Sleep,
            "Checker asleep".to_string(),
            format!("{} has gone to sleep.", checker),
        ),
        PushKind::Checkin => {
            let mut body = format!("{} checked in!", checker);
            if let Some(pulse) = &event.pulse {
                body.push_str(&format!(" Pulse {}", pulse));
            }
            if let Some(bp) = &event.blood_pressure {
                body.push_str(&format!(" BP {}", bp));
            }
            (AlertCategory::Checkin, "Check-in received".to_string(), body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: PushKind, emergency: bool) -> PushEvent {
        PushEvent {
            kind,
            checker_id: "alice".to_string(),
            emergency,
            checkin_time: None,
            pulse: None,
            blood_pressure: None,
            received_at: 0,
        }
    }

    #[test]
    fn emergency_alarm_maps_to_emergency_category() {
        let (category, title, _) = compose_alert(&event(PushKind::Alarm, true));
        assert_eq!(category, AlertCategory::Emergency);
        assert!(title.contains("EMERGENCY"));
    }

    #[test]
    fn plain_alarm_maps_to_alarm_category() {
        let (category, _, body) = compose_alert(&event(PushKind::Alarm, false));
        assert_eq!(category, AlertCategory::Alarm);
        assert!(body.contains("acknowledge"));
    }

    #[test]
    fn missed_shares_the_alarm_category() {
        let (category, _, _) = compose_alert(&event(PushKind::Missed, false));
        assert_eq!(category, AlertCategory::Alarm);
    }

    #[test]
    fn checkin_body_appends_vitals() {
        let mut e = event(PushKind::Checkin, false);
        e.pulse = Some("64".to_string());
        e.blood_pressure = Some("120/80".to_string());
        let (category, _, body) = compose_alert(&e);
        assert_eq!(category, AlertCategory::Checkin);
        assert!(body.contains("Pulse 64"));
        assert!(body.contains("BP 120/80"));
    }

    #[test]
    fn wake_lease_releases_on_drop() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        {
            let _lease = WakeLease::new(move || flag.store(true, Ordering::SeqCst));
            assert!(!released.load(Ordering::SeqCst));
        }
        assert!(released.load(Ordering::SeqCst));
    }
}
