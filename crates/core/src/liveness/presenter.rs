//! Alert presentation with replace-not-stack semantics.
//!
//! The presenter owns the OS notification lifecycle for exactly one active
//! alert per category. The actual platform surface (channels, sound, action
//! buttons) sits behind [`NotificationSurface`]; foreground screens can
//! additionally subscribe as [`ForegroundObserver`]s to mirror alerts as
//! in-app dialogs. Zero observers is the normal backgrounded case, not an
//! error.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::liveness::{AlertCategory, LivenessStore};

/// Vibration pattern for alarm-grade alerts (millis: pause/buzz pairs).
pub const ALARM_VIBRATION_PATTERN: &[u64] = &[0, 500, 200, 500];
/// Vibration pattern for reminders and confirmations.
pub const NOTICE_VIBRATION_PATTERN: &[u64] = &[0, 250, 250, 250];

/// Delay between cancelling a tag and re-posting under it. Some platforms
/// coalesce a cancel with an immediately following post and drop the new
/// notification; the gap keeps the two operations distinct.
pub const DEFAULT_REPOST_DELAY: Duration = Duration::from_millis(250);

/// Audio class routed to the platform's corresponding notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundClass {
    /// Looping alarm-class audio, bypasses do-not-disturb.
    Alarm,
    /// Regular notification audio.
    Notification,
    /// Short confirmation tone.
    Confirmation,
}

/// Fully resolved alert, ready for the platform surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub category: AlertCategory,
    pub tag: String,
    pub notification_id: i64,
    pub title: String,
    pub body: String,
    pub checker_id: String,
    pub sound: SoundClass,
    pub vibration: &'static [u64],
    /// Not dismissable by swipe; cleared only through `clear`.
    pub persistent: bool,
    /// Carries an inline Acknowledge action.
    pub acknowledge_action: bool,
}

/// Platform notification surface.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    async fn post(&self, alert: &AlertRequest) -> Result<()>;

    /// Cancel the presentation under `tag`, stopping any looping sound,
    /// vibration, or wake hold tied to it. Cancelling something that is not
    /// showing must be a no-op.
    async fn cancel(&self, tag: &str, notification_id: i64) -> Result<()>;
}

/// Foreground mirror of the notification stream (in-app dialogs).
pub trait ForegroundObserver: Send + Sync {
    fn alert_presented(&self, alert: &AlertRequest);
    fn alert_cleared(&self, category: AlertCategory);
}

fn sound_class(category: AlertCategory) -> SoundClass {
    match category {
        AlertCategory::Alarm | AlertCategory::Emergency => SoundClass::Alarm,
        AlertCategory::Reminder => SoundClass::Notification,
        AlertCategory::Checkin | AlertCategory::Sleep => SoundClass::Confirmation,
    }
}

fn vibration_pattern(category: AlertCategory) -> &'static [u64] {
    match category {
        AlertCategory::Alarm | AlertCategory::Emergency => ALARM_VIBRATION_PATTERN,
        _ => NOTICE_VIBRATION_PATTERN,
    }
}

/// Owns one active alert per category, replacing rather than stacking.
pub struct AlertPresenter {
    surface: Arc<dyn NotificationSurface>,
    store: Arc<dyn LivenessStore>,
    observers: Mutex<Vec<Arc<dyn ForegroundObserver>>>,
    repost_delay: Duration,
}

impl AlertPresenter {
    pub fn new(surface: Arc<dyn NotificationSurface>, store: Arc<dyn LivenessStore>) -> Self {
        Self::with_repost_delay(surface, store, DEFAULT_REPOST_DELAY)
    }

    pub fn with_repost_delay(
        surface: Arc<dyn NotificationSurface>,
        store: Arc<dyn LivenessStore>,
        repost_delay: Duration,
    ) -> Self {
        Self {
            surface,
            store,
            observers: Mutex::new(Vec::new()),
            repost_delay,
        }
    }

    /// Register a foreground observer. Observers are never required; without
    /// any, only the OS-level notification is shown.
    pub fn register_observer(&self, observer: Arc<dyn ForegroundObserver>) -> Result<()> {
        self.observers
            .lock()
            .map_err(|_| Error::presentation("observer list poisoned"))?
            .push(observer);
        Ok(())
    }

    /// Present an alert, replacing any live presentation in the same
    /// category.
    pub async fn present(
        &self,
        category: AlertCategory,
        title: &str,
        body: &str,
        checker_id: &str,
    ) -> Result<()> {
        let alert = AlertRequest {
            category,
            tag: category.tag(),
            notification_id: category.notification_id(),
            title: title.to_string(),
            body: body.to_string(),
            checker_id: checker_id.to_string(),
            sound: sound_class(category),
            vibration: vibration_pattern(category),
            persistent: category.is_persistent(),
            acknowledge_action: category.is_persistent(),
        };

        // Cancel the previous delivery under this tag first so the new post
        // replaces instead of stacking. A failed cancel is not fatal; the
        // post below reuses the same tag anyway.
        let previous_id = self
            .store
            .last_notification_id(category)
            .unwrap_or_default()
            .unwrap_or_else(|| category.notification_id());
        if let Err(err) = self.surface.cancel(&alert.tag, previous_id).await {
            warn!(
                "[Presenter] cancel before re-post failed for {}: {}",
                alert.tag, err
            );
        }

        if !self.repost_delay.is_zero() {
            tokio::time::sleep(self.repost_delay).await;
        }

        self.surface.post(&alert).await?;
        debug!(
            "[Presenter] posted {} alert for {} (tag={})",
            category.slug(),
            checker_id,
            alert.tag
        );

        if let Err(err) = self
            .store
            .set_last_notification_id(category, alert.notification_id)
        {
            warn!("[Presenter] notification bookkeeping failed: {}", err);
        }

        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                observer.alert_presented(&alert);
            }
        }
        Ok(())
    }

    /// Cancel the live presentation for a category and stop its sound.
    pub async fn clear(&self, category: AlertCategory) -> Result<()> {
        let notification_id = self
            .store
            .last_notification_id(category)
            .unwrap_or_default()
            .unwrap_or_else(|| category.notification_id());
        self.surface.cancel(&category.tag(), notification_id).await?;
        if let Err(err) = self.store.clear_last_notification_id(category) {
            warn!("[Presenter] notification bookkeeping failed: {}", err);
        }
        debug!("[Presenter] cleared {} alert", category.slug());

        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                observer.alert_cleared(category);
            }
        }
        Ok(())
    }

    /// Clear every category. Used on reset/unregister.
    pub async fn clear_all(&self) {
        for category in AlertCategory::ALL {
            if let Err(err) = self.clear(category).await {
                warn!("[Presenter] clear {} failed: {}", category.slug(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::tests::support::{InMemoryStore, RecordingObserver, RecordingSurface};

    fn presenter(surface: Arc<RecordingSurface>) -> AlertPresenter {
        AlertPresenter::with_repost_delay(
            surface,
            Arc::new(InMemoryStore::default()),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn same_category_replaces_not_stacks() {
        let surface = Arc::new(RecordingSurface::default());
        let presenter = presenter(surface.clone());

        presenter
            .present(AlertCategory::Checkin, "Check-in", "alice checked in", "alice")
            .await
            .expect("present");
        presenter
            .present(AlertCategory::Checkin, "Check-in", "alice checked in", "alice")
            .await
            .expect("present again");

        assert_eq!(surface.active_count(), 1);
        assert_eq!(surface.post_count(), 2);
    }

    #[tokio::test]
    async fn alarm_alerts_are_persistent_with_acknowledge_action() {
        let surface = Arc::new(RecordingSurface::default());
        let presenter = presenter(surface.clone());

        presenter
            .present(AlertCategory::Alarm, "Alarm", "missed", "alice")
            .await
            .expect("present");

        let alert = surface.last_posted().expect("posted alert");
        assert!(alert.persistent);
        assert!(alert.acknowledge_action);
        assert_eq!(alert.sound, SoundClass::Alarm);
        assert_eq!(alert.vibration, ALARM_VIBRATION_PATTERN);

        presenter
            .present(AlertCategory::Sleep, "Sleep", "asleep", "alice")
            .await
            .expect("present");
        let alert = surface.last_posted().expect("posted alert");
        assert!(!alert.persistent);
        assert_eq!(alert.sound, SoundClass::Confirmation);
    }

    #[tokio::test]
    async fn clear_cancels_and_notifies_observers() {
        let surface = Arc::new(RecordingSurface::default());
        let presenter = presenter(surface.clone());
        let observer = Arc::new(RecordingObserver::default());
        presenter
            .register_observer(observer.clone())
            .expect("register");

        presenter
            .present(AlertCategory::Alarm, "Alarm", "missed", "alice")
            .await
            .expect("present");
        presenter.clear(AlertCategory::Alarm).await.expect("clear");

        assert_eq!(surface.active_count(), 0);
        assert_eq!(observer.presented(), 1);
        assert_eq!(observer.cleared(), 1);
    }

    #[tokio::test]
    async fn presenting_without_observers_is_fine() {
        let surface = Arc::new(RecordingSurface::default());
        let presenter = presenter(surface.clone());
        presenter
            .present(AlertCategory::Reminder, "Reminder", "check in", "alice")
            .await
            .expect("present");
        assert_eq!(surface.active_count(), 1);
    }
}
