//! Reconciler: merges push events and polled snapshots into one coherent
//! liveness state per checker.
//!
//! Push delivery is at-least-once and unordered relative to polling, so the
//! merge has to be idempotent and must never let a stale source regress a
//! newer fact. Snapshots are authoritative for steady-state fields; events
//! only trigger immediate reactions. The server alone decides whether a
//! check-in was actually missed — local clocks never raise alarms.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::{Error, Result};
use crate::liveness::{
    minutes_to_secs, AlertCategory, AlertPresenter, CheckerLiveness, HealthSample, LivenessState,
    LivenessStore, PushEvent, PushKind, StatusSnapshot,
};

/// Flags cleared by a server-accepted acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckOutcome {
    pub cleared_alarm: bool,
    pub cleared_emergency: bool,
}

/// Per-checker state machine with snapshot-authoritative merge.
///
/// Updates for the same checker id serialize through a per-checker async
/// mutex; different checkers proceed fully in parallel. Every accepted
/// update is persisted before the per-checker lock is released.
pub struct Reconciler {
    store: Arc<dyn LivenessStore>,
    presenter: Arc<AlertPresenter>,
    entries: Mutex<HashMap<String, Arc<AsyncMutex<CheckerLiveness>>>>,
}

impl Reconciler {
    /// Build a reconciler, rehydrating cached liveness rows so alarms
    /// survive process restarts and reboots.
    pub fn new(store: Arc<dyn LivenessStore>, presenter: Arc<AlertPresenter>) -> Result<Self> {
        let mut entries = HashMap::new();
        for liveness in store.load_all_liveness()? {
            debug!(
                "[Reconcile] rehydrated {} (state={:?}, generation={})",
                liveness.checker_id,
                liveness.state(),
                liveness.generation
            );
            entries.insert(
                liveness.checker_id.clone(),
                Arc::new(AsyncMutex::new(liveness)),
            );
        }
        Ok(Self {
            store,
            presenter,
            entries: Mutex::new(entries),
        })
    }

    fn entry(&self, checker_id: &str) -> Result<Arc<AsyncMutex<CheckerLiveness>>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::storage("liveness registry poisoned"))?;
        Ok(entries
            .entry(checker_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(CheckerLiveness::new(checker_id))))
            .clone())
    }

    /// Current liveness for a checker, if any update was ever observed.
    pub async fn current(&self, checker_id: &str) -> Option<CheckerLiveness> {
        let entry = {
            let entries = self.entries.lock().ok()?;
            entries.get(checker_id).cloned()?
        };
        let guard = entry.lock().await;
        Some(guard.clone())
    }

    /// Apply a normalized push event.
    ///
    /// Events trigger immediately but never regress fields the next
    /// snapshot will correct. A duplicate delivery that changes nothing is
    /// discarded without bumping the generation.
    pub async fn apply_event(&self, event: &PushEvent) -> Result<LivenessState> {
        let entry = self.entry(&event.checker_id)?;
        let mut liveness = entry.lock().await;
        let prior = liveness.clone();

        match event.kind {
            PushKind::Checkin => {
                liveness.observe_checkin(event.effective_timestamp());
                liveness.sleeping = false;
                liveness.missed = false;
                liveness.alarm_active = false;
                liveness.reminder_due = false;
                if event.pulse.is_some() || event.blood_pressure.is_some() {
                    liveness.last_health_sample = Some(HealthSample {
                        pulse: event.pulse.clone(),
                        blood_pressure: event.blood_pressure.clone(),
                        observed_at: event.effective_timestamp(),
                    });
                }
            }
            PushKind::Sleep => {
                liveness.sleeping = true;
                // Sleep suspends missed evaluation and always clears an
                // active alarm, even one raised by an in-flight event.
                liveness.alarm_active = false;
                liveness.reminder_due = false;
            }
            PushKind::Reminder => {
                if matches!(
                    liveness.state(),
                    LivenessState::Awake | LivenessState::ReminderDue
                ) {
                    liveness.reminder_due = true;
                }
            }
            PushKind::Missed => {
                liveness.missed = true;
                if !liveness.sleeping {
                    liveness.alarm_active = true;
                }
            }
            PushKind::Alarm => {
                if !event.emergency {
                    liveness.missed = true;
                    if !liveness.sleeping {
                        liveness.alarm_active = true;
                    }
                }
            }
        }
        if event.emergency {
            liveness.emergency_active = true;
        }

        if *liveness == prior {
            debug!(
                "[Reconcile] duplicate {:?} event for {} discarded",
                event.kind, event.checker_id
            );
            return Ok(liveness.state());
        }

        liveness.generation = liveness.generation.saturating_add(1);
        self.store.save_liveness(&liveness)?;
        debug!(
            "[Reconcile] event {:?} for {}: {:?} -> {:?} (generation={})",
            event.kind,
            event.checker_id,
            prior.state(),
            liveness.state(),
            liveness.generation
        );
        Ok(liveness.state())
    }

    /// Apply an authoritative snapshot.
    ///
    /// Snapshots overwrite every steady-state field except `last_checkin_at`,
    /// which never rolls backward; a snapshot reporting an older check-in is
    /// still accepted for all other fields. Alert presentation follows the
    /// state delta: newly raised alarm/emergency conditions are presented,
    /// conditions the server cleared elsewhere are cleared locally too.
    pub async fn apply_snapshot(&self, snapshot: &StatusSnapshot) -> Result<LivenessState> {
        let entry = self.entry(&snapshot.checker_id)?;
        let mut liveness = entry.lock().await;
        let prior = liveness.clone();

        liveness.sleeping = snapshot.sleeping.unwrap_or(false);
        liveness.missed = snapshot.missed_notified.unwrap_or(false);
        liveness.emergency_active = snapshot.emergency.unwrap_or(false);
        liveness.alarm_active = liveness.missed && !liveness.sleeping;

        if let Some(secs) = snapshot.check_interval.and_then(minutes_to_secs) {
            liveness.check_interval_secs = secs;
        }
        if let Some(secs) = snapshot.check_window.and_then(minutes_to_secs) {
            liveness.check_window_secs = secs;
        }

        if let Some(reported) = snapshot.last_checkin {
            if liveness.observe_checkin(reported) {
                liveness.reminder_due = false;
            } else if Some(reported) != prior.last_checkin_at {
                debug!(
                    "[Reconcile] snapshot for {} reports stale last_checkin {} < {:?}; field ignored",
                    snapshot.checker_id, reported, prior.last_checkin_at
                );
            }
        }
        if liveness.sleeping || liveness.alarm_active || liveness.emergency_active {
            liveness.reminder_due = false;
        }

        if snapshot.pulse.is_some() || snapshot.blood_pressure.is_some() {
            liveness.last_health_sample = Some(HealthSample {
                pulse: snapshot.pulse.clone(),
                blood_pressure: snapshot.blood_pressure.clone(),
                observed_at: snapshot
                    .last_health_checkin
                    .or(snapshot.last_checkin)
                    .unwrap_or_default(),
            });
        }

        if *liveness == prior {
            return Ok(liveness.state());
        }

        liveness.generation = liveness.generation.saturating_add(1);
        self.store.save_liveness(&liveness)?;
        info!(
            "[Reconcile] snapshot for {}: {:?} -> {:?} (generation={})",
            snapshot.checker_id,
            prior.state(),
            liveness.state(),
            liveness.generation
        );

        // Presentation follows the delta; its failures never abort the
        // state update above.
        if liveness.alarm_active && !prior.alarm_active {
            self.present_logged(
                AlertCategory::Alarm,
                "Alarm: check-in missed!",
                &format!(
                    "{} missed their check-in. Tap to acknowledge.",
                    snapshot.checker_id
                ),
                &snapshot.checker_id,
            )
            .await;
        } else if !liveness.alarm_active && prior.alarm_active {
            self.clear_logged(AlertCategory::Alarm).await;
        }
        if liveness.emergency_active && !prior.emergency_active {
            self.present_logged(
                AlertCategory::Emergency,
                "EMERGENCY ALARM!",
                &format!("{} triggered an emergency!", snapshot.checker_id),
                &snapshot.checker_id,
            )
            .await;
        } else if !liveness.emergency_active && prior.emergency_active {
            self.clear_logged(AlertCategory::Emergency).await;
        }

        Ok(liveness.state())
    }

    /// Locally clear alarm/emergency after the server accepted an
    /// acknowledgment. Clears only the flags that were active; a queued
    /// sleep is left untouched.
    pub async fn mark_acknowledged(&self, checker_id: &str) -> Result<AckOutcome> {
        let entry = self.entry(checker_id)?;
        let mut liveness = entry.lock().await;

        let outcome = AckOutcome {
            cleared_alarm: liveness.alarm_active || liveness.missed,
            cleared_emergency: liveness.emergency_active,
        };
        if !outcome.cleared_alarm && !outcome.cleared_emergency {
            return Ok(outcome);
        }

        liveness.alarm_active = false;
        liveness.missed = false;
        liveness.emergency_active = false;
        liveness.generation = liveness.generation.saturating_add(1);
        self.store.save_liveness(&liveness)?;
        info!(
            "[Reconcile] acknowledgment for {} cleared alarm={} emergency={}",
            checker_id, outcome.cleared_alarm, outcome.cleared_emergency
        );
        Ok(outcome)
    }

    /// Forget a checker entirely. Only unregister/reset call this.
    pub async fn forget(&self, checker_id: &str) -> Result<()> {
        let removed = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| Error::storage("liveness registry poisoned"))?;
            entries.remove(checker_id)
        };
        if let Some(entry) = removed {
            // Wait for in-flight updates before dropping the row.
            let _guard = entry.lock().await;
            self.store.delete_liveness(checker_id)?;
            info!("[Reconcile] forgot checker {}", checker_id);
        }
        Ok(())
    }

    async fn present_logged(
        &self,
        category: AlertCategory,
        title: &str,
        body: &str,
        checker_id: &str,
    ) {
        if let Err(err) = self.presenter.present(category, title, body, checker_id).await {
            warn!(
                "[Reconcile] presenting {} alert failed: {}",
                category.slug(),
                err
            );
        }
    }

    async fn clear_logged(&self, category: AlertCategory) {
        if let Err(err) = self.presenter.clear(category).await {
            warn!(
                "[Reconcile] clearing {} alert failed: {}",
                category.slug(),
                err
            );
        }
    }
}
