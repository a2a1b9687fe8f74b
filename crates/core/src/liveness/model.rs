//! Liveness domain models.

use serde::{Deserialize, Serialize};

/// Role a local user plays in the check-in protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Checker,
    Watcher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Checker => "checker",
            Role::Watcher => "watcher",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "checker" => Some(Role::Checker),
            "watcher" => Some(Role::Watcher),
            _ => None,
        }
    }
}

/// Local identity established during setup. Immutable once set; cleared
/// atomically on reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    /// Checker this user watches. Only set for watchers.
    pub watched_checker_id: Option<String>,
    pub api_key: String,
}

impl Identity {
    /// The checker id this identity cares about: self for checkers, the
    /// watched checker for watchers.
    pub fn checker_id(&self) -> &str {
        match self.role {
            Role::Checker => &self.user_id,
            Role::Watcher => self
                .watched_checker_id
                .as_deref()
                .unwrap_or(&self.user_id),
        }
    }
}

/// Optional checker-supplied vitals riding along a check-in. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    pub pulse: Option<String>,
    pub blood_pressure: Option<String>,
    /// Epoch millis of the check-in that carried the sample.
    pub observed_at: i64,
}

/// Alert categories with tag-based replace-not-stack semantics: at most one
/// live presentation per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Reminder,
    Alarm,
    Emergency,
    Checkin,
    Sleep,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 5] = [
        AlertCategory::Reminder,
        AlertCategory::Alarm,
        AlertCategory::Emergency,
        AlertCategory::Checkin,
        AlertCategory::Sleep,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            AlertCategory::Reminder => "reminder",
            AlertCategory::Alarm => "alarm",
            AlertCategory::Emergency => "emergency",
            AlertCategory::Checkin => "checkin",
            AlertCategory::Sleep => "sleep",
        }
    }

    /// Notification tag. Posting under an existing tag replaces the previous
    /// delivery instead of stacking a new one.
    pub fn tag(&self) -> String {
        format!("checkin_{}", self.slug())
    }

    /// Stable per-category notification id.
    pub fn notification_id(&self) -> i64 {
        match self {
            AlertCategory::Alarm => 1001,
            AlertCategory::Checkin => 1002,
            AlertCategory::Reminder => 1003,
            AlertCategory::Sleep => 1004,
            AlertCategory::Emergency => 1005,
        }
    }

    /// Alarm-grade alerts stay on screen and carry an Acknowledge action.
    pub fn is_persistent(&self) -> bool {
        matches!(self, AlertCategory::Alarm | AlertCategory::Emergency)
    }
}

/// Derived per-checker presentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    Awake,
    Sleeping,
    ReminderDue,
    MissedAlarm,
    Emergency,
}

/// Everything locally known about one watched checker.
///
/// Created on the first observed event or snapshot for a checker id,
/// persisted across process restarts, destroyed only on unregister/reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerLiveness {
    pub checker_id: String,
    /// Epoch millis of the newest known check-in. Never rolls backward.
    pub last_checkin_at: Option<i64>,
    pub check_interval_secs: u32,
    pub check_window_secs: u32,
    pub sleeping: bool,
    /// Server-confirmed missed status.
    pub missed: bool,
    pub alarm_active: bool,
    pub emergency_active: bool,
    /// Advisory reminder flag; does not by itself imply anything is wrong.
    pub reminder_due: bool,
    pub last_health_sample: Option<HealthSample>,
    /// Bumped on every accepted update; duplicates and stale data do not
    /// count as accepted.
    pub generation: u64,
}

/// Default check cadence until the server reports the real contract.
pub const DEFAULT_CHECK_INTERVAL_SECS: u32 = 60;
pub const DEFAULT_CHECK_WINDOW_SECS: u32 = 30;

impl CheckerLiveness {
    pub fn new(checker_id: impl Into<String>) -> Self {
        Self {
            checker_id: checker_id.into(),
            last_checkin_at: None,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            check_window_secs: DEFAULT_CHECK_WINDOW_SECS,
            sleeping: false,
            missed: false,
            alarm_active: false,
            emergency_active: false,
            reminder_due: false,
            last_health_sample: None,
            generation: 0,
        }
    }

    /// Derived state, most urgent condition first.
    pub fn state(&self) -> LivenessState {
        if self.emergency_active {
            LivenessState::Emergency
        } else if self.alarm_active {
            LivenessState::MissedAlarm
        } else if self.sleeping {
            LivenessState::Sleeping
        } else if self.reminder_due {
            LivenessState::ReminderDue
        } else {
            LivenessState::Awake
        }
    }

    /// When the next check-in is due (epoch millis). Display only — the
    /// server alone decides whether a check-in is actually late.
    pub fn next_checkin_deadline(&self) -> Option<i64> {
        self.last_checkin_at
            .map(|ts| ts + i64::from(self.check_interval_secs) * 1000)
    }

    /// End of the grace window (epoch millis). Display only.
    pub fn grace_deadline(&self) -> Option<i64> {
        self.next_checkin_deadline()
            .map(|ts| ts + i64::from(self.check_window_secs) * 1000)
    }

    /// Record a check-in timestamp, keeping `last_checkin_at` monotonic.
    /// Returns true when the timestamp advanced.
    pub(crate) fn observe_checkin(&mut self, timestamp: i64) -> bool {
        match self.last_checkin_at {
            Some(current) if timestamp <= current => false,
            _ => {
                self.last_checkin_at = Some(timestamp);
                true
            }
        }
    }
}

/// Authoritative status pulled from the server.
///
/// Field names and units follow the server's JSON contract: intervals are
/// fractional minutes, timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusSnapshot {
    pub checker_id: String,
    pub last_checkin: Option<i64>,
    pub missed_notified: Option<bool>,
    pub check_interval: Option<f32>,
    pub check_window: Option<f32>,
    pub sleeping: Option<bool>,
    pub emergency: Option<bool>,
    pub pulse: Option<String>,
    pub blood_pressure: Option<String>,
    pub last_health_checkin: Option<i64>,
    #[serde(default)]
    pub watchers: Vec<String>,
}

/// Convert wire minutes to whole seconds, rejecting non-positive values.
pub fn minutes_to_secs(minutes: f32) -> Option<u32> {
    if minutes > 0.0 {
        Some((minutes * 60.0).round() as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serialization_matches_wire_contract() {
        let actual = AlertCategory::ALL
            .iter()
            .map(|c| serde_json::to_string(c).expect("serialize category"))
            .collect::<Vec<_>>();
        let expected = vec![
            "\"reminder\"",
            "\"alarm\"",
            "\"emergency\"",
            "\"checkin\"",
            "\"sleep\"",
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn category_tags_are_unique() {
        let mut tags: Vec<String> = AlertCategory::ALL.iter().map(|c| c.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), AlertCategory::ALL.len());
    }

    #[test]
    fn deadlines_derive_from_interval_and_window() {
        let mut liveness = CheckerLiveness::new("alice");
        assert_eq!(liveness.next_checkin_deadline(), None);

        liveness.last_checkin_at = Some(10_000);
        liveness.check_interval_secs = 60;
        liveness.check_window_secs = 15;
        assert_eq!(liveness.next_checkin_deadline(), Some(70_000));
        assert_eq!(liveness.grace_deadline(), Some(85_000));
    }

    #[test]
    fn observe_checkin_never_moves_backward() {
        let mut liveness = CheckerLiveness::new("alice");
        assert!(liveness.observe_checkin(5_000));
        assert!(!liveness.observe_checkin(4_000));
        assert!(!liveness.observe_checkin(5_000));
        assert_eq!(liveness.last_checkin_at, Some(5_000));
        assert!(liveness.observe_checkin(6_000));
    }

    #[test]
    fn state_ranks_emergency_above_alarm_and_sleep() {
        let mut liveness = CheckerLiveness::new("alice");
        assert_eq!(liveness.state(), LivenessState::Awake);

        liveness.reminder_due = true;
        assert_eq!(liveness.state(), LivenessState::ReminderDue);

        liveness.sleeping = true;
        assert_eq!(liveness.state(), LivenessState::Sleeping);

        liveness.alarm_active = true;
        liveness.sleeping = false;
        assert_eq!(liveness.state(), LivenessState::MissedAlarm);

        liveness.emergency_active = true;
        assert_eq!(liveness.state(), LivenessState::Emergency);
    }

    #[test]
    fn snapshot_deserializes_server_payload() {
        let body = r#"{
            "checker_id": "alice",
            "last_checkin": 1700000000000,
            "missed_notified": false,
            "check_interval": 1.0,
            "check_window": 0.5,
            "sleeping": false,
            "emergency": false,
            "pulse": "62",
            "blood_pressure": "120/80",
            "last_health_checkin": 1700000000000,
            "watchers": ["bob"]
        }"#;
        let snapshot: StatusSnapshot = serde_json::from_str(body).expect("snapshot");
        assert_eq!(snapshot.checker_id, "alice");
        assert_eq!(snapshot.watchers, vec!["bob".to_string()]);
        assert_eq!(minutes_to_secs(snapshot.check_interval.unwrap()), Some(60));
        assert_eq!(minutes_to_secs(snapshot.check_window.unwrap()), Some(30));
    }

    #[test]
    fn minutes_to_secs_rejects_non_positive() {
        assert_eq!(minutes_to_secs(0.0), None);
        assert_eq!(minutes_to_secs(-1.0), None);
        assert_eq!(minutes_to_secs(0.5), Some(30));
    }

    #[test]
    fn identity_resolves_watched_checker() {
        let checker = Identity {
            user_id: "alice".to_string(),
            role: Role::Checker,
            watched_checker_id: None,
            api_key: "key".to_string(),
        };
        assert_eq!(checker.checker_id(), "alice");

        let watcher = Identity {
            user_id: "bob".to_string(),
            role: Role::Watcher,
            watched_checker_id: Some("alice".to_string()),
            api_key: "key".to_string(),
        };
        assert_eq!(watcher.checker_id(), "alice");
    }
}
