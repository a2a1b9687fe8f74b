//! Push payload normalization.
//!
//! The push transport delivers flat string maps with at-least-once,
//! unordered semantics. Everything here must therefore tolerate duplicates
//! and arbitrary interleaving with polled snapshots.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Recognized push message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    Checkin,
    Sleep,
    Reminder,
    Missed,
    Alarm,
}

impl PushKind {
    /// Parse the payload `type` field. An absent field means a plain
    /// check-in (historical server behavior); an unrecognized value is
    /// rejected so callers can drop the message.
    pub fn from_type_field(value: Option<&str>) -> Option<PushKind> {
        match value {
            None => Some(PushKind::Checkin),
            Some("checkin") => Some(PushKind::Checkin),
            Some("sleep") => Some(PushKind::Sleep),
            Some("reminder") => Some(PushKind::Reminder),
            Some("missed") => Some(PushKind::Missed),
            Some("alarm") => Some(PushKind::Alarm),
            Some(_) => None,
        }
    }
}

/// A normalized push event, ready for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub kind: PushKind,
    pub checker_id: String,
    /// Set when the payload carried `emergency: "true"`.
    pub emergency: bool,
    /// Epoch millis of the check-in the message describes, if any.
    pub checkin_time: Option<i64>,
    pub pulse: Option<String>,
    pub blood_pressure: Option<String>,
    /// Local receipt time, epoch millis.
    pub received_at: i64,
}

impl PushEvent {
    /// Normalize a raw payload map. Returns `None` when the `type` field is
    /// present but unrecognized or the checker id is missing.
    pub fn from_payload(data: &HashMap<String, String>) -> Option<PushEvent> {
        let kind = PushKind::from_type_field(data.get("type").map(String::as_str))?;
        let checker_id = data.get("checker_id")?.clone();

        Some(PushEvent {
            kind,
            checker_id,
            emergency: data.get("emergency").map(String::as_str) == Some("true"),
            checkin_time: data.get("checkin_time").and_then(|v| v.parse::<i64>().ok()),
            pulse: data.get("pulse").filter(|v| !v.is_empty()).cloned(),
            blood_pressure: data
                .get("blood_pressure")
                .filter(|v| !v.is_empty())
                .cloned(),
            received_at: Utc::now().timestamp_millis(),
        })
    }

    /// Best timestamp for this event: the payload's check-in time when
    /// present, local receipt time otherwise.
    pub fn effective_timestamp(&self) -> i64 {
        self.checkin_time.unwrap_or(self.received_at)
    }
}
