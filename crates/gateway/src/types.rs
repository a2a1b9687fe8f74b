//! Wire types for the check-in server API.
//!
//! Field names are the server's JSON contract verbatim: snake_case keys,
//! epoch-millis timestamps, and check intervals/windows in fractional
//! minutes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCheckerRequest {
    pub checker_id: String,
    /// Device push token for server-initiated notifications.
    pub checker_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWatcherRequest {
    pub checker_id: String,
    pub watcher_id: String,
    pub watcher_token: String,
}

/// Check-in submission. Absent optional fields keep the server's stored
/// values; the server stamps its own timestamp when none is supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub checker_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Minutes, fractional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<f32>,
    /// Minutes, fractional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_window: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
}

impl CheckinRequest {
    pub fn new(checker_id: impl Into<String>) -> Self {
        Self {
            checker_id: checker_id.into(),
            timestamp: None,
            check_interval: None,
            check_window: None,
            pulse: None,
            blood_pressure: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepRequest {
    pub checker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRequest {
    pub checker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcknowledgeAlarmRequest {
    pub checker_id: String,
}

/// Generic acknowledgment returned by the mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAck {
    pub ok: bool,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Error body the server attaches to non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkin_request_omits_absent_fields() {
        let body = serde_json::to_string(&CheckinRequest::new("alice")).expect("serialize");
        assert_eq!(body, r#"{"checker_id":"alice"}"#);
    }

    #[test]
    fn checkin_request_carries_interval_in_minutes() {
        let mut request = CheckinRequest::new("alice");
        request.check_interval = Some(1.0);
        request.check_window = Some(0.5);
        let body = serde_json::to_string(&request).expect("serialize");
        assert!(body.contains(r#""check_interval":1.0"#));
        assert!(body.contains(r#""check_window":0.5"#));
    }

    #[test]
    fn ack_tolerates_missing_timestamp() {
        let ack: ApiAck = serde_json::from_str(r#"{"ok":true}"#).expect("deserialize");
        assert!(ack.ok);
        assert_eq!(ack.timestamp, None);
    }
}
