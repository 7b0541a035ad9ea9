//! Request types for the session engine API.
//!
//! This module defines the JSON request structures for the HTTP endpoints
//! and their conversions into domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::TransitionAction;
use crate::models::{
    AttendanceCycle, AttendanceEvent, EventKind, MeetingAttendance, ParticipantRole,
    SessionWindow,
};

/// Request body for the `/calculate` endpoint.
///
/// A stateless attendance calculation over a posted window and cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// The scheduled session bounds.
    pub window: WindowRequest,
    /// Join/leave cycles, as events or intervals.
    #[serde(default)]
    pub cycles: Vec<AttendanceCycle>,
    /// Academy whose late tolerance applies; engine defaults otherwise.
    #[serde(default)]
    pub academy_id: Option<u64>,
    /// Participant role, for the record only.
    #[serde(default = "default_role")]
    pub role: ParticipantRole,
}

fn default_role() -> ParticipantRole {
    ParticipantRole::Student
}

impl CalculateRequest {
    /// Builds a detached attendance record holding the posted cycles.
    pub fn to_attendance(&self) -> MeetingAttendance {
        let mut attendance = MeetingAttendance::new(0, 0, self.role);
        attendance.cycles = self.cycles.clone();
        attendance
    }
}

/// Session bounds in a calculation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowRequest {
    /// Scheduled start.
    pub start: DateTime<Utc>,
    /// Scheduled end.
    pub end: DateTime<Utc>,
}

impl From<WindowRequest> for SessionWindow {
    fn from(req: WindowRequest) -> Self {
        SessionWindow {
            start: req.start,
            end: req.end,
        }
    }
}

/// Webhook event names sent by the meeting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// A participant entered the room.
    ParticipantJoined,
    /// A participant left the room.
    ParticipantLeft,
}

impl From<WebhookEventType> for EventKind {
    fn from(event: WebhookEventType) -> Self {
        match event {
            WebhookEventType::ParticipantJoined => EventKind::Join,
            WebhookEventType::ParticipantLeft => EventKind::Leave,
        }
    }
}

/// Request body for `POST /webhooks/meeting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRequest {
    /// Provider event id, used for deduplication.
    pub event_id: String,
    /// Joined or left.
    pub event: WebhookEventType,
    /// Target session.
    pub session_id: u64,
    /// Participant.
    pub user_id: u64,
    /// Participant role.
    #[serde(default = "default_role")]
    pub role: ParticipantRole,
    /// When the platform saw it happen.
    pub occurred_at: DateTime<Utc>,
}

impl WebhookRequest {
    /// Converts the webhook into a stored event received at `received_at`.
    pub fn into_event(self, received_at: DateTime<Utc>) -> AttendanceEvent {
        AttendanceEvent::new(
            self.event_id,
            self.session_id,
            self.user_id,
            self.role,
            self.event.into(),
            self.occurred_at,
            received_at,
        )
    }
}

/// Request body for `POST /sessions/:id/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Participant sending the heartbeat.
    pub user_id: u64,
}

/// Request body for `POST /sessions/:id/transitions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// The transition to apply.
    pub action: TransitionAction,
    /// Cancellation reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// User performing the transition.
    #[serde(default)]
    pub actor_id: Option<u64>,
}

/// Query string for `GET /teachers/:id/earnings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsQuery {
    /// Month as `YYYY-MM`.
    pub month: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_deserialize_calculate_request_with_mixed_cycles() {
        let json = r#"{
            "window": {"start": "2026-01-15T09:00:00Z", "end": "2026-01-15T10:00:00Z"},
            "cycles": [
                {"type": "join", "timestamp": "2026-01-15T09:00:00Z"},
                {"type": "leave", "timestamp": "2026-01-15T09:30:00Z"},
                {"joined_at": "2026-01-15T09:40:00Z", "left_at": "2026-01-15T10:00:00Z"}
            ]
        }"#;

        let request: CalculateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.cycles.len(), 3);
        assert_eq!(request.role, ParticipantRole::Student);
        assert!(request.academy_id.is_none());

        let window: SessionWindow = request.window.into();
        assert_eq!(window.duration_minutes(), 60);
        assert_eq!(request.to_attendance().cycles.len(), 3);
    }

    #[test]
    fn test_webhook_converts_to_pending_event() {
        let json = r#"{
            "event_id": "evt-1",
            "event": "participant_left",
            "session_id": 1,
            "user_id": 20,
            "occurred_at": "2026-01-15T09:30:00Z"
        }"#;

        let request: WebhookRequest = serde_json::from_str(json).unwrap();
        let event = request.into_event(make_datetime("2026-01-15T09:30:02Z"));

        assert_eq!(event.id, "evt-1");
        assert_eq!(event.kind, EventKind::Leave);
        assert_eq!(event.role, ParticipantRole::Student);
        assert_eq!(event.received_at, make_datetime("2026-01-15T09:30:02Z"));
    }

    #[test]
    fn test_unknown_webhook_event_is_rejected() {
        let json = r#"{
            "event_id": "evt-1",
            "event": "room_started",
            "session_id": 1,
            "user_id": 20,
            "occurred_at": "2026-01-15T09:30:00Z"
        }"#;
        assert!(serde_json::from_str::<WebhookRequest>(json).is_err());
    }

    #[test]
    fn test_transition_request_defaults() {
        let request: TransitionRequest = serde_json::from_str(r#"{"action": "cancel"}"#).unwrap();
        assert_eq!(request.action, TransitionAction::Cancel);
        assert!(request.reason.is_none());
        assert!(request.actor_id.is_none());
    }
}
