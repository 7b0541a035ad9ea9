//! Stored webhook events.
//!
//! Every participant joined/left webhook is logged as an
//! [`AttendanceEvent`] before it touches an attendance record. The log
//! makes ingestion idempotent and lets the background jobs replay events
//! that could not be applied on arrival.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{EventKind, ParticipantRole};

/// Processing state of a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Waiting to be applied (delayed leave).
    Pending,
    /// Applied to an attendance record.
    Applied,
    /// Could not be matched to a session or an open cycle yet.
    Orphaned,
    /// A later join made the leave irrelevant.
    Superseded,
    /// Given up on.
    Discarded,
}

impl EventStatus {
    /// Returns the lowercase identifier of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Applied => "applied",
            EventStatus::Orphaned => "orphaned",
            EventStatus::Superseded => "superseded",
            EventStatus::Discarded => "discarded",
        }
    }

    /// Returns true once the event needs no more processing.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            EventStatus::Applied | EventStatus::Superseded | EventStatus::Discarded
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant joined/left event received from the meeting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Provider event id, used for deduplication.
    pub id: String,
    /// Target session.
    pub session_id: u64,
    /// Participant.
    pub user_id: u64,
    /// Participant role.
    pub role: ParticipantRole,
    /// Join or leave.
    pub kind: EventKind,
    /// When the platform saw it happen.
    pub occurred_at: DateTime<Utc>,
    /// When the engine received it.
    pub received_at: DateTime<Utc>,
    /// Processing state.
    pub status: EventStatus,
    /// Earliest time a pending event may be applied.
    #[serde(default)]
    pub process_after: Option<DateTime<Utc>>,
    /// Application attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Last processing note.
    #[serde(default)]
    pub note: Option<String>,
}

impl AttendanceEvent {
    /// Creates a pending event received at `received_at`.
    pub fn new(
        id: impl Into<String>,
        session_id: u64,
        user_id: u64,
        role: ParticipantRole,
        kind: EventKind,
        occurred_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id,
            user_id,
            role,
            kind,
            occurred_at,
            received_at,
            status: EventStatus::Pending,
            process_after: None,
            attempts: 0,
            note: None,
        }
    }

    /// Returns true if the event is pending and its delay has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Pending && self.process_after.is_none_or(|at| at <= now)
    }

    /// Moves the event to `status` with a note.
    pub fn settle(&mut self, status: EventStatus, note: impl Into<String>) {
        self.status = status;
        self.note = Some(note.into());
    }
}
