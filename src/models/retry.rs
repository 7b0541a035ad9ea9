//! Retry queue entries for failed attendance operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An attendance operation that can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AttendanceOperation {
    /// Recalculate one attendance record.
    Calculate {
        /// The session.
        session_id: u64,
        /// The attending user.
        user_id: u64,
    },
    /// Re-apply a stored leave event.
    ApplyLeave {
        /// The stored event id.
        event_id: String,
    },
}

impl AttendanceOperation {
    /// Returns a short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceOperation::Calculate { .. } => "calculate",
            AttendanceOperation::ApplyLeave { .. } => "apply_leave",
        }
    }
}

/// A queued retry of a failed [`AttendanceOperation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOperation {
    /// Unique identifier.
    pub id: Uuid,
    /// What to replay.
    pub operation: AttendanceOperation,
    /// Failed attempts so far.
    pub attempts: u32,
    /// Earliest time of the next attempt.
    pub next_attempt_at: DateTime<Utc>,
    /// Error from the most recent failure.
    pub last_error: String,
    /// When the operation first failed.
    pub created_at: DateTime<Utc>,
    /// Set once the operation exhausted its attempts.
    #[serde(default)]
    pub dead: bool,
}

impl RetryOperation {
    /// Queues an operation that just failed for the first time.
    pub fn new(
        operation: AttendanceOperation,
        error: impl Into<String>,
        now: DateTime<Utc>,
        next_attempt_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            attempts: 1,
            next_attempt_at,
            last_error: error.into(),
            created_at: now,
            dead: false,
        }
    }

    /// Returns true if the operation should run at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.dead && self.next_attempt_at <= now
    }
}
