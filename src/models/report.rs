//! Per-student session reports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AttendanceStatus, SessionKind};

/// The teacher-facing report for one student in one session.
///
/// The attendance section is filled automatically once attendance is
/// calculated. Teachers fill in evaluation data separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// The session reported on.
    pub session_id: u64,
    /// The student reported on.
    pub student_id: u64,
    /// The session's teacher.
    pub teacher_id: u64,
    /// The owning academy.
    pub academy_id: u64,
    /// Program of the session.
    pub kind: SessionKind,
    /// First time the student entered the meeting.
    #[serde(default)]
    pub meeting_enter_time: Option<DateTime<Utc>>,
    /// Last time the student left the meeting.
    #[serde(default)]
    pub meeting_leave_time: Option<DateTime<Utc>>,
    /// Clipped minutes in the meeting.
    #[serde(default)]
    pub actual_attendance_minutes: i64,
    /// Classified attendance.
    #[serde(default)]
    pub attendance_status: Option<AttendanceStatus>,
    /// Share of the session attended.
    #[serde(default)]
    pub attendance_percentage: Decimal,
    /// Whether the student joined after the grace deadline.
    #[serde(default)]
    pub is_late: bool,
    /// Minutes between the start and the first join.
    #[serde(default)]
    pub late_minutes: i64,
    /// Whether the attendance section was filled by the engine.
    #[serde(default)]
    pub is_calculated: bool,
    /// When the attendance section was filled.
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Teacher notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl SessionReport {
    /// Creates an empty report.
    pub fn new(
        session_id: u64,
        student_id: u64,
        teacher_id: u64,
        academy_id: u64,
        kind: SessionKind,
    ) -> Self {
        Self {
            session_id,
            student_id,
            teacher_id,
            academy_id,
            kind,
            meeting_enter_time: None,
            meeting_leave_time: None,
            actual_attendance_minutes: 0,
            attendance_status: None,
            attendance_percentage: Decimal::ZERO,
            is_late: false,
            late_minutes: 0,
            is_calculated: false,
            evaluated_at: None,
            notes: None,
        }
    }
}
