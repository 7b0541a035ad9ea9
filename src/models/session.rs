//! Session model and related types.
//!
//! A session is a single scheduled meeting of a circle, a private
//! subscription or an interactive course.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::MeetingInfo;

/// Duration assumed for sessions that were scheduled without one.
pub const DEFAULT_SESSION_DURATION_MINUTES: i64 = 60;

/// The program a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Quran circle or private Quran lesson.
    Quran,
    /// Academic private lesson.
    Academic,
    /// Session of an interactive course.
    Interactive,
}

impl SessionKind {
    /// Returns the lowercase identifier used in room names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Quran => "quran",
            SessionKind::Academic => "academic",
            SessionKind::Interactive => "interactive",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a session has one student or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// One teacher, one student.
    Individual,
    /// A circle or course with several enrolled students.
    Group,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Scheduled, preparation window not reached.
    Scheduled,
    /// Preparation window reached, meeting room available.
    Ready,
    /// At least one participant joined.
    Ongoing,
    /// Finished.
    Completed,
    /// Cancelled by a teacher or admin.
    Cancelled,
    /// Individual session the student never attended.
    Absent,
}

impl SessionStatus {
    /// Returns the lowercase identifier of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ready => "ready",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Absent => "absent",
        }
    }

    /// Returns true for states no transition leaves.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Absent
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scheduled bounds of a session.
///
/// Attendance is only counted inside `[start, end]`: time spent in the
/// room during preparation or after the end does not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    /// Scheduled start.
    pub start: DateTime<Utc>,
    /// Scheduled end.
    pub end: DateTime<Utc>,
}

impl SessionWindow {
    /// Creates a window from a start and a duration in minutes.
    pub fn from_duration(start: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(duration_minutes),
        }
    }

    /// Returns the scheduled duration in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

/// A scheduled meeting instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier.
    pub id: u64,
    /// Owning academy (tenant).
    pub academy_id: u64,
    /// Program the session belongs to.
    pub kind: SessionKind,
    /// Individual or group.
    pub session_type: SessionType,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Teaching user.
    pub teacher_id: u64,
    /// The student of an individual session.
    #[serde(default)]
    pub student_id: Option<u64>,
    /// The circle of a group session.
    #[serde(default)]
    pub circle_id: Option<u64>,
    /// Subscription charged for an individual session.
    #[serde(default)]
    pub subscription_id: Option<u64>,
    /// Students enrolled in a group session.
    #[serde(default)]
    pub enrolled_student_ids: Vec<u64>,
    /// Scheduled start.
    pub scheduled_at: DateTime<Utc>,
    /// Scheduled duration.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    /// Explicit scheduled end, overriding the duration.
    #[serde(default)]
    pub scheduled_end_at: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the session went ongoing.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the session completed or was marked absent.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Minutes between start and end of the live meeting.
    #[serde(default)]
    pub actual_duration_minutes: Option<i64>,
    /// When the session became ready.
    #[serde(default)]
    pub preparation_completed_at: Option<DateTime<Utc>>,
    /// When the session was cancelled.
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the session was cancelled.
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    /// Who cancelled the session.
    #[serde(default)]
    pub cancelled_by: Option<u64>,
    /// The meeting room, once created.
    #[serde(default)]
    pub meeting: Option<MeetingInfo>,
    /// Whether the session was already charged to its subscription.
    #[serde(default)]
    pub subscription_counted: bool,
}

impl Session {
    /// Creates a scheduled session with no participants or meeting yet.
    pub fn new(
        id: u64,
        academy_id: u64,
        kind: SessionKind,
        session_type: SessionType,
        teacher_id: u64,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Self {
        Self {
            id,
            academy_id,
            kind,
            session_type,
            title: None,
            teacher_id,
            student_id: None,
            circle_id: None,
            subscription_id: None,
            enrolled_student_ids: Vec::new(),
            scheduled_at,
            duration_minutes: Some(duration_minutes),
            scheduled_end_at: None,
            status: SessionStatus::Scheduled,
            started_at: None,
            ended_at: None,
            actual_duration_minutes: None,
            preparation_completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_by: None,
            meeting: None,
            subscription_counted: false,
        }
    }

    /// Returns the scheduled duration, defaulting to an hour.
    pub fn effective_duration_minutes(&self) -> i64 {
        self.duration_minutes
            .unwrap_or(DEFAULT_SESSION_DURATION_MINUTES)
    }

    /// Returns the scheduled end.
    ///
    /// An explicit `scheduled_end_at` wins over `scheduled_at + duration`.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_end_at.unwrap_or_else(|| {
            self.scheduled_at + Duration::minutes(self.effective_duration_minutes())
        })
    }

    /// Returns the scheduled bounds used for attendance clipping.
    pub fn window(&self) -> SessionWindow {
        SessionWindow {
            start: self.scheduled_at,
            end: self.scheduled_end(),
        }
    }

    /// Returns true for one-to-one sessions.
    pub fn is_individual(&self) -> bool {
        self.session_type == SessionType::Individual
    }

    /// Returns the students expected in the session.
    pub fn expected_student_ids(&self) -> Vec<u64> {
        match self.session_type {
            SessionType::Individual => self.student_id.into_iter().collect(),
            SessionType::Group => self.enrolled_student_ids.clone(),
        }
    }

    /// Returns true if the user teaches or attends the session.
    pub fn is_participant(&self, user_id: u64) -> bool {
        self.teacher_id == user_id || self.expected_student_ids().contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample_session() -> Session {
        Session::new(
            1,
            1,
            SessionKind::Quran,
            SessionType::Individual,
            10,
            make_datetime("2026-01-15T09:00:00Z"),
            45,
        )
    }

    #[test]
    fn test_scheduled_end_uses_duration() {
        let session = sample_session();
        assert_eq!(session.scheduled_end(), make_datetime("2026-01-15T09:45:00Z"));
        assert_eq!(session.window().duration_minutes(), 45);
    }

    #[test]
    fn test_scheduled_end_defaults_to_one_hour() {
        let mut session = sample_session();
        session.duration_minutes = None;
        assert_eq!(session.scheduled_end(), make_datetime("2026-01-15T10:00:00Z"));
    }

    #[test]
    fn test_explicit_end_wins_over_duration() {
        let mut session = sample_session();
        session.scheduled_end_at = Some(make_datetime("2026-01-15T09:30:00Z"));
        assert_eq!(session.window().duration_minutes(), 30);
    }

    #[test]
    fn test_expected_students_by_type() {
        let mut individual = sample_session();
        individual.student_id = Some(20);
        assert_eq!(individual.expected_student_ids(), vec![20]);
        assert!(individual.is_participant(10));
        assert!(individual.is_participant(20));
        assert!(!individual.is_participant(21));

        let mut group = sample_session();
        group.session_type = SessionType::Group;
        group.enrolled_student_ids = vec![20, 21, 22];
        assert_eq!(group.expected_student_ids().len(), 3);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Ongoing).unwrap();
        assert_eq!(json, "\"ongoing\"");
        assert!(SessionStatus::Absent.is_final());
        assert!(!SessionStatus::Ready.is_final());
    }
}
