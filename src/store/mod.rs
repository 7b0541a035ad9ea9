//! Persistence seam for the session engine.
//!
//! Everything the engine reads or writes goes through the [`Store`] trait.
//! The crate ships [`MemoryStore`]; a database-backed store implements
//! the same trait.

mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::error::EngineResult;
use crate::models::{
    Academy, AttendanceEvent, EventStatus, MeetingAttendance, RetryOperation, Session,
    SessionReport, Subscription, TeacherEarning, TeacherProfile,
};

/// Storage for every engine entity.
///
/// Sessions are listed per academy so that jobs never mix tenants.
/// Every `save_*` method inserts or replaces by key.
pub trait Store: Send + Sync {
    /// Inserts or replaces an academy.
    fn save_academy(&self, academy: Academy) -> EngineResult<()>;
    /// Looks up an academy.
    fn get_academy(&self, academy_id: u64) -> EngineResult<Option<Academy>>;
    /// Lists every academy ordered by id.
    fn list_academies(&self) -> EngineResult<Vec<Academy>>;

    /// Inserts or replaces a session.
    fn save_session(&self, session: Session) -> EngineResult<()>;
    /// Looks up a session.
    fn get_session(&self, session_id: u64) -> EngineResult<Option<Session>>;
    /// Lists the sessions of one academy ordered by scheduled start.
    fn list_sessions(&self, academy_id: u64) -> EngineResult<Vec<Session>>;

    /// Inserts or replaces an attendance record.
    fn save_attendance(&self, attendance: MeetingAttendance) -> EngineResult<()>;
    /// Looks up the attendance of a user in a session.
    fn get_attendance(&self, session_id: u64, user_id: u64)
    -> EngineResult<Option<MeetingAttendance>>;
    /// Lists the attendance records of a session ordered by user id.
    fn list_attendances(&self, session_id: u64) -> EngineResult<Vec<MeetingAttendance>>;

    /// Stores an event unless one with the same id exists.
    ///
    /// Returns false for a duplicate.
    fn insert_event(&self, event: AttendanceEvent) -> EngineResult<bool>;
    /// Replaces a stored event.
    fn save_event(&self, event: AttendanceEvent) -> EngineResult<()>;
    /// Looks up an event.
    fn get_event(&self, event_id: &str) -> EngineResult<Option<AttendanceEvent>>;
    /// Lists events in a status ordered by occurrence.
    fn list_events_by_status(&self, status: EventStatus) -> EngineResult<Vec<AttendanceEvent>>;
    /// Lists the events of one user in one session ordered by occurrence.
    fn list_user_events(&self, session_id: u64, user_id: u64)
    -> EngineResult<Vec<AttendanceEvent>>;
    /// Removes settled events received before `received_before`.
    ///
    /// Pending and Orphaned events are kept. Returns the number removed.
    fn prune_settled_events(&self, received_before: DateTime<Utc>) -> EngineResult<usize>;

    /// Inserts or replaces a report.
    fn save_report(&self, report: SessionReport) -> EngineResult<()>;
    /// Looks up the report of a student in a session.
    fn get_report(&self, session_id: u64, student_id: u64) -> EngineResult<Option<SessionReport>>;

    /// Inserts or replaces a subscription.
    fn save_subscription(&self, subscription: Subscription) -> EngineResult<()>;
    /// Looks up a subscription.
    fn get_subscription(&self, subscription_id: u64) -> EngineResult<Option<Subscription>>;

    /// Inserts or replaces a teacher profile.
    fn save_teacher(&self, teacher: TeacherProfile) -> EngineResult<()>;
    /// Looks up a teacher profile.
    fn get_teacher(&self, teacher_id: u64) -> EngineResult<Option<TeacherProfile>>;

    /// Inserts or replaces an earning.
    fn save_earning(&self, earning: TeacherEarning) -> EngineResult<()>;
    /// Looks up the earning recorded for a session.
    fn get_session_earning(&self, session_id: u64) -> EngineResult<Option<TeacherEarning>>;
    /// Lists a teacher's earnings ordered by calculation time.
    fn list_teacher_earnings(&self, teacher_id: u64) -> EngineResult<Vec<TeacherEarning>>;

    /// Inserts or replaces a retry operation.
    fn save_retry(&self, operation: RetryOperation) -> EngineResult<()>;
    /// Removes a retry operation that succeeded.
    fn remove_retry(&self, operation_id: uuid::Uuid) -> EngineResult<()>;
    /// Lists every retry operation ordered by next attempt.
    fn list_retries(&self) -> EngineResult<Vec<RetryOperation>>;
}
