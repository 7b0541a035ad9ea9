//! Core data models for the session engine.
//!
//! This module contains all the domain models used throughout the engine.

mod academy;
mod attendance;
mod audit;
mod earning;
mod event;
mod meeting;
mod report;
mod retry;
mod session;
mod subscription;
mod teacher;

pub use academy::Academy;
pub use attendance::{
    AUTO_CLOSE_SESSION_ENDED, AttendanceCycle, AttendanceStatus, EventKind, MeetingAttendance,
    ParticipantRole,
};
pub use audit::AuditStep;
pub use earning::{CalculationMethod, EarningsSummary, MethodTotals, TeacherEarning};
pub use event::{AttendanceEvent, EventStatus};
pub use meeting::MeetingInfo;
pub use report::SessionReport;
pub use retry::{AttendanceOperation, RetryOperation};
pub use session::{
    DEFAULT_SESSION_DURATION_MINUTES, Session, SessionKind, SessionStatus, SessionType,
    SessionWindow,
};
pub use subscription::{PauseReason, Subscription, SubscriptionStatus};
pub use teacher::{TeacherProfile, TeacherRates};
