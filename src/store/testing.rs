//! A [`Store`] that fails selected operations on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ConfigLoader;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::meetings::LocalMeetingProvider;
use crate::models::{
    Academy, AttendanceEvent, EventStatus, MeetingAttendance, RetryOperation, Session,
    SessionReport, Subscription, TeacherEarning, TeacherProfile,
};

use super::{MemoryStore, Store};

/// Wraps a [`MemoryStore`]; each flag makes one kind of call return
/// [`EngineError::Storage`] while it is set.
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    pub fail_attendance_writes: AtomicBool,
    pub fail_user_event_reads: AtomicBool,
    pub fail_event_writes: AtomicBool,
}

fn check(flag: &AtomicBool, what: &str) -> EngineResult<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(EngineError::Storage {
            message: format!("{} unavailable", what),
        });
    }
    Ok(())
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

/// Builds an engine on the default config backed by `store`.
pub(crate) fn engine_with(store: Arc<FailingStore>) -> Engine {
    let config = ConfigLoader::load("./config/default").expect("default config loads");
    let meetings = LocalMeetingProvider::from_config(&config);
    Engine::new(Arc::new(config), store, Arc::new(meetings))
}

impl Store for FailingStore {
    fn save_academy(&self, academy: Academy) -> EngineResult<()> {
        self.inner.save_academy(academy)
    }

    fn get_academy(&self, academy_id: u64) -> EngineResult<Option<Academy>> {
        self.inner.get_academy(academy_id)
    }

    fn list_academies(&self) -> EngineResult<Vec<Academy>> {
        self.inner.list_academies()
    }

    fn save_session(&self, session: Session) -> EngineResult<()> {
        self.inner.save_session(session)
    }

    fn get_session(&self, session_id: u64) -> EngineResult<Option<Session>> {
        self.inner.get_session(session_id)
    }

    fn list_sessions(&self, academy_id: u64) -> EngineResult<Vec<Session>> {
        self.inner.list_sessions(academy_id)
    }

    fn save_attendance(&self, attendance: MeetingAttendance) -> EngineResult<()> {
        check(&self.fail_attendance_writes, "attendance store")?;
        self.inner.save_attendance(attendance)
    }

    fn get_attendance(
        &self,
        session_id: u64,
        user_id: u64,
    ) -> EngineResult<Option<MeetingAttendance>> {
        self.inner.get_attendance(session_id, user_id)
    }

    fn list_attendances(&self, session_id: u64) -> EngineResult<Vec<MeetingAttendance>> {
        self.inner.list_attendances(session_id)
    }

    fn insert_event(&self, event: AttendanceEvent) -> EngineResult<bool> {
        self.inner.insert_event(event)
    }

    fn save_event(&self, event: AttendanceEvent) -> EngineResult<()> {
        check(&self.fail_event_writes, "event store")?;
        self.inner.save_event(event)
    }

    fn get_event(&self, event_id: &str) -> EngineResult<Option<AttendanceEvent>> {
        self.inner.get_event(event_id)
    }

    fn list_events_by_status(&self, status: EventStatus) -> EngineResult<Vec<AttendanceEvent>> {
        self.inner.list_events_by_status(status)
    }

    fn list_user_events(
        &self,
        session_id: u64,
        user_id: u64,
    ) -> EngineResult<Vec<AttendanceEvent>> {
        check(&self.fail_user_event_reads, "event store")?;
        self.inner.list_user_events(session_id, user_id)
    }

    fn prune_settled_events(&self, received_before: DateTime<Utc>) -> EngineResult<usize> {
        self.inner.prune_settled_events(received_before)
    }

    fn save_report(&self, report: SessionReport) -> EngineResult<()> {
        self.inner.save_report(report)
    }

    fn get_report(&self, session_id: u64, student_id: u64) -> EngineResult<Option<SessionReport>> {
        self.inner.get_report(session_id, student_id)
    }

    fn save_subscription(&self, subscription: Subscription) -> EngineResult<()> {
        self.inner.save_subscription(subscription)
    }

    fn get_subscription(&self, subscription_id: u64) -> EngineResult<Option<Subscription>> {
        self.inner.get_subscription(subscription_id)
    }

    fn save_teacher(&self, teacher: TeacherProfile) -> EngineResult<()> {
        self.inner.save_teacher(teacher)
    }

    fn get_teacher(&self, teacher_id: u64) -> EngineResult<Option<TeacherProfile>> {
        self.inner.get_teacher(teacher_id)
    }

    fn save_earning(&self, earning: TeacherEarning) -> EngineResult<()> {
        self.inner.save_earning(earning)
    }

    fn get_session_earning(&self, session_id: u64) -> EngineResult<Option<TeacherEarning>> {
        self.inner.get_session_earning(session_id)
    }

    fn list_teacher_earnings(&self, teacher_id: u64) -> EngineResult<Vec<TeacherEarning>> {
        self.inner.list_teacher_earnings(teacher_id)
    }

    fn save_retry(&self, operation: RetryOperation) -> EngineResult<()> {
        self.inner.save_retry(operation)
    }

    fn remove_retry(&self, operation_id: Uuid) -> EngineResult<()> {
        self.inner.remove_retry(operation_id)
    }

    fn list_retries(&self) -> EngineResult<Vec<RetryOperation>> {
        self.inner.list_retries()
    }
}
