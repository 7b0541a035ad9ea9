//! In-memory [`Store`] implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Academy, AttendanceEvent, EventStatus, MeetingAttendance, RetryOperation, Session,
    SessionReport, Subscription, TeacherEarning, TeacherProfile,
};

use super::Store;

/// A [`Store`] keeping every entity in `RwLock`-guarded maps.
///
/// Share it behind an `Arc`. A poisoned lock surfaces as
/// [`EngineError::Storage`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    academies: RwLock<BTreeMap<u64, Academy>>,
    sessions: RwLock<BTreeMap<u64, Session>>,
    attendances: RwLock<BTreeMap<(u64, u64), MeetingAttendance>>,
    events: RwLock<HashMap<String, AttendanceEvent>>,
    reports: RwLock<BTreeMap<(u64, u64), SessionReport>>,
    subscriptions: RwLock<HashMap<u64, Subscription>>,
    teachers: RwLock<HashMap<u64, TeacherProfile>>,
    earnings: RwLock<HashMap<Uuid, TeacherEarning>>,
    retries: RwLock<HashMap<Uuid, RetryOperation>>,
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &str) -> EngineResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| EngineError::Storage {
        message: format!("{} lock poisoned", name),
    })
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &str) -> EngineResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| EngineError::Storage {
        message: format!("{} lock poisoned", name),
    })
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn save_academy(&self, academy: Academy) -> EngineResult<()> {
        write(&self.academies, "academies")?.insert(academy.id, academy);
        Ok(())
    }

    fn get_academy(&self, academy_id: u64) -> EngineResult<Option<Academy>> {
        Ok(read(&self.academies, "academies")?.get(&academy_id).cloned())
    }

    fn list_academies(&self) -> EngineResult<Vec<Academy>> {
        Ok(read(&self.academies, "academies")?.values().cloned().collect())
    }

    fn save_session(&self, session: Session) -> EngineResult<()> {
        write(&self.sessions, "sessions")?.insert(session.id, session);
        Ok(())
    }

    fn get_session(&self, session_id: u64) -> EngineResult<Option<Session>> {
        Ok(read(&self.sessions, "sessions")?.get(&session_id).cloned())
    }

    fn list_sessions(&self, academy_id: u64) -> EngineResult<Vec<Session>> {
        let mut sessions: Vec<Session> = read(&self.sessions, "sessions")?
            .values()
            .filter(|s| s.academy_id == academy_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.scheduled_at, s.id));
        Ok(sessions)
    }

    fn save_attendance(&self, attendance: MeetingAttendance) -> EngineResult<()> {
        write(&self.attendances, "attendances")?
            .insert((attendance.session_id, attendance.user_id), attendance);
        Ok(())
    }

    fn get_attendance(
        &self,
        session_id: u64,
        user_id: u64,
    ) -> EngineResult<Option<MeetingAttendance>> {
        Ok(read(&self.attendances, "attendances")?
            .get(&(session_id, user_id))
            .cloned())
    }

    fn list_attendances(&self, session_id: u64) -> EngineResult<Vec<MeetingAttendance>> {
        Ok(read(&self.attendances, "attendances")?
            .range((session_id, u64::MIN)..=(session_id, u64::MAX))
            .map(|(_, a)| a.clone())
            .collect())
    }

    fn insert_event(&self, event: AttendanceEvent) -> EngineResult<bool> {
        let mut events = write(&self.events, "events")?;
        if events.contains_key(&event.id) {
            return Ok(false);
        }
        events.insert(event.id.clone(), event);
        Ok(true)
    }

    fn save_event(&self, event: AttendanceEvent) -> EngineResult<()> {
        write(&self.events, "events")?.insert(event.id.clone(), event);
        Ok(())
    }

    fn get_event(&self, event_id: &str) -> EngineResult<Option<AttendanceEvent>> {
        Ok(read(&self.events, "events")?.get(event_id).cloned())
    }

    fn list_events_by_status(&self, status: EventStatus) -> EngineResult<Vec<AttendanceEvent>> {
        let mut events: Vec<AttendanceEvent> = read(&self.events, "events")?
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.occurred_at, &a.id).cmp(&(b.occurred_at, &b.id)));
        Ok(events)
    }

    fn list_user_events(
        &self,
        session_id: u64,
        user_id: u64,
    ) -> EngineResult<Vec<AttendanceEvent>> {
        let mut events: Vec<AttendanceEvent> = read(&self.events, "events")?
            .values()
            .filter(|e| e.session_id == session_id && e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.occurred_at, &a.id).cmp(&(b.occurred_at, &b.id)));
        Ok(events)
    }

    fn prune_settled_events(&self, received_before: DateTime<Utc>) -> EngineResult<usize> {
        let mut events = write(&self.events, "events")?;
        let before = events.len();
        events.retain(|_, e| !(e.status.is_settled() && e.received_at < received_before));
        Ok(before - events.len())
    }

    fn save_report(&self, report: SessionReport) -> EngineResult<()> {
        write(&self.reports, "reports")?.insert((report.session_id, report.student_id), report);
        Ok(())
    }

    fn get_report(&self, session_id: u64, student_id: u64) -> EngineResult<Option<SessionReport>> {
        Ok(read(&self.reports, "reports")?
            .get(&(session_id, student_id))
            .cloned())
    }

    fn save_subscription(&self, subscription: Subscription) -> EngineResult<()> {
        write(&self.subscriptions, "subscriptions")?.insert(subscription.id, subscription);
        Ok(())
    }

    fn get_subscription(&self, subscription_id: u64) -> EngineResult<Option<Subscription>> {
        Ok(read(&self.subscriptions, "subscriptions")?
            .get(&subscription_id)
            .cloned())
    }

    fn save_teacher(&self, teacher: TeacherProfile) -> EngineResult<()> {
        write(&self.teachers, "teachers")?.insert(teacher.id, teacher);
        Ok(())
    }

    fn get_teacher(&self, teacher_id: u64) -> EngineResult<Option<TeacherProfile>> {
        Ok(read(&self.teachers, "teachers")?.get(&teacher_id).cloned())
    }

    fn save_earning(&self, earning: TeacherEarning) -> EngineResult<()> {
        write(&self.earnings, "earnings")?.insert(earning.id, earning);
        Ok(())
    }

    fn get_session_earning(&self, session_id: u64) -> EngineResult<Option<TeacherEarning>> {
        Ok(read(&self.earnings, "earnings")?
            .values()
            .find(|e| e.session_id == session_id)
            .cloned())
    }

    fn list_teacher_earnings(&self, teacher_id: u64) -> EngineResult<Vec<TeacherEarning>> {
        let mut earnings: Vec<TeacherEarning> = read(&self.earnings, "earnings")?
            .values()
            .filter(|e| e.teacher_id == teacher_id)
            .cloned()
            .collect();
        earnings.sort_by_key(|e| (e.calculated_at, e.session_id));
        Ok(earnings)
    }

    fn save_retry(&self, operation: RetryOperation) -> EngineResult<()> {
        write(&self.retries, "retries")?.insert(operation.id, operation);
        Ok(())
    }

    fn remove_retry(&self, operation_id: Uuid) -> EngineResult<()> {
        write(&self.retries, "retries")?.remove(&operation_id);
        Ok(())
    }

    fn list_retries(&self) -> EngineResult<Vec<RetryOperation>> {
        let mut retries: Vec<RetryOperation> =
            read(&self.retries, "retries")?.values().cloned().collect();
        retries.sort_by_key(|r| (r.next_attempt_at, r.created_at));
        Ok(retries)
    }
}
