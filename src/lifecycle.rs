//! Session status state machine.
//!
//! ```text
//! Scheduled ──► Ready ──► Ongoing ──► Completed
//!     │           │  │        │  └────► Absent (individual, student absent)
//!     │           │  └────────┴──────► Absent (individual only)
//!     └───────────┴──► Cancelled
//! ```
//!
//! Every transition checks its source state and fails with
//! [`EngineError::InvalidTransition`] otherwise. Transitions persist the
//! session before returning.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AcademySettings, MeetingSettings};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::meetings::{end_meeting, ensure_meeting};
use crate::models::{
    AttendanceStatus, MeetingAttendance, ParticipantRole, Session, SessionReport, SessionStatus,
};
use crate::reconciliation::finalize_session_attendance;

/// A requested manual transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    /// Scheduled → Ready.
    Ready,
    /// Ready → Ongoing.
    Ongoing,
    /// Ready/Ongoing → Completed.
    Complete,
    /// Scheduled/Ready → Cancelled.
    Cancel,
    /// Ready/Ongoing → Absent.
    Absent,
}

/// A failure isolated to one session during batch processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionError {
    /// The session that failed.
    pub session_id: u64,
    /// The error message.
    pub error: String,
}

/// Counts produced by [`process_status_transitions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReport {
    /// Sessions moved to Ready.
    pub to_ready: u32,
    /// Sessions moved to Absent.
    pub to_absent: u32,
    /// Sessions moved to Completed.
    pub to_completed: u32,
    /// Per-session failures.
    pub errors: Vec<TransitionError>,
}

fn invalid(session: &Session, to: SessionStatus, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidTransition {
        session_id: session.id,
        from: session.status.to_string(),
        to: to.to_string(),
        reason: reason.into(),
    }
}

/// Moves a scheduled session to Ready and opens its meeting room.
///
/// A meeting failure is logged and does not undo the transition.
pub fn transition_to_ready(
    engine: &Engine,
    session: &mut Session,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    if session.status != SessionStatus::Scheduled {
        return Err(invalid(
            session,
            SessionStatus::Ready,
            "session is not scheduled",
        ));
    }

    session.status = SessionStatus::Ready;
    session.preparation_completed_at = Some(now);

    match engine.academy(session.academy_id) {
        Ok(academy) => {
            if let Err(e) = ensure_meeting(session, &academy, engine.meetings(), engine.config(), now)
            {
                tracing::warn!(session_id = session.id, error = %e, "Failed to create meeting for ready session");
            }
        }
        Err(e) => {
            tracing::warn!(session_id = session.id, error = %e, "Skipped meeting creation");
        }
    }

    engine.store().save_session(session.clone())?;
    tracing::info!(
        session_id = session.id,
        scheduled_at = %session.scheduled_at,
        "Session transitioned to READY"
    );
    Ok(())
}

/// Moves a ready session to Ongoing.
///
/// Refused before `start − early_join_minutes`, and for sessions starting
/// more than `max_future_hours` from now.
pub fn transition_to_ongoing(
    engine: &Engine,
    session: &mut Session,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    if session.status != SessionStatus::Ready {
        return Err(invalid(
            session,
            SessionStatus::Ongoing,
            "session is not ready",
        ));
    }

    let meeting = engine.config().meeting();
    let earliest = session.scheduled_at - Duration::minutes(meeting.early_join_minutes);
    if now < earliest {
        return Err(invalid(
            session,
            SessionStatus::Ongoing,
            format!("session time has not arrived (earliest {})", earliest),
        ));
    }
    if session.scheduled_at > now + Duration::hours(meeting.max_future_hours) {
        return Err(invalid(
            session,
            SessionStatus::Ongoing,
            "session is too far in the future",
        ));
    }

    session.status = SessionStatus::Ongoing;
    session.started_at = Some(now);
    engine.store().save_session(session.clone())?;

    tracing::info!(session_id = session.id, "Session transitioned to ONGOING");
    Ok(())
}

/// Completes a ready or ongoing session.
///
/// Finalizes attendance, closes the room and, for individual sessions,
/// turns the session Absent when the student was absent and charges the
/// subscription.
pub fn transition_to_completed(
    engine: &Engine,
    session: &mut Session,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    if !matches!(session.status, SessionStatus::Ready | SessionStatus::Ongoing) {
        return Err(invalid(
            session,
            SessionStatus::Completed,
            match session.status {
                SessionStatus::Completed => "session is already completed",
                SessionStatus::Cancelled => "session was cancelled",
                _ => "session is not ready or ongoing",
            },
        ));
    }

    session.status = SessionStatus::Completed;
    session.ended_at = Some(now);
    session.actual_duration_minutes = Some(
        session
            .started_at
            .map(|started| (now - started).num_minutes().max(0))
            .unwrap_or(0),
    );
    engine.store().save_session(session.clone())?;

    if let Err(e) = finalize_session_attendance(engine, session, now) {
        tracing::error!(session_id = session.id, error = %e, "Failed to finalize attendance");
    }

    if let Err(e) = end_meeting(session, engine.meetings(), now) {
        tracing::warn!(session_id = session.id, error = %e, "Failed to close meeting room");
    }

    if session.is_individual() {
        if student_was_absent(engine, session)? {
            session.status = SessionStatus::Absent;
            tracing::info!(
                session_id = session.id,
                student_id = ?session.student_id,
                "Individual session marked ABSENT on completion"
            );
        }
        count_subscription_usage(engine, session, now);
    }

    engine.store().save_session(session.clone())?;
    tracing::info!(
        session_id = session.id,
        status = %session.status,
        actual_duration = ?session.actual_duration_minutes,
        "Session transitioned to COMPLETED"
    );
    Ok(())
}

/// The student's report decides; without one, the attendance record does.
fn student_was_absent(engine: &Engine, session: &Session) -> EngineResult<bool> {
    let Some(student_id) = session.student_id else {
        return Ok(false);
    };

    if let Some(report) = engine.store().get_report(session.id, student_id)? {
        return Ok(report.attendance_status == Some(AttendanceStatus::Absent));
    }

    Ok(engine
        .store()
        .get_attendance(session.id, student_id)?
        .is_some_and(|a| {
            a.role == ParticipantRole::Student && a.status == Some(AttendanceStatus::Absent)
        }))
}

/// Cancels a scheduled or ready session.
///
/// A session already charged to its subscription is given back.
pub fn transition_to_cancelled(
    engine: &Engine,
    session: &mut Session,
    reason: Option<String>,
    cancelled_by: Option<u64>,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    if !matches!(
        session.status,
        SessionStatus::Scheduled | SessionStatus::Ready
    ) {
        return Err(invalid(
            session,
            SessionStatus::Cancelled,
            "only scheduled or ready sessions can be cancelled",
        ));
    }

    session.status = SessionStatus::Cancelled;
    session.cancelled_at = Some(now);
    session.cancellation_reason = reason;
    session.cancelled_by = cancelled_by;

    if let Err(e) = end_meeting(session, engine.meetings(), now) {
        tracing::warn!(session_id = session.id, error = %e, "Failed to close meeting room");
    }
    return_subscription_usage(engine, session);

    engine.store().save_session(session.clone())?;
    tracing::info!(
        session_id = session.id,
        reason = ?session.cancellation_reason,
        cancelled_by = ?session.cancelled_by,
        "Session transitioned to CANCELLED"
    );
    Ok(())
}

/// Marks an individual session Absent.
///
/// Records an absent attendance and report for the student and charges
/// the subscription.
pub fn transition_to_absent(
    engine: &Engine,
    session: &mut Session,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    if !session.is_individual() {
        return Err(invalid(
            session,
            SessionStatus::Absent,
            "not an individual session",
        ));
    }
    if !matches!(session.status, SessionStatus::Ready | SessionStatus::Ongoing) {
        return Err(invalid(
            session,
            SessionStatus::Absent,
            "session is not ready or ongoing",
        ));
    }

    session.status = SessionStatus::Absent;
    session.ended_at = Some(now);

    if let Some(student_id) = session.student_id {
        record_absent_student(engine, session, student_id, now)?;
    }
    if let Err(e) = end_meeting(session, engine.meetings(), now) {
        tracing::warn!(session_id = session.id, error = %e, "Failed to close meeting room");
    }
    count_subscription_usage(engine, session, now);

    engine.store().save_session(session.clone())?;
    tracing::info!(
        session_id = session.id,
        student_id = ?session.student_id,
        "Session transitioned to ABSENT"
    );
    Ok(())
}

fn record_absent_student(
    engine: &Engine,
    session: &Session,
    student_id: u64,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let mut attendance = engine
        .store()
        .get_attendance(session.id, student_id)?
        .unwrap_or_else(|| MeetingAttendance::new(session.id, student_id, ParticipantRole::Student));
    attendance.mark_absent(now, session.window().duration_minutes());
    engine.store().save_attendance(attendance)?;

    let mut report = engine
        .store()
        .get_report(session.id, student_id)?
        .unwrap_or_else(|| {
            SessionReport::new(
                session.id,
                student_id,
                session.teacher_id,
                session.academy_id,
                session.kind,
            )
        });
    report.attendance_status = Some(AttendanceStatus::Absent);
    report.actual_attendance_minutes = 0;
    report.is_calculated = true;
    report.evaluated_at = Some(now);
    engine.store().save_report(report)
}

/// Charges one session to the subscription, at most once per session.
///
/// Failures are logged; they never block a transition.
fn count_subscription_usage(engine: &Engine, session: &mut Session, now: DateTime<Utc>) {
    if session.subscription_counted {
        return;
    }
    let Some(subscription_id) = session.subscription_id else {
        return;
    };

    let result = engine
        .store()
        .get_subscription(subscription_id)
        .and_then(|found| found.ok_or(EngineError::SubscriptionNotFound { subscription_id }))
        .and_then(|mut subscription| {
            subscription.use_session(now)?;
            let remaining = subscription.sessions_remaining;
            engine.store().save_subscription(subscription)?;
            Ok(remaining)
        });

    match result {
        Ok(remaining) => {
            session.subscription_counted = true;
            tracing::info!(
                session_id = session.id,
                subscription_id,
                remaining,
                "Subscription usage counted"
            );
        }
        Err(e) => {
            tracing::warn!(
                session_id = session.id,
                subscription_id,
                error = %e,
                "Failed to count subscription usage"
            );
        }
    }
}

fn return_subscription_usage(engine: &Engine, session: &mut Session) {
    if !session.subscription_counted {
        return;
    }
    let Some(subscription_id) = session.subscription_id else {
        return;
    };

    let result = engine
        .store()
        .get_subscription(subscription_id)
        .and_then(|found| found.ok_or(EngineError::SubscriptionNotFound { subscription_id }))
        .and_then(|mut subscription| {
            subscription.return_session();
            engine.store().save_subscription(subscription)
        });

    match result {
        Ok(()) => session.subscription_counted = false,
        Err(e) => tracing::warn!(
            session_id = session.id,
            subscription_id,
            error = %e,
            "Failed to return subscription usage"
        ),
    }
}

/// Returns true if a scheduled session has reached its preparation window.
///
/// Sessions more than `ready_lookahead_hours` ahead or `ready_lookback_hours`
/// behind are left alone.
pub fn should_transition_to_ready(
    session: &Session,
    settings: &AcademySettings,
    meeting: &MeetingSettings,
    now: DateTime<Utc>,
) -> bool {
    if session.status != SessionStatus::Scheduled {
        return false;
    }
    if session.scheduled_at > now + Duration::hours(meeting.ready_lookahead_hours) {
        return false;
    }
    if session.scheduled_at < now - Duration::hours(meeting.ready_lookback_hours) {
        return false;
    }

    now >= session.scheduled_at - Duration::minutes(settings.preparation_minutes)
}

/// Returns true if a ready individual session passed its grace deadline
/// with nobody present.
pub fn should_transition_to_absent(
    session: &Session,
    attendances: &[MeetingAttendance],
    settings: &AcademySettings,
    now: DateTime<Utc>,
) -> bool {
    if !session.is_individual() || session.status != SessionStatus::Ready {
        return false;
    }

    let deadline = session.scheduled_at + Duration::minutes(settings.late_tolerance_minutes);
    let has_participants = attendances
        .iter()
        .any(|a| a.session_id == session.id && a.total_duration_minutes > 0);

    now > deadline && !has_participants
}

/// Returns true once a ready or ongoing session is past its end plus buffer.
pub fn should_auto_complete(
    session: &Session,
    settings: &AcademySettings,
    now: DateTime<Utc>,
) -> bool {
    if !matches!(session.status, SessionStatus::Ready | SessionStatus::Ongoing) {
        return false;
    }

    now >= session.scheduled_end() + Duration::minutes(settings.buffer_minutes)
}

/// Runs the ready, absent and auto-complete checks over a batch.
///
/// Each session is checked in that order against its updated state, so one
/// run can move a session through several states. Failures are recorded per
/// session. A dry run only counts what would happen.
pub fn process_status_transitions(
    engine: &Engine,
    sessions: Vec<Session>,
    now: DateTime<Utc>,
    dry_run: bool,
) -> TransitionReport {
    let mut report = TransitionReport::default();
    let meeting = engine.config().meeting().clone();

    for mut session in sessions {
        let settings = engine.config().academy_settings(session.academy_id);
        let result = (|| -> EngineResult<()> {
            if should_transition_to_ready(&session, &settings, &meeting, now) {
                if !dry_run {
                    transition_to_ready(engine, &mut session, now)?;
                }
                report.to_ready += 1;
            }

            let attendances = engine.store().list_attendances(session.id)?;
            if should_transition_to_absent(&session, &attendances, &settings, now) {
                if !dry_run {
                    transition_to_absent(engine, &mut session, now)?;
                }
                report.to_absent += 1;
            }

            if should_auto_complete(&session, &settings, now) {
                if !dry_run {
                    transition_to_completed(engine, &mut session, now)?;
                }
                report.to_completed += 1;
            }

            Ok(())
        })();

        if let Err(e) = result {
            tracing::error!(
                session_id = session.id,
                error = %e,
                "Error processing session status transition"
            );
            report.errors.push(TransitionError {
                session_id: session.id,
                error: e.to_string(),
            });
        }
    }

    report
}

/// Applies a manual transition to a stored session and returns it.
pub fn apply_transition(
    engine: &Engine,
    session_id: u64,
    action: TransitionAction,
    reason: Option<String>,
    actor_id: Option<u64>,
    now: DateTime<Utc>,
) -> EngineResult<Session> {
    let mut session = engine.session(session_id)?;

    match action {
        TransitionAction::Ready => transition_to_ready(engine, &mut session, now)?,
        TransitionAction::Ongoing => transition_to_ongoing(engine, &mut session, now)?,
        TransitionAction::Complete => transition_to_completed(engine, &mut session, now)?,
        TransitionAction::Cancel => {
            transition_to_cancelled(engine, &mut session, reason, actor_id, now)?
        }
        TransitionAction::Absent => transition_to_absent(engine, &mut session, now)?,
    }

    Ok(session)
}
