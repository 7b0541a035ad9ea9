//! Webhook ingestion.
//!
//! Participant joined/left webhooks are logged as [`AttendanceEvent`]s and
//! then applied to the matching [`MeetingAttendance`]. Leaves are held back
//! for `leave_delay_seconds` so a quick reconnect does not split a cycle;
//! the delayed-leave job applies them later.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::transition_to_ongoing;
use crate::models::{
    AttendanceEvent, EventKind, EventStatus, MeetingAttendance, Session, SessionStatus,
};

/// What happened to an ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The event id was already logged.
    Duplicate,
    /// Applied to an attendance record.
    Applied,
    /// A leave held back until its delay passes.
    Deferred,
    /// Could not be matched yet; the reconciler retries it.
    Orphaned,
}

/// Logs and applies one webhook event.
pub fn ingest_event(
    engine: &Engine,
    mut event: AttendanceEvent,
    now: DateTime<Utc>,
) -> EngineResult<IngestOutcome> {
    if !engine.store().insert_event(event.clone())? {
        tracing::debug!(event_id = %event.id, "Ignoring duplicate webhook event");
        return Ok(IngestOutcome::Duplicate);
    }

    let Some(session) = engine.store().get_session(event.session_id)? else {
        event.settle(EventStatus::Orphaned, "session not found");
        engine.store().save_event(event.clone())?;
        tracing::warn!(
            event_id = %event.id,
            session_id = event.session_id,
            "Webhook event for unknown session"
        );
        return Ok(IngestOutcome::Orphaned);
    };

    match event.kind {
        EventKind::Join => {
            apply_join(engine, &session, &mut event, now)?;
            Ok(IngestOutcome::Applied)
        }
        EventKind::Leave => {
            let delay = engine.config().attendance().leave_delay_seconds;
            if delay > 0 {
                event.process_after = Some(now + Duration::seconds(delay));
                engine.store().save_event(event.clone())?;
                tracing::debug!(
                    event_id = %event.id,
                    session_id = session.id,
                    user_id = event.user_id,
                    process_after = ?event.process_after,
                    "Deferred leave event"
                );
                return Ok(IngestOutcome::Deferred);
            }

            Ok(match apply_leave(engine, &mut event)? {
                EventStatus::Applied => IngestOutcome::Applied,
                _ => IngestOutcome::Orphaned,
            })
        }
    }
}

/// Records a join and moves a ready session to ongoing when allowed.
fn apply_join(
    engine: &Engine,
    session: &Session,
    event: &mut AttendanceEvent,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let mut attendance = engine
        .store()
        .get_attendance(session.id, event.user_id)?
        .unwrap_or_else(|| MeetingAttendance::new(session.id, event.user_id, event.role));

    let opened = attendance.record_join(event.occurred_at);
    engine.store().save_attendance(attendance)?;

    event.attempts += 1;
    event.settle(
        EventStatus::Applied,
        if opened { "join recorded" } else { "already in meeting" },
    );
    engine.store().save_event(event.clone())?;

    tracing::info!(
        session_id = session.id,
        user_id = event.user_id,
        role = ?event.role,
        opened,
        "Participant joined"
    );

    if session.status == SessionStatus::Ready {
        let mut session = session.clone();
        if let Err(e) = transition_to_ongoing(engine, &mut session, now) {
            tracing::debug!(session_id = session.id, error = %e, "Session stays READY after join");
        }
    }

    Ok(())
}

/// Applies a stored leave event to its attendance record.
///
/// The event is marked Applied, or Orphaned when there is no session,
/// no attendance or no open cycle. A leave older than the open cycle's
/// join is Discarded. Returns the new status.
pub fn apply_leave(engine: &Engine, event: &mut AttendanceEvent) -> EngineResult<EventStatus> {
    event.attempts += 1;

    let outcome = match engine.store().get_session(event.session_id)? {
        None => (EventStatus::Orphaned, "session not found"),
        Some(session) => match engine.store().get_attendance(session.id, event.user_id)? {
            None => (EventStatus::Orphaned, "no attendance record"),
            Some(attendance)
                if attendance
                    .open_join_time()
                    .is_some_and(|joined| joined > event.occurred_at) =>
            {
                (EventStatus::Discarded, "leave precedes the open join")
            }
            Some(mut attendance) => {
                if attendance.record_leave(event.occurred_at, &session.window()) {
                    engine.store().save_attendance(attendance)?;
                    (EventStatus::Applied, "leave recorded")
                } else {
                    (EventStatus::Orphaned, "no open cycle")
                }
            }
        },
    };

    event.settle(outcome.0, outcome.1);
    engine.store().save_event(event.clone())?;

    match outcome.0 {
        EventStatus::Applied => tracing::info!(
            session_id = event.session_id,
            user_id = event.user_id,
            "Participant left"
        ),
        status => tracing::warn!(
            event_id = %event.id,
            session_id = event.session_id,
            user_id = event.user_id,
            status = %status,
            reason = outcome.1,
            "Leave event could not be applied"
        ),
    }

    Ok(outcome.0)
}

/// Re-applies a stored event that could not be applied earlier.
///
/// Returns the event's new status; an unmatched event stays Orphaned.
pub fn replay_event(
    engine: &Engine,
    event: &mut AttendanceEvent,
    now: DateTime<Utc>,
) -> EngineResult<EventStatus> {
    match event.kind {
        EventKind::Leave => apply_leave(engine, event),
        EventKind::Join => match engine.store().get_session(event.session_id)? {
            Some(session) => {
                apply_join(engine, &session, event, now)?;
                Ok(EventStatus::Applied)
            }
            None => {
                event.attempts += 1;
                event.settle(EventStatus::Orphaned, "session not found");
                engine.store().save_event(event.clone())?;
                Ok(EventStatus::Orphaned)
            }
        },
    }
}

/// Returns true if the user joined again after the leave happened.
pub fn is_superseded(engine: &Engine, event: &AttendanceEvent) -> EngineResult<bool> {
    if event.kind != EventKind::Leave {
        return Ok(false);
    }

    Ok(engine
        .store()
        .list_user_events(event.session_id, event.user_id)?
        .iter()
        .any(|other| other.kind == EventKind::Join && other.occurred_at > event.occurred_at))
}

/// Records a client heartbeat for a participant.
pub fn record_heartbeat(
    engine: &Engine,
    session_id: u64,
    user_id: u64,
    now: DateTime<Utc>,
) -> EngineResult<MeetingAttendance> {
    let mut attendance = engine
        .store()
        .get_attendance(session_id, user_id)?
        .ok_or(EngineError::AttendanceNotFound {
            session_id,
            user_id,
        })?;

    attendance.update_heartbeat(now);
    engine.store().save_attendance(attendance.clone())?;
    Ok(attendance)
}
