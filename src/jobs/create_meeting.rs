//! CreateSessionMeetingJob.
//!
//! Triggered for a single session, or run as a sweep that gives every
//! ready or imminent session a live room and ends rooms of sessions that
//! were abandoned without completing.

use chrono::{DateTime, Duration, Utc};

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::meetings::{end_meeting, ensure_meeting};
use crate::models::{Session, SessionStatus};

use super::{JobKind, JobSummary};

/// Ensures one session has a meeting. Returns true if a room was created.
///
/// Final sessions are left alone.
pub fn run_for_session(
    engine: &Engine,
    session_id: u64,
    now: DateTime<Utc>,
) -> EngineResult<bool> {
    let mut session = engine.session(session_id)?;
    if session.status.is_final() {
        tracing::debug!(
            session_id,
            status = %session.status,
            "Skipping meeting creation for finished session"
        );
        return Ok(false);
    }

    let academy = engine.academy(session.academy_id)?;
    let created = ensure_meeting(
        &mut session,
        &academy,
        engine.meetings(),
        engine.config(),
        now,
    )?;
    if created {
        engine.store().save_session(session)?;
    }
    Ok(created)
}

fn needs_meeting(
    session: &Session,
    preparation_minutes: i64,
    cleanup_hours: i64,
    now: DateTime<Utc>,
) -> bool {
    if now > session.scheduled_at + Duration::hours(cleanup_hours) {
        return false;
    }
    let imminent = session.status == SessionStatus::Scheduled
        && now >= session.scheduled_at - Duration::minutes(preparation_minutes)
        && now <= session.scheduled_end();
    let has_valid = session
        .meeting
        .as_ref()
        .is_some_and(|m| m.ended_at.is_none() && m.is_valid_at(now));

    (session.status == SessionStatus::Ready || imminent) && !has_valid
}

fn is_abandoned(session: &Session, cleanup_hours: i64, now: DateTime<Utc>) -> bool {
    !session.status.is_final()
        && session.meeting.as_ref().is_some_and(|m| m.ended_at.is_none())
        && now > session.scheduled_at + Duration::hours(cleanup_hours)
}

/// Sweeps every academy.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::CreateMeetings);
    let cleanup_hours = engine.config().meeting().expired_cleanup_hours;

    for academy in engine.store().list_academies()? {
        let settings = engine.config().academy_settings(academy.id);

        for mut session in engine.store().list_sessions(academy.id)? {
            if is_abandoned(&session, cleanup_hours, now) {
                match end_meeting(&mut session, engine.meetings(), now) {
                    Ok(_) => {
                        engine.store().save_session(session.clone())?;
                        summary.processed += 1;
                        tracing::info!(
                            academy_id = academy.id,
                            session_id = session.id,
                            status = %session.status,
                            "Ended room of abandoned session"
                        );
                    }
                    Err(e) => {
                        summary.failed += 1;
                        tracing::error!(session_id = session.id, error = %e, "Failed to end room");
                    }
                }
                continue;
            }

            if !needs_meeting(&session, settings.preparation_minutes, cleanup_hours, now) {
                summary.skipped += 1;
                continue;
            }

            match ensure_meeting(
                &mut session,
                &academy,
                engine.meetings(),
                engine.config(),
                now,
            ) {
                Ok(_) => {
                    engine.store().save_session(session)?;
                    summary.processed += 1;
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        academy_id = academy.id,
                        session_id = session.id,
                        error = %e,
                        "Failed to create meeting"
                    );
                }
            }
        }
    }

    Ok(summary)
}
