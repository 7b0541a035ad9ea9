//! PrepareUpcomingSessions: moves sessions into their preparation window.

use chrono::{DateTime, Utc};

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::lifecycle::{should_transition_to_ready, transition_to_ready};

use super::{JobKind, JobSummary};

/// Transitions every due scheduled session to Ready.
///
/// Opening the meeting room is part of the transition; a meeting failure
/// is logged and the session stays Ready.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::PrepareUpcoming);
    let meeting = engine.config().meeting().clone();

    for academy in engine.store().list_academies()? {
        if !academy.is_active {
            continue;
        }
        let settings = engine.config().academy_settings(academy.id);

        for mut session in engine.store().list_sessions(academy.id)? {
            if !should_transition_to_ready(&session, &settings, &meeting, now) {
                continue;
            }

            match transition_to_ready(engine, &mut session, now) {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        academy_id = academy.id,
                        session_id = session.id,
                        error = %e,
                        "Failed to prepare session"
                    );
                }
            }
        }
    }

    Ok(summary)
}
