//! CalculateSessionAttendance: final attendance of ended sessions.
//!
//! Picks up completed or still-ongoing sessions that ended at least
//! `calculation_delay_minutes` ago (so straggling webhooks can land) and
//! were scheduled within `lookback_days`. Every uncalculated attendance
//! record is calculated and synced to the student's report. A failed
//! record is queued for retry.

use chrono::{DateTime, Duration, Utc};

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{AttendanceOperation, Session, SessionStatus};
use crate::reconciliation::calculate_record;

use super::{JobKind, JobSummary, enqueue_retry};

fn is_due(session: &Session, cutoff: DateTime<Utc>, since: DateTime<Utc>) -> bool {
    matches!(
        session.status,
        SessionStatus::Completed | SessionStatus::Ongoing
    ) && session.scheduled_end() <= cutoff
        && session.scheduled_at >= since
}

/// Calculates pending attendance for every academy.
///
/// `processed` and `failed` count attendance records; `skipped` counts
/// sessions with nothing left to calculate.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::CalculateAttendance);
    let settings = engine.config().attendance();
    let cutoff = now - Duration::minutes(settings.calculation_delay_minutes);
    let since = now - Duration::days(settings.lookback_days);
    let batch_size = settings.batch_size.max(1);

    for academy in engine.store().list_academies()? {
        let sessions: Vec<Session> = engine
            .store()
            .list_sessions(academy.id)?
            .into_iter()
            .filter(|s| is_due(s, cutoff, since))
            .collect();

        for (batch_number, batch) in sessions.chunks(batch_size).enumerate() {
            tracing::debug!(
                academy_id = academy.id,
                batch = batch_number + 1,
                sessions = batch.len(),
                "Calculating attendance batch"
            );

            for session in batch {
                let pending: Vec<u64> = engine
                    .store()
                    .list_attendances(session.id)?
                    .into_iter()
                    .filter(|a| !a.is_calculated)
                    .map(|a| a.user_id)
                    .collect();

                if pending.is_empty() {
                    summary.skipped += 1;
                    continue;
                }

                for user_id in pending {
                    match calculate_record(engine, session, user_id, now) {
                        Ok(_) => summary.processed += 1,
                        Err(e) => {
                            summary.failed += 1;
                            tracing::error!(
                                academy_id = academy.id,
                                session_id = session.id,
                                user_id,
                                error = %e,
                                "Attendance calculation failed"
                            );
                            let operation = AttendanceOperation::Calculate {
                                session_id: session.id,
                                user_id,
                            };
                            if let Err(queue_error) = enqueue_retry(engine, operation, &e, now) {
                                tracing::error!(
                                    session_id = session.id,
                                    user_id,
                                    error = %queue_error,
                                    "Failed to queue attendance calculation for retry"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(summary)
}
