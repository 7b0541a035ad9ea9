//! RetryAttendanceOperation: replays failed attendance operations.
//!
//! A failed operation is queued with `attempts = 1` and waits
//! `backoff[attempts − 1]` seconds before each replay. Once it has failed
//! `max_attempts` times it is dead-lettered and kept for inspection.

use chrono::{DateTime, Duration, Utc};

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceOperation, EventStatus, RetryOperation};
use crate::reconciliation::calculate_record;

use super::delayed_leave::settle_leave;
use super::{JobKind, JobSummary};

/// Queues an operation that just failed.
pub fn enqueue_retry(
    engine: &Engine,
    operation: AttendanceOperation,
    error: &EngineError,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let policy = engine.config().retry();
    let next = now + Duration::seconds(policy.backoff_after(1));
    let mut retry = RetryOperation::new(operation, error.to_string(), now, next);
    retry.dead = policy.max_attempts <= 1;

    tracing::warn!(
        retry_id = %retry.id,
        operation = retry.operation.label(),
        error = %error,
        next_attempt_at = %retry.next_attempt_at,
        "Queued attendance operation for retry"
    );

    engine.store().save_retry(retry)
}

/// Runs one operation.
fn execute(
    engine: &Engine,
    operation: &AttendanceOperation,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    match operation {
        AttendanceOperation::Calculate {
            session_id,
            user_id,
        } => {
            let session = engine.session(*session_id)?;
            calculate_record(engine, &session, *user_id, now)?;
            Ok(())
        }
        AttendanceOperation::ApplyLeave { event_id } => {
            let mut event =
                engine
                    .store()
                    .get_event(event_id)?
                    .ok_or_else(|| EngineError::InvalidEvent {
                        message: format!("event {} not found", event_id),
                    })?;
            if event.status.is_settled() {
                return Ok(());
            }

            match settle_leave(engine, &mut event)? {
                EventStatus::Orphaned => Err(EngineError::InvalidEvent {
                    message: format!("event {} still has no open cycle", event_id),
                }),
                _ => Ok(()),
            }
        }
    }
}

/// Runs every due retry.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::RetryOperations);
    let policy = engine.config().retry().clone();

    for mut retry in engine.store().list_retries()? {
        if !retry.is_due(now) {
            summary.skipped += 1;
            continue;
        }

        match execute(engine, &retry.operation, now) {
            Ok(()) => {
                engine.store().remove_retry(retry.id)?;
                summary.processed += 1;
                tracing::info!(
                    retry_id = %retry.id,
                    operation = retry.operation.label(),
                    attempts = retry.attempts,
                    "Retried attendance operation succeeded"
                );
            }
            Err(e) => {
                retry.attempts += 1;
                retry.last_error = e.to_string();
                if retry.attempts >= policy.max_attempts {
                    retry.dead = true;
                    tracing::error!(
                        retry_id = %retry.id,
                        operation = retry.operation.label(),
                        attempts = retry.attempts,
                        error = %e,
                        "Attendance operation failed permanently"
                    );
                } else {
                    retry.next_attempt_at =
                        now + Duration::seconds(policy.backoff_after(retry.attempts));
                    tracing::warn!(
                        retry_id = %retry.id,
                        operation = retry.operation.label(),
                        attempts = retry.attempts,
                        next_attempt_at = %retry.next_attempt_at,
                        error = %e,
                        "Attendance operation failed again"
                    );
                }
                engine.store().save_retry(retry)?;
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
