//! ProcessDelayedLeaveEvent: applies leaves whose delay has passed.
//!
//! A leave followed by a join of the same user is a reconnect: the leave
//! is Superseded and the cycle stays open.

use chrono::{DateTime, Utc};

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{AttendanceEvent, AttendanceOperation, EventKind, EventStatus};
use crate::tracking::{apply_leave, is_superseded};

use super::{JobKind, JobSummary, enqueue_retry};

/// Settles one pending leave: Superseded after a reconnect, otherwise
/// applied through [`apply_leave`]. Returns the new status.
pub fn settle_leave(engine: &Engine, event: &mut AttendanceEvent) -> EngineResult<EventStatus> {
    if is_superseded(engine, event)? {
        event.settle(EventStatus::Superseded, "participant rejoined");
        engine.store().save_event(event.clone())?;
        tracing::info!(
            event_id = %event.id,
            session_id = event.session_id,
            user_id = event.user_id,
            "Leave superseded by reconnect"
        );
        return Ok(EventStatus::Superseded);
    }

    apply_leave(engine, event)
}

/// Applies every due pending leave.
///
/// Applied and superseded leaves count as processed; leaves that end up
/// Orphaned or Discarded count as skipped. A leave that fails is queued
/// for retry and the rest of the batch carries on.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::DelayedLeave);

    let due = engine
        .store()
        .list_events_by_status(EventStatus::Pending)?
        .into_iter()
        .filter(|e| e.kind == EventKind::Leave && e.is_due(now));

    for mut event in due {
        match settle_leave(engine, &mut event) {
            Ok(EventStatus::Applied | EventStatus::Superseded) => summary.processed += 1,
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    event_id = %event.id,
                    session_id = event.session_id,
                    error = %e,
                    "Failed to apply delayed leave"
                );
                let operation = AttendanceOperation::ApplyLeave {
                    event_id: event.id.clone(),
                };
                if let Err(queue_error) = enqueue_retry(engine, operation, &e, now) {
                    tracing::error!(
                        event_id = %event.id,
                        error = %queue_error,
                        "Failed to queue delayed leave for retry"
                    );
                }
            }
        }
    }

    Ok(summary)
}
