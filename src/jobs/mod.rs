//! Background jobs.
//!
//! Each job is a plain function over an [`Engine`] at an explicit `now`,
//! so it can be driven by the [`scheduler`], by `POST /jobs/:name/run`, or
//! by a test. Jobs walk academies one at a time and contain failures per
//! record: one bad session never stops the rest of the batch.

pub mod calculate_attendance;
pub mod create_meeting;
pub mod delayed_leave;
pub mod earnings;
pub mod prepare_upcoming;
pub mod reconcile_orphans;
pub mod retry;
pub mod scheduler;
pub mod update_statuses;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::JobSettings;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};

pub use earnings::{calculate_session_earnings, earnings_summary};
pub use retry::enqueue_retry;
pub use scheduler::Scheduler;
pub use update_statuses::UpdateStatusesOptions;

/// The background jobs the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Calculates attendance of ended sessions.
    CalculateAttendance,
    /// Applies leave events whose delay passed.
    DelayedLeave,
    /// Replays orphaned events and closes stale cycles.
    ReconcileOrphans,
    /// Replays failed attendance operations.
    RetryOperations,
    /// Makes sure ready and imminent sessions have a meeting room.
    CreateMeetings,
    /// Moves sessions into their preparation window.
    PrepareUpcoming,
    /// Runs absent and auto-complete transitions.
    UpdateStatuses,
    /// Records teacher earnings of finished sessions.
    CalculateEarnings,
}

impl JobKind {
    /// Every job, in scheduling order.
    pub const ALL: [JobKind; 8] = [
        JobKind::PrepareUpcoming,
        JobKind::CreateMeetings,
        JobKind::DelayedLeave,
        JobKind::UpdateStatuses,
        JobKind::CalculateAttendance,
        JobKind::ReconcileOrphans,
        JobKind::RetryOperations,
        JobKind::CalculateEarnings,
    ];

    /// Returns the job name used in the API and logs.
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::CalculateAttendance => "calculate_attendance",
            JobKind::DelayedLeave => "delayed_leave",
            JobKind::ReconcileOrphans => "reconcile_orphans",
            JobKind::RetryOperations => "retry_operations",
            JobKind::CreateMeetings => "create_meetings",
            JobKind::PrepareUpcoming => "prepare_upcoming",
            JobKind::UpdateStatuses => "update_statuses",
            JobKind::CalculateEarnings => "calculate_earnings",
        }
    }

    /// Returns the configured run interval in seconds.
    pub fn interval_secs(&self, jobs: &JobSettings) -> u64 {
        match self {
            JobKind::CalculateAttendance => jobs.calculate_attendance_secs,
            JobKind::DelayedLeave => jobs.delayed_leave_secs,
            JobKind::ReconcileOrphans => jobs.reconcile_orphans_secs,
            JobKind::RetryOperations => jobs.retry_operations_secs,
            JobKind::CreateMeetings => jobs.create_meetings_secs,
            JobKind::PrepareUpcoming => jobs.prepare_upcoming_secs,
            JobKind::UpdateStatuses => jobs.update_statuses_secs,
            JobKind::CalculateEarnings => jobs.calculate_earnings_secs,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| EngineError::UnknownJob {
                name: s.to_string(),
            })
    }
}

/// Counts from one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// The job that ran.
    pub job: JobKind,
    /// Records handled successfully.
    pub processed: u32,
    /// Records looked at and left alone.
    pub skipped: u32,
    /// Records that failed.
    pub failed: u32,
}

impl JobSummary {
    /// Creates an empty summary.
    pub fn new(job: JobKind) -> Self {
        Self {
            job,
            processed: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn log(&self) {
        if self.failed > 0 {
            tracing::warn!(
                job = %self.job,
                processed = self.processed,
                skipped = self.skipped,
                failed = self.failed,
                "Job finished with failures"
            );
        } else {
            tracing::info!(
                job = %self.job,
                processed = self.processed,
                skipped = self.skipped,
                "Job finished"
            );
        }
    }
}

/// Runs one job to completion.
pub fn run_job(engine: &Engine, kind: JobKind, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    tracing::debug!(job = %kind, %now, "Job started");

    let summary = match kind {
        JobKind::CalculateAttendance => calculate_attendance::run(engine, now)?,
        JobKind::DelayedLeave => delayed_leave::run(engine, now)?,
        JobKind::ReconcileOrphans => reconcile_orphans::run(engine, now)?,
        JobKind::RetryOperations => retry::run(engine, now)?,
        JobKind::CreateMeetings => create_meeting::run(engine, now)?,
        JobKind::PrepareUpcoming => prepare_upcoming::run(engine, now)?,
        JobKind::UpdateStatuses => update_statuses::run(engine, now)?,
        JobKind::CalculateEarnings => earnings::run(engine, now)?,
    };

    summary.log();
    Ok(summary)
}
