//! UpdateSessionStatuses: runs the status state machine over open sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::lifecycle::{TransitionReport, process_status_transitions};

use super::{JobKind, JobSummary};

/// Options for a status update run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatusesOptions {
    /// Only count what would change.
    #[serde(default)]
    pub dry_run: bool,
    /// Restrict the run to one academy.
    #[serde(default)]
    pub academy_id: Option<u64>,
}

/// Runs the transitions with explicit options, one academy at a time.
pub fn run_with(
    engine: &Engine,
    now: DateTime<Utc>,
    options: UpdateStatusesOptions,
) -> EngineResult<TransitionReport> {
    let mut report = TransitionReport::default();

    for academy in engine.store().list_academies()? {
        if options.academy_id.is_some_and(|id| id != academy.id) {
            continue;
        }

        let sessions = engine
            .store()
            .list_sessions(academy.id)?
            .into_iter()
            .filter(|s| !s.status.is_final())
            .collect();
        let academy_report = process_status_transitions(engine, sessions, now, options.dry_run);

        tracing::info!(
            academy_id = academy.id,
            dry_run = options.dry_run,
            to_ready = academy_report.to_ready,
            to_absent = academy_report.to_absent,
            to_completed = academy_report.to_completed,
            errors = academy_report.errors.len(),
            "Processed session statuses"
        );

        report.to_ready += academy_report.to_ready;
        report.to_absent += academy_report.to_absent;
        report.to_completed += academy_report.to_completed;
        report.errors.extend(academy_report.errors);
    }

    Ok(report)
}

/// Runs the transitions for every academy.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let report = run_with(engine, now, UpdateStatusesOptions::default())?;

    let mut summary = JobSummary::new(JobKind::UpdateStatuses);
    summary.processed = report.to_ready + report.to_absent + report.to_completed;
    summary.failed = report.errors.len() as u32;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::models::{Academy, Session, SessionKind, SessionStatus, SessionType};

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn setup() -> Engine {
        let engine = Engine::in_memory(ConfigLoader::load("./config/default").unwrap());
        for id in [1, 2] {
            engine
                .store()
                .save_academy(Academy::new(id, "Academy", format!("a{}", id)))
                .unwrap();
            let mut session = Session::new(
                id,
                id,
                SessionKind::Academic,
                SessionType::Group,
                10,
                make_datetime("2026-01-15T09:00:00Z"),
                60,
            );
            session.status = SessionStatus::Ongoing;
            session.started_at = Some(make_datetime("2026-01-15T09:00:00Z"));
            engine.store().save_session(session).unwrap();
        }
        engine
    }

    #[test]
    fn test_auto_completes_past_buffer() {
        let engine = setup();
        let summary = run(&engine, make_datetime("2026-01-15T10:05:00Z")).unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(engine.session(1).unwrap().status, SessionStatus::Completed);
        assert_eq!(engine.session(2).unwrap().status, SessionStatus::Completed);
    }

    #[test]
    fn test_dry_run_with_academy_filter() {
        let engine = setup();
        let options = UpdateStatusesOptions {
            dry_run: true,
            academy_id: Some(2),
        };

        let report = run_with(&engine, make_datetime("2026-01-15T10:05:00Z"), options).unwrap();
        assert_eq!(report.to_completed, 1);
        assert_eq!(engine.session(2).unwrap().status, SessionStatus::Ongoing);
    }
}
