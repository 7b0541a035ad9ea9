//! ReconcileOrphanedAttendanceEvents.
//!
//! Webhooks can arrive before their session is stored or out of order.
//! This job replays Orphaned events oldest first and discards the ones that
//! stayed unmatched past `orphan_max_age_hours`. It also closes cycles left
//! open after a session ended. Settled events older than the same age are
//! pruned from the event log at the start of each run, so an event
//! discarded by one run is still visible until the next.

use chrono::{DateTime, Duration, Utc};

use crate::calculation::auto_close_stale_cycles;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{AttendanceEvent, EventStatus, SessionStatus};
use crate::tracking::replay_event;

use super::{JobKind, JobSummary};

fn discard(engine: &Engine, event: &mut AttendanceEvent) -> EngineResult<()> {
    event.settle(EventStatus::Discarded, "orphaned past max age");
    engine.store().save_event(event.clone())
}

/// Prunes the event log, replays orphaned events, then closes stale
/// cycles per academy.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::ReconcileOrphans);
    let settings = engine.config().attendance();
    let max_age = Duration::hours(settings.orphan_max_age_hours);

    match engine.store().prune_settled_events(now - max_age) {
        Ok(0) => {}
        Ok(pruned) => tracing::info!(pruned, "Pruned settled attendance events"),
        Err(e) => tracing::error!(error = %e, "Failed to prune attendance events"),
    }

    for mut event in engine.store().list_events_by_status(EventStatus::Orphaned)? {
        if now - event.received_at > max_age {
            match discard(engine, &mut event) {
                Ok(()) => {
                    summary.skipped += 1;
                    tracing::warn!(
                        event_id = %event.id,
                        session_id = event.session_id,
                        user_id = event.user_id,
                        "Discarded orphaned attendance event"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(event_id = %event.id, error = %e, "Failed to discard event");
                }
            }
            continue;
        }

        match replay_event(engine, &mut event, now) {
            Ok(EventStatus::Applied) => {
                summary.processed += 1;
                tracing::info!(
                    event_id = %event.id,
                    session_id = event.session_id,
                    "Reconciled orphaned attendance event"
                );
            }
            Ok(_) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(event_id = %event.id, error = %e, "Failed to replay event");
            }
        }
    }

    let post_grace = settings.post_session_grace_minutes;
    for academy in engine.store().list_academies()? {
        for session in engine.store().list_sessions(academy.id)? {
            if matches!(
                session.status,
                SessionStatus::Scheduled | SessionStatus::Cancelled
            ) {
                continue;
            }
            let window = session.window();

            for mut attendance in engine.store().list_attendances(session.id)? {
                if !auto_close_stale_cycles(&mut attendance, &window, now, post_grace) {
                    continue;
                }
                let user_id = attendance.user_id;
                match engine.store().save_attendance(attendance) {
                    Ok(()) => {
                        summary.processed += 1;
                        tracing::info!(
                            academy_id = academy.id,
                            session_id = session.id,
                            user_id,
                            "Auto-closed stale attendance cycle"
                        );
                    }
                    Err(e) => {
                        summary.failed += 1;
                        tracing::error!(
                            academy_id = academy.id,
                            session_id = session.id,
                            user_id,
                            error = %e,
                            "Failed to store auto-closed cycle"
                        );
                    }
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::models::{
        Academy, AttendanceCycle, EventKind, MeetingAttendance, ParticipantRole, Session,
        SessionKind, SessionType,
    };
    use crate::store::testing::{FailingStore, engine_with};
    use crate::tracking::ingest_event;
    use std::sync::Arc;

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn engine() -> Engine {
        seed(Engine::in_memory(ConfigLoader::load("./config/default").unwrap()))
    }

    fn seed(engine: Engine) -> Engine {
        engine
            .store()
            .save_academy(Academy::new(1, "Noor", "noor"))
            .unwrap();
        engine
    }

    fn session() -> Session {
        Session::new(
            1,
            1,
            SessionKind::Quran,
            SessionType::Group,
            10,
            make_datetime("2026-01-15T09:00:00Z"),
            60,
        )
    }

    fn join_event(id: &str, at: &str) -> AttendanceEvent {
        let at = make_datetime(at);
        AttendanceEvent::new(id, 1, 20, ParticipantRole::Student, EventKind::Join, at, at)
    }

    #[test]
    fn test_replays_event_once_session_exists() {
        let engine = engine();
        let at = make_datetime("2026-01-15T09:00:00Z");
        ingest_event(&engine, join_event("e1", "2026-01-15T09:00:00Z"), at).unwrap();
        assert_eq!(
            engine.store().get_event("e1").unwrap().unwrap().status,
            EventStatus::Orphaned
        );

        engine.store().save_session(session()).unwrap();
        let summary = run(&engine, make_datetime("2026-01-15T09:10:00Z")).unwrap();
        assert_eq!(summary.processed, 1);

        let stored = engine.store().get_event("e1").unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Applied);
        assert_eq!(stored.attempts, 1);
        assert!(
            engine
                .store()
                .get_attendance(1, 20)
                .unwrap()
                .unwrap()
                .is_currently_in_meeting()
        );
    }

    #[test]
    fn test_unmatched_event_stays_orphaned_then_discarded() {
        let engine = engine();
        let at = make_datetime("2026-01-15T09:00:00Z");
        ingest_event(&engine, join_event("e1", "2026-01-15T09:00:00Z"), at).unwrap();

        let summary = run(&engine, make_datetime("2026-01-15T12:00:00Z")).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            engine.store().get_event("e1").unwrap().unwrap().status,
            EventStatus::Orphaned
        );

        run(&engine, make_datetime("2026-01-16T09:01:00Z")).unwrap();
        assert_eq!(
            engine.store().get_event("e1").unwrap().unwrap().status,
            EventStatus::Discarded
        );

        run(&engine, make_datetime("2026-01-16T09:02:00Z")).unwrap();
        assert!(engine.store().get_event("e1").unwrap().is_none());
    }

    #[test]
    fn test_closes_stale_cycles_of_ended_sessions() {
        let engine = engine();
        let mut ended = session();
        ended.status = SessionStatus::Completed;
        engine.store().save_session(ended).unwrap();

        let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
        attendance.record_join(make_datetime("2026-01-15T09:00:00Z"));
        engine.store().save_attendance(attendance).unwrap();

        let summary = run(&engine, make_datetime("2026-01-15T10:31:00Z")).unwrap();
        assert_eq!(summary.processed, 1);

        let stored = engine.store().get_attendance(1, 20).unwrap().unwrap();
        assert!(!stored.is_currently_in_meeting());
        assert_eq!(stored.total_duration_minutes, 60);
        assert!(matches!(
            stored.cycles[0],
            AttendanceCycle::Interval {
                auto_closed: true,
                ..
            }
        ));
    }

    #[test]
    fn test_store_error_on_one_event_does_not_stop_the_run() {
        let store = Arc::new(FailingStore::new());
        let engine = seed(engine_with(store.clone()));
        let at = make_datetime("2026-01-15T09:00:00Z");
        ingest_event(&engine, join_event("e1", "2026-01-15T09:00:00Z"), at).unwrap();
        ingest_event(&engine, join_event("e2", "2026-01-15T09:05:00Z"), at).unwrap();

        let mut ended = session();
        ended.status = SessionStatus::Completed;
        engine.store().save_session(ended).unwrap();
        let mut attendance = MeetingAttendance::new(1, 21, ParticipantRole::Student);
        attendance.record_join(make_datetime("2026-01-15T09:00:00Z"));
        engine.store().save_attendance(attendance).unwrap();

        FailingStore::set(&store.fail_event_writes, true);
        let summary = run(&engine, make_datetime("2026-01-16T09:10:00Z")).unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.processed, 1);
        assert!(
            !engine
                .store()
                .get_attendance(1, 21)
                .unwrap()
                .unwrap()
                .is_currently_in_meeting()
        );
    }

    #[test]
    fn test_prunes_settled_events_past_max_age() {
        let engine = engine();
        engine.store().save_session(session()).unwrap();
        let at = make_datetime("2026-01-15T09:00:00Z");
        ingest_event(&engine, join_event("e1", "2026-01-15T09:00:00Z"), at).unwrap();
        assert_eq!(
            engine.store().get_event("e1").unwrap().unwrap().status,
            EventStatus::Applied
        );

        run(&engine, make_datetime("2026-01-15T12:00:00Z")).unwrap();
        assert!(engine.store().get_event("e1").unwrap().is_some());

        run(&engine, make_datetime("2026-01-16T09:01:00Z")).unwrap();
        assert!(engine.store().get_event("e1").unwrap().is_none());
    }
}
