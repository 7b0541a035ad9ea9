//! Attendance finalization and report sync.
//!
//! These operations take stored attendance records through the
//! calculation core and write the outcome back, both onto the record and
//! onto the student's session report.

use chrono::{DateTime, Utc};

use crate::calculation::{AttendanceCalculation, auto_close_stale_cycles, calculate_attendance};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{MeetingAttendance, ParticipantRole, Session, SessionReport};

/// Calculates and stores the attendance of one user.
///
/// Stale open cycles are auto-closed first. Student results are synced
/// to the session report.
pub fn calculate_record(
    engine: &Engine,
    session: &Session,
    user_id: u64,
    now: DateTime<Utc>,
) -> EngineResult<AttendanceCalculation> {
    let mut attendance = engine
        .store()
        .get_attendance(session.id, user_id)?
        .ok_or(EngineError::AttendanceNotFound {
            session_id: session.id,
            user_id,
        })?;

    calculate_and_store(engine, session, &mut attendance, now)
}

fn calculate_and_store(
    engine: &Engine,
    session: &Session,
    attendance: &mut MeetingAttendance,
    now: DateTime<Utc>,
) -> EngineResult<AttendanceCalculation> {
    let window = session.window();
    let post_grace = engine.config().attendance().post_session_grace_minutes;
    auto_close_stale_cycles(attendance, &window, now, post_grace);

    let rules = engine.attendance_rules(session.academy_id);
    let calculation = calculate_attendance(attendance, &window, &rules);
    calculation.apply_to(attendance, now);
    engine.store().save_attendance(attendance.clone())?;

    if attendance.role == ParticipantRole::Student {
        sync_report(engine, session, attendance, &calculation, now)?;
    }

    tracing::debug!(
        session_id = session.id,
        user_id = attendance.user_id,
        status = %calculation.status,
        percentage = %calculation.percentage,
        total_minutes = calculation.total_minutes,
        "Calculated attendance"
    );

    Ok(calculation)
}

/// Copies a calculation onto the student's session report, creating the
/// report if needed.
pub fn sync_report(
    engine: &Engine,
    session: &Session,
    attendance: &MeetingAttendance,
    calculation: &AttendanceCalculation,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let mut report = engine
        .store()
        .get_report(session.id, attendance.user_id)?
        .unwrap_or_else(|| {
            SessionReport::new(
                session.id,
                attendance.user_id,
                session.teacher_id,
                session.academy_id,
                session.kind,
            )
        });

    report.meeting_enter_time = calculation.first_join_time;
    report.meeting_leave_time = calculation.last_leave_time;
    report.actual_attendance_minutes = calculation.total_minutes;
    report.attendance_status = Some(calculation.status);
    report.attendance_percentage = calculation.percentage;
    report.is_late = calculation.is_late;
    report.late_minutes = if calculation.is_late {
        calculation.late_minutes
    } else {
        0
    };
    report.is_calculated = true;
    report.evaluated_at = Some(now);

    engine.store().save_report(report)
}

/// Calculates every attendance record of a session that is closing.
///
/// Anyone still inside is treated as having left at `now`, since the room
/// is about to close. Returns the number of records calculated.
pub fn finalize_session_attendance(
    engine: &Engine,
    session: &Session,
    now: DateTime<Utc>,
) -> EngineResult<usize> {
    let window = session.window();
    let post_grace = engine.config().attendance().post_session_grace_minutes;
    let attendances = engine.store().list_attendances(session.id)?;
    let count = attendances.len();

    for mut attendance in attendances {
        auto_close_stale_cycles(&mut attendance, &window, now, post_grace);
        if attendance.is_currently_in_meeting() {
            attendance.record_leave(now, &window);
        }
        calculate_and_store(engine, session, &mut attendance, now)?;
    }

    tracing::info!(
        session_id = session.id,
        records = count,
        "Finalized session attendance"
    );

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::models::{AttendanceStatus, SessionKind, SessionType};

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn setup() -> (Engine, Session) {
        let engine = Engine::in_memory(ConfigLoader::load("./config/default").unwrap());
        let mut session = Session::new(
            1,
            1,
            SessionKind::Quran,
            SessionType::Individual,
            10,
            make_datetime("2026-01-15T09:00:00Z"),
            60,
        );
        session.student_id = Some(20);
        engine.store().save_session(session.clone()).unwrap();
        (engine, session)
    }

    #[test]
    fn test_calculate_record_syncs_report() {
        let (engine, session) = setup();
        let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
        attendance.record_join(make_datetime("2026-01-15T09:20:00Z"));
        attendance.record_leave(make_datetime("2026-01-15T10:00:00Z"), &session.window());
        engine.store().save_attendance(attendance).unwrap();

        let now = make_datetime("2026-01-15T10:10:00Z");
        let result = calculate_record(&engine, &session, 20, now).unwrap();
        assert_eq!(result.status, AttendanceStatus::Late);

        let report = engine.store().get_report(1, 20).unwrap().unwrap();
        assert_eq!(report.attendance_status, Some(AttendanceStatus::Late));
        assert_eq!(report.actual_attendance_minutes, 40);
        assert!(report.is_late);
        assert_eq!(report.late_minutes, 20);
        assert_eq!(report.evaluated_at, Some(now));
    }

    #[test]
    fn test_calculate_record_missing_attendance() {
        let (engine, session) = setup();
        let err = calculate_record(&engine, &session, 99, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::AttendanceNotFound {
                session_id: 1,
                user_id: 99
            }
        ));
    }

    #[test]
    fn test_teacher_attendance_has_no_report() {
        let (engine, session) = setup();
        let mut attendance = MeetingAttendance::new(1, 10, ParticipantRole::Teacher);
        attendance.record_join(make_datetime("2026-01-15T08:55:00Z"));
        engine.store().save_attendance(attendance).unwrap();

        calculate_record(&engine, &session, 10, make_datetime("2026-01-15T11:00:00Z")).unwrap();
        assert!(engine.store().get_report(1, 10).unwrap().is_none());

        let stored = engine.store().get_attendance(1, 10).unwrap().unwrap();
        assert_eq!(stored.status, Some(AttendanceStatus::Attended));
        assert_eq!(stored.total_duration_minutes, 60);
    }

    #[test]
    fn test_finalize_closes_open_cycles_at_now() {
        let (engine, session) = setup();
        let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
        attendance.record_join(make_datetime("2026-01-15T09:00:00Z"));
        engine.store().save_attendance(attendance).unwrap();

        let count =
            finalize_session_attendance(&engine, &session, make_datetime("2026-01-15T09:40:00Z"))
                .unwrap();
        assert_eq!(count, 1);

        let stored = engine.store().get_attendance(1, 20).unwrap().unwrap();
        assert!(!stored.is_currently_in_meeting());
        assert_eq!(stored.total_duration_minutes, 40);
        assert_eq!(stored.status, Some(AttendanceStatus::Attended));
    }
}
