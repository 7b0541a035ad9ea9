//! CalculateSessionEarnings and the monthly earnings summary.
//!
//! One [`TeacherEarning`] is recorded per finished session. The job is
//! idempotent: sessions that already have an earning are skipped.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::calculation::calculate_session_earning;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    EarningsSummary, MethodTotals, ParticipantRole, Session, SessionStatus, TeacherEarning,
};

use super::{JobKind, JobSummary};

/// Records the teacher's earning for one finished session.
///
/// Returns the existing earning if there is one, and `None` when the
/// session is not finished or the teacher's calculated attendance is not
/// a presence. A teacher without an attendance record is paid.
pub fn calculate_session_earnings(
    engine: &Engine,
    session: &Session,
    now: DateTime<Utc>,
) -> EngineResult<Option<TeacherEarning>> {
    if !matches!(
        session.status,
        SessionStatus::Completed | SessionStatus::Absent
    ) {
        tracing::debug!(
            session_id = session.id,
            status = %session.status,
            "Session not eligible for earnings"
        );
        return Ok(None);
    }

    if let Some(existing) = engine.store().get_session_earning(session.id)? {
        return Ok(Some(existing));
    }

    let attendances = engine.store().list_attendances(session.id)?;
    let teacher_absent = attendances.iter().any(|a| {
        a.role == ParticipantRole::Teacher
            && a.user_id == session.teacher_id
            && a.is_calculated
            && a.status.is_some_and(|s| !s.is_present())
    });
    if teacher_absent {
        tracing::info!(
            session_id = session.id,
            teacher_id = session.teacher_id,
            "Teacher did not attend; no earning recorded"
        );
        return Ok(None);
    }

    let teacher = engine
        .store()
        .get_teacher(session.teacher_id)?
        .ok_or(EngineError::TeacherNotFound {
            teacher_id: session.teacher_id,
        })?;
    let calculation = calculate_session_earning(session, &teacher, &attendances)?;

    let completed_at = session.ended_at.unwrap_or(session.scheduled_at);
    let earning = TeacherEarning {
        id: Uuid::new_v4(),
        teacher_id: teacher.id,
        academy_id: session.academy_id,
        session_id: session.id,
        amount: calculation.amount,
        calculation_method: calculation.method,
        earning_month: completed_at.format("%Y-%m").to_string(),
        is_finalized: false,
        is_disputed: false,
        dispute_notes: None,
        calculated_at: now,
    };
    engine.store().save_earning(earning.clone())?;

    tracing::info!(
        session_id = session.id,
        teacher_id = teacher.id,
        amount = %earning.amount,
        method = %earning.calculation_method,
        month = %earning.earning_month,
        "Recorded teacher earning"
    );

    Ok(Some(earning))
}

/// Records earnings for every finished session without one.
pub fn run(engine: &Engine, now: DateTime<Utc>) -> EngineResult<JobSummary> {
    let mut summary = JobSummary::new(JobKind::CalculateEarnings);

    for academy in engine.store().list_academies()? {
        for session in engine.store().list_sessions(academy.id)? {
            if !matches!(
                session.status,
                SessionStatus::Completed | SessionStatus::Absent
            ) {
                continue;
            }
            if engine.store().get_session_earning(session.id)?.is_some() {
                summary.skipped += 1;
                continue;
            }

            match calculate_session_earnings(engine, &session, now) {
                Ok(Some(_)) => summary.processed += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        academy_id = academy.id,
                        session_id = session.id,
                        error = %e,
                        "Earning calculation failed"
                    );
                }
            }
        }
    }

    Ok(summary)
}

/// Summarizes a teacher's earnings for a `YYYY-MM` month.
///
/// # Example
///
/// ```
/// use academy_sessions::config::ConfigLoader;
/// use academy_sessions::engine::Engine;
/// use academy_sessions::jobs::earnings_summary;
/// use academy_sessions::models::{TeacherProfile, TeacherRates};
///
/// let engine = Engine::in_memory(ConfigLoader::load("./config/default").unwrap());
/// engine.store().save_teacher(TeacherProfile {
///     id: 10,
///     academy_id: 1,
///     name: "Teacher".to_string(),
///     rates: TeacherRates::default(),
/// }).unwrap();
///
/// let summary = earnings_summary(&engine, 10, "2026-01").unwrap();
/// assert_eq!(summary.count, 0);
/// assert!(earnings_summary(&engine, 10, "January").is_err());
/// ```
pub fn earnings_summary(
    engine: &Engine,
    teacher_id: u64,
    month: &str,
) -> EngineResult<EarningsSummary> {
    NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").map_err(|_| {
        EngineError::CalculationError {
            message: format!("invalid month '{}', expected YYYY-MM", month),
        }
    })?;
    if engine.store().get_teacher(teacher_id)?.is_none() {
        return Err(EngineError::TeacherNotFound { teacher_id });
    }

    let mut breakdown: BTreeMap<_, MethodTotals> = BTreeMap::new();
    let mut count = 0;
    let mut total_amount = Decimal::ZERO;
    let mut finalized_amount = Decimal::ZERO;
    let mut disputed_count = 0;

    for earning in engine
        .store()
        .list_teacher_earnings(teacher_id)?
        .into_iter()
        .filter(|e| e.earning_month == month)
    {
        let totals = breakdown.entry(earning.calculation_method).or_default();
        totals.count += 1;
        totals.amount += earning.amount;

        count += 1;
        total_amount += earning.amount;
        if earning.is_finalized {
            finalized_amount += earning.amount;
        }
        if earning.is_disputed {
            disputed_count += 1;
        }
    }

    Ok(EarningsSummary {
        teacher_id,
        month: month.to_string(),
        breakdown,
        count,
        total_amount,
        finalized_amount,
        disputed_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::models::{
        Academy, AttendanceStatus, CalculationMethod, MeetingAttendance, SessionKind,
        SessionType, TeacherProfile, TeacherRates,
    };
    use std::str::FromStr;

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup() -> Engine {
        let engine = Engine::in_memory(ConfigLoader::load("./config/default").unwrap());
        engine
            .store()
            .save_academy(Academy::new(1, "Noor", "noor"))
            .unwrap();
        engine
            .store()
            .save_teacher(TeacherProfile {
                id: 10,
                academy_id: 1,
                name: "Teacher".to_string(),
                rates: TeacherRates {
                    individual: Some(dec("30")),
                    per_student: Some(dec("12.50")),
                    ..Default::default()
                },
            })
            .unwrap();

        let mut individual = Session::new(
            1,
            1,
            SessionKind::Quran,
            SessionType::Individual,
            10,
            make_datetime("2026-01-15T09:00:00Z"),
            60,
        );
        individual.status = SessionStatus::Completed;
        individual.ended_at = Some(make_datetime("2026-01-31T23:30:00Z"));
        engine.store().save_session(individual).unwrap();

        let mut group = Session::new(
            2,
            1,
            SessionKind::Quran,
            SessionType::Group,
            10,
            make_datetime("2026-01-16T09:00:00Z"),
            60,
        );
        group.status = SessionStatus::Completed;
        engine.store().save_session(group).unwrap();
        for (user_id, status) in [(20, AttendanceStatus::Attended), (21, AttendanceStatus::Late)] {
            let mut attendance = MeetingAttendance::new(2, user_id, ParticipantRole::Student);
            attendance.status = Some(status);
            attendance.is_calculated = true;
            engine.store().save_attendance(attendance).unwrap();
        }
        engine
    }

    #[test]
    fn test_job_records_one_earning_per_session() {
        let engine = setup();
        let now = make_datetime("2026-02-01T00:00:00Z");

        let summary = run(&engine, now).unwrap();
        assert_eq!(summary.processed, 2);

        let again = run(&engine, now).unwrap();
        assert_eq!(again.processed, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(engine.store().list_teacher_earnings(10).unwrap().len(), 2);
    }

    #[test]
    fn test_absent_teacher_earns_nothing() {
        let engine = setup();
        let mut teacher = MeetingAttendance::new(1, 10, ParticipantRole::Teacher);
        teacher.status = Some(AttendanceStatus::Left);
        teacher.is_calculated = true;
        engine.store().save_attendance(teacher).unwrap();

        let session = engine.session(1).unwrap();
        let earning =
            calculate_session_earnings(&engine, &session, make_datetime("2026-02-01T00:00:00Z"))
                .unwrap();
        assert!(earning.is_none());
    }

    #[test]
    fn test_unfinished_session_not_eligible() {
        let engine = setup();
        let mut session = engine.session(1).unwrap();
        session.status = SessionStatus::Ongoing;

        let earning = calculate_session_earnings(&engine, &session, Utc::now()).unwrap();
        assert!(earning.is_none());
    }

    #[test]
    fn test_missing_teacher_profile_fails() {
        let engine = setup();
        let mut session = engine.session(1).unwrap();
        session.teacher_id = 99;

        let err = calculate_session_earnings(&engine, &session, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::TeacherNotFound { teacher_id: 99 }));
    }

    #[test]
    fn test_summary_breaks_down_by_method() {
        let engine = setup();
        run(&engine, make_datetime("2026-02-01T00:00:00Z")).unwrap();

        let summary = earnings_summary(&engine, 10, "2026-01").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_amount, dec("55.00"));
        assert_eq!(summary.finalized_amount, Decimal::ZERO);
        assert_eq!(
            summary.breakdown[&CalculationMethod::PerStudent],
            MethodTotals {
                count: 1,
                amount: dec("25.00")
            }
        );
        assert_eq!(summary.breakdown[&CalculationMethod::IndividualRate].count, 1);

        let february = earnings_summary(&engine, 10, "2026-02").unwrap();
        assert_eq!(february.count, 0);
    }
}
