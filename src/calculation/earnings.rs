//! Teacher earning calculation for one session.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, CalculationMethod, MeetingAttendance, ParticipantRole, Session, SessionKind,
    SessionType, TeacherProfile,
};

/// The amount a teacher earns for one session and how it was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningCalculation {
    /// Amount owed, rounded to 2 dp.
    pub amount: Decimal,
    /// Method used.
    pub method: CalculationMethod,
    /// Rate the method applied.
    pub rate: Decimal,
    /// Students counted as present.
    pub present_students: u32,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Calculates the teacher's earning for a finished session.
///
/// * Individual sessions pay the individual rate.
/// * Group sessions pay the per-student rate for every student who attended
///   or was late, falling back to the flat group rate.
/// * Interactive course sessions pay the fixed rate, falling back to the
///   per-session rate.
///
/// Returns [`EngineError::RateNotFound`] when the teacher has no rate for
/// the method the session needs.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::calculate_session_earning;
/// use academy_sessions::models::{
///     CalculationMethod, Session, SessionKind, SessionType, TeacherProfile, TeacherRates,
/// };
/// use chrono::Utc;
/// use rust_decimal::Decimal;
///
/// let session = Session::new(1, 1, SessionKind::Quran, SessionType::Individual, 10, Utc::now(), 45);
/// let teacher = TeacherProfile {
///     id: 10,
///     academy_id: 1,
///     name: "Teacher".to_string(),
///     rates: TeacherRates { individual: Some(Decimal::from(30)), ..Default::default() },
/// };
///
/// let result = calculate_session_earning(&session, &teacher, &[]).unwrap();
/// assert_eq!(result.amount, Decimal::from(30));
/// assert_eq!(result.method, CalculationMethod::IndividualRate);
/// ```
pub fn calculate_session_earning(
    session: &Session,
    teacher: &TeacherProfile,
    attendances: &[MeetingAttendance],
) -> EngineResult<EarningCalculation> {
    let rates = &teacher.rates;
    let present_students = attendances
        .iter()
        .filter(|a| a.session_id == session.id && a.role == ParticipantRole::Student)
        .filter(|a| a.status.is_some_and(|s| s.is_present()))
        .count() as u32;

    let missing = |method: CalculationMethod| EngineError::RateNotFound {
        teacher_id: teacher.id,
        method: method.to_string(),
    };

    let (method, rate, amount) = match (session.kind, session.session_type) {
        (SessionKind::Interactive, _) => match (rates.fixed, rates.per_session) {
            (Some(fixed), _) => (CalculationMethod::Fixed, fixed, fixed),
            (None, Some(rate)) => (CalculationMethod::PerSession, rate, rate),
            (None, None) => return Err(missing(CalculationMethod::Fixed)),
        },
        (_, SessionType::Group) => match (rates.per_student, rates.group) {
            (Some(rate), _) => (
                CalculationMethod::PerStudent,
                rate,
                rate * Decimal::from(present_students),
            ),
            (None, Some(rate)) => (CalculationMethod::GroupRate, rate, rate),
            (None, None) => return Err(missing(CalculationMethod::GroupRate)),
        },
        (_, SessionType::Individual) => match rates.individual {
            Some(rate) => (CalculationMethod::IndividualRate, rate, rate),
            None => return Err(missing(CalculationMethod::IndividualRate)),
        },
    };

    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let audit_step = AuditStep {
        step_number: 1,
        rule_id: "session_earning".to_string(),
        rule_name: "Session Earning Calculation".to_string(),
        input: serde_json::json!({
            "session_id": session.id,
            "session_kind": session.kind.as_str(),
            "session_type": match session.session_type {
                SessionType::Individual => "individual",
                SessionType::Group => "group",
            },
            "present_students": present_students,
        }),
        output: serde_json::json!({
            "method": method.as_str(),
            "rate": rate.normalize().to_string(),
            "amount": amount.normalize().to_string(),
        }),
        reasoning: match method {
            CalculationMethod::PerStudent => format!(
                "{} present student(s) x {} = {}",
                present_students,
                rate.normalize(),
                amount.normalize()
            ),
            _ => format!("Flat {} of {}", method, amount.normalize()),
        },
    };

    Ok(EarningCalculation {
        amount,
        method,
        rate,
        present_students,
        audit_step,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, TeacherRates};
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn teacher(rates: TeacherRates) -> TeacherProfile {
        TeacherProfile {
            id: 10,
            academy_id: 1,
            name: "Teacher".to_string(),
            rates,
        }
    }

    fn session(kind: SessionKind, session_type: SessionType) -> Session {
        Session::new(1, 1, kind, session_type, 10, Utc::now(), 60)
    }

    fn student(user_id: u64, status: AttendanceStatus) -> MeetingAttendance {
        let mut attendance = MeetingAttendance::new(1, user_id, ParticipantRole::Student);
        attendance.status = Some(status);
        attendance
    }

    #[test]
    fn test_group_pays_per_present_student() {
        let attendances = vec![
            student(20, AttendanceStatus::Attended),
            student(21, AttendanceStatus::Late),
            student(22, AttendanceStatus::Left),
            student(23, AttendanceStatus::Absent),
        ];
        let result = calculate_session_earning(
            &session(SessionKind::Quran, SessionType::Group),
            &teacher(TeacherRates {
                per_student: Some(dec("7.50")),
                group: Some(dec("40")),
                ..Default::default()
            }),
            &attendances,
        )
        .unwrap();

        assert_eq!(result.method, CalculationMethod::PerStudent);
        assert_eq!(result.present_students, 2);
        assert_eq!(result.amount, dec("15.00"));
    }

    #[test]
    fn test_group_falls_back_to_group_rate() {
        let result = calculate_session_earning(
            &session(SessionKind::Quran, SessionType::Group),
            &teacher(TeacherRates {
                group: Some(dec("40")),
                ..Default::default()
            }),
            &[],
        )
        .unwrap();

        assert_eq!(result.method, CalculationMethod::GroupRate);
        assert_eq!(result.amount, dec("40"));
    }

    #[test]
    fn test_interactive_prefers_fixed() {
        let result = calculate_session_earning(
            &session(SessionKind::Interactive, SessionType::Group),
            &teacher(TeacherRates {
                fixed: Some(dec("55")),
                per_session: Some(dec("35")),
                per_student: Some(dec("5")),
                ..Default::default()
            }),
            &[],
        )
        .unwrap();
        assert_eq!(result.method, CalculationMethod::Fixed);
        assert_eq!(result.amount, dec("55"));
    }

    #[test]
    fn test_interactive_falls_back_to_per_session() {
        let result = calculate_session_earning(
            &session(SessionKind::Interactive, SessionType::Group),
            &teacher(TeacherRates {
                per_session: Some(dec("35")),
                ..Default::default()
            }),
            &[],
        )
        .unwrap();
        assert_eq!(result.method, CalculationMethod::PerSession);
    }

    #[test]
    fn test_missing_rate_errors() {
        let err = calculate_session_earning(
            &session(SessionKind::Academic, SessionType::Individual),
            &teacher(TeacherRates::default()),
            &[],
        )
        .unwrap_err();

        match err {
            EngineError::RateNotFound { teacher_id, method } => {
                assert_eq!(teacher_id, 10);
                assert_eq!(method, "individual_rate");
            }
            other => panic!("Expected RateNotFound, got {:?}", other),
        }
    }
}
