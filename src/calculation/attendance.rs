//! Final attendance calculation for one record.
//!
//! The calculation runs four rules in order and records each as an audit
//! step: cycle clipping, percentage, lateness and status classification.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AttendanceStatus, AuditStep, MeetingAttendance, SessionWindow};

use super::attendance_status::{AttendanceRules, attendance_percentage, determine_attendance_status};
use super::cycle_duration::calculate_cycle_duration;

/// The outcome of calculating one attendance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCalculation {
    /// Clipped minutes of all closed cycles.
    pub total_minutes: i64,
    /// Scheduled duration used as the denominator.
    pub session_duration_minutes: i64,
    /// Share of the scheduled duration attended.
    pub percentage: Decimal,
    /// Classified status.
    pub status: AttendanceStatus,
    /// Whether the first join came after the grace deadline.
    pub is_late: bool,
    /// Minutes between the start and the first join, never negative.
    pub late_minutes: i64,
    /// First join used for lateness.
    pub first_join_time: Option<DateTime<Utc>>,
    /// Last leave found in the record.
    pub last_leave_time: Option<DateTime<Utc>>,
    /// The audit steps recording this calculation.
    pub audit_steps: Vec<AuditStep>,
}

impl AttendanceCalculation {
    /// Writes the result onto the attendance record.
    pub fn apply_to(&self, attendance: &mut MeetingAttendance, now: DateTime<Utc>) {
        attendance.total_duration_minutes = self.total_minutes;
        attendance.session_duration_minutes = Some(self.session_duration_minutes);
        attendance.percentage = self.percentage;
        attendance.status = Some(self.status);
        attendance.is_calculated = true;
        attendance.calculated_at = Some(now);
        if attendance.first_join_time.is_none() {
            attendance.first_join_time = self.first_join_time;
        }
        if attendance.last_leave_time.is_none() {
            attendance.last_leave_time = self.last_leave_time;
        }
    }
}

/// Calculates the attendance of one record against the session window.
///
/// # Arguments
///
/// * `attendance` - The record whose cycles are evaluated
/// * `window` - The scheduled session bounds
/// * `rules` - Grace period and classification thresholds
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::{AttendanceRules, calculate_attendance};
/// use academy_sessions::models::{
///     AttendanceStatus, MeetingAttendance, ParticipantRole, SessionWindow,
/// };
/// use chrono::{DateTime, Utc};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
/// let window = SessionWindow::from_duration(at("2026-01-15T09:00:00Z"), 60);
///
/// let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
/// attendance.record_join(at("2026-01-15T09:20:00Z"));
/// attendance.record_leave(at("2026-01-15T10:00:00Z"), &window);
///
/// let result = calculate_attendance(&attendance, &window, &AttendanceRules::default());
/// assert_eq!(result.total_minutes, 40);
/// assert_eq!(result.status, AttendanceStatus::Late);
/// assert_eq!(result.late_minutes, 20);
/// ```
pub fn calculate_attendance(
    attendance: &MeetingAttendance,
    window: &SessionWindow,
    rules: &AttendanceRules,
) -> AttendanceCalculation {
    let mut audit_steps = Vec::with_capacity(4);

    // Step 1: clip and sum cycles
    let total_minutes = calculate_cycle_duration(&attendance.cycles, window);
    let session_duration_minutes = window.duration_minutes();
    audit_steps.push(AuditStep {
        step_number: 1,
        rule_id: "cycle_clipping".to_string(),
        rule_name: "Clip Cycles To Session Window".to_string(),
        input: serde_json::json!({
            "cycles": attendance.cycles.len(),
            "session_start": window.start.to_rfc3339(),
            "session_end": window.end.to_rfc3339(),
        }),
        output: serde_json::json!({
            "total_minutes": total_minutes,
        }),
        reasoning: format!(
            "{} cycle(s) clipped to [{}, {}]: {} minute(s) counted",
            attendance.cycles.len(),
            window.start.format("%H:%M"),
            window.end.format("%H:%M"),
            total_minutes
        ),
    });

    // Step 2: percentage of the scheduled duration
    let percentage = attendance_percentage(total_minutes, session_duration_minutes);
    audit_steps.push(AuditStep {
        step_number: 2,
        rule_id: "attendance_percentage".to_string(),
        rule_name: "Attendance Percentage".to_string(),
        input: serde_json::json!({
            "total_minutes": total_minutes,
            "session_duration_minutes": session_duration_minutes,
        }),
        output: serde_json::json!({
            "percentage": percentage.normalize().to_string(),
        }),
        reasoning: format!(
            "{} of {} scheduled minute(s) = {}%",
            total_minutes,
            session_duration_minutes,
            percentage.normalize()
        ),
    });

    // Step 3: lateness
    let first_join_time = attendance.effective_first_join();
    let deadline = window.start + Duration::minutes(rules.grace_minutes);
    let is_late = first_join_time.is_some_and(|joined| joined > deadline);
    let late_minutes = first_join_time
        .map(|joined| (joined - window.start).num_minutes().max(0))
        .unwrap_or(0);
    audit_steps.push(AuditStep {
        step_number: 3,
        rule_id: "late_detection".to_string(),
        rule_name: "Late Arrival Detection".to_string(),
        input: serde_json::json!({
            "first_join_time": first_join_time.map(|t| t.to_rfc3339()),
            "grace_minutes": rules.grace_minutes,
        }),
        output: serde_json::json!({
            "is_late": is_late,
            "late_minutes": late_minutes,
        }),
        reasoning: match first_join_time {
            Some(_) if is_late => format!(
                "Joined {} minute(s) after start, past the {} minute grace period",
                late_minutes, rules.grace_minutes
            ),
            Some(_) => format!(
                "Joined within the {} minute grace period",
                rules.grace_minutes
            ),
            None => "Never joined".to_string(),
        },
    });

    // Step 4: classification
    let status = determine_attendance_status(first_join_time, is_late, percentage, rules);
    audit_steps.push(AuditStep {
        step_number: 4,
        rule_id: "attendance_status".to_string(),
        rule_name: "Attendance Status Classification".to_string(),
        input: serde_json::json!({
            "joined": first_join_time.is_some(),
            "percentage": percentage.normalize().to_string(),
            "is_late": is_late,
            "attended_threshold_percent": rules.attended_threshold_percent.normalize().to_string(),
            "minimum_presence_percent": rules.minimum_presence_percent.normalize().to_string(),
        }),
        output: serde_json::json!({
            "status": status.as_str(),
        }),
        reasoning: format!("Classified as {}", status),
    });

    AttendanceCalculation {
        total_minutes,
        session_duration_minutes,
        percentage,
        status,
        is_late,
        late_minutes,
        first_join_time,
        last_leave_time: attendance
            .last_leave_time
            .or_else(|| attendance.last_leave_from_cycles()),
        audit_steps,
    }
}
