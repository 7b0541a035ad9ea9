//! Attendance percentage and status classification.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::AttendanceSettings;
use crate::models::AttendanceStatus;

/// Thresholds used to classify an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceRules {
    /// Late tolerance after the scheduled start.
    pub grace_minutes: i64,
    /// Minimum percentage for attended/late.
    pub attended_threshold_percent: Decimal,
    /// Below this percentage the participant counts as absent.
    pub minimum_presence_percent: Decimal,
}

impl AttendanceRules {
    /// Builds the rules from the global attendance settings.
    pub fn from_settings(settings: &AttendanceSettings) -> Self {
        Self {
            grace_minutes: settings.grace_period_minutes,
            attended_threshold_percent: settings.attended_threshold_percent,
            minimum_presence_percent: settings.minimum_presence_percent,
        }
    }

    /// Replaces the grace period, e.g. with an academy's late tolerance.
    pub fn with_grace(mut self, grace_minutes: i64) -> Self {
        self.grace_minutes = grace_minutes;
        self
    }
}

impl Default for AttendanceRules {
    fn default() -> Self {
        Self::from_settings(&AttendanceSettings::default())
    }
}

/// Returns `total / scheduled × 100`, capped at 100 and rounded to 2 dp.
///
/// A zero or negative scheduled duration yields 0.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::attendance_percentage;
/// use rust_decimal::Decimal;
///
/// assert_eq!(attendance_percentage(30, 60), Decimal::from(50));
/// assert_eq!(attendance_percentage(90, 60), Decimal::from(100));
/// assert_eq!(attendance_percentage(10, 0), Decimal::ZERO);
/// ```
pub fn attendance_percentage(total_minutes: i64, scheduled_minutes: i64) -> Decimal {
    if scheduled_minutes <= 0 {
        return Decimal::ZERO;
    }

    let raw = Decimal::from(total_minutes.max(0)) / Decimal::from(scheduled_minutes)
        * Decimal::ONE_HUNDRED;

    raw.min(Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Classifies an attendance record.
///
/// * no join, or presence below the minimum → [`AttendanceStatus::Absent`]
/// * below the attended threshold → [`AttendanceStatus::Left`], however early the join
/// * at or above the threshold and late → [`AttendanceStatus::Late`]
/// * at or above the threshold and on time → [`AttendanceStatus::Attended`]
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::{AttendanceRules, determine_attendance_status};
/// use academy_sessions::models::AttendanceStatus;
/// use chrono::Utc;
/// use rust_decimal::Decimal;
///
/// let rules = AttendanceRules::default();
/// let joined = Some(Utc::now());
///
/// assert_eq!(
///     determine_attendance_status(joined, false, Decimal::from(80), &rules),
///     AttendanceStatus::Attended
/// );
/// assert_eq!(
///     determine_attendance_status(joined, true, Decimal::from(30), &rules),
///     AttendanceStatus::Left
/// );
/// assert_eq!(
///     determine_attendance_status(None, false, Decimal::ZERO, &rules),
///     AttendanceStatus::Absent
/// );
/// ```
pub fn determine_attendance_status(
    first_join: Option<DateTime<Utc>>,
    is_late: bool,
    percentage: Decimal,
    rules: &AttendanceRules,
) -> AttendanceStatus {
    if first_join.is_none() || percentage < rules.minimum_presence_percent {
        return AttendanceStatus::Absent;
    }

    if percentage < rules.attended_threshold_percent {
        return AttendanceStatus::Left;
    }

    if is_late {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Attended
    }
}
