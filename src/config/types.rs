//! Configuration types for the session engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files. Every section carries
//! defaults so a partial file only needs to name what it overrides.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attendance calculation and reconciliation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceSettings {
    /// Minutes to wait after a session ends before calculating attendance,
    /// so late webhooks can arrive.
    pub calculation_delay_minutes: i64,
    /// Late tolerance after the scheduled start.
    pub grace_period_minutes: i64,
    /// Only sessions scheduled within this many days are recalculated.
    pub lookback_days: i64,
    /// Number of sessions processed per batch.
    pub batch_size: usize,
    /// Overtime allowance after the scheduled end before open cycles are
    /// considered stale.
    pub post_session_grace_minutes: i64,
    /// Minimum percentage for attended/late.
    pub attended_threshold_percent: Decimal,
    /// Below this percentage the participant counts as absent.
    pub minimum_presence_percent: Decimal,
    /// Minutes without heartbeat before a participant is stale.
    pub stale_heartbeat_minutes: i64,
    /// Seconds a leave event is held back to absorb reconnects.
    /// Zero applies leaves immediately.
    pub leave_delay_seconds: i64,
    /// Orphaned events older than this are discarded.
    pub orphan_max_age_hours: i64,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            calculation_delay_minutes: 5,
            grace_period_minutes: 15,
            lookback_days: 7,
            batch_size: 100,
            post_session_grace_minutes: 30,
            attended_threshold_percent: Decimal::from(50),
            minimum_presence_percent: Decimal::ONE,
            stale_heartbeat_minutes: 5,
            leave_delay_seconds: 60,
            orphan_max_age_hours: 24,
        }
    }
}

/// Meeting room and session timing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingSettings {
    /// Name of the video platform recorded on meetings.
    pub platform: String,
    /// Base URL for generated join links.
    pub base_url: String,
    /// Minutes before start when a session becomes ready.
    pub preparation_minutes: i64,
    /// Minutes after the scheduled end before a session auto-completes.
    pub buffer_minutes: i64,
    /// Earliest a session may go ongoing, in minutes before start.
    pub early_join_minutes: i64,
    /// A session scheduled further than this in the future cannot go ongoing.
    pub max_future_hours: i64,
    /// Teacher join window opens this many minutes before start.
    pub teacher_join_before_minutes: i64,
    /// Teacher join window closes this many minutes after the end.
    pub teacher_join_after_minutes: i64,
    /// Student join window opens this many minutes before start.
    pub student_join_before_minutes: i64,
    /// Student join window closes this many minutes after the end.
    pub student_join_after_minutes: i64,
    /// Default room capacity.
    pub max_participants: u32,
    /// Whether rooms record by default.
    pub recording_enabled: bool,
    /// Extra room lifetime after the scheduled end.
    pub timeout_buffer_minutes: i64,
    /// Overtime allowance added to the room's max duration.
    pub overtime_buffer_minutes: i64,
    /// Empty timeout used when the session has already ended.
    pub empty_timeout_seconds: i64,
    /// Duration assumed when a session has none.
    pub default_duration_minutes: i64,
    /// Sessions further ahead than this are not prepared.
    pub ready_lookahead_hours: i64,
    /// Sessions older than this are not prepared.
    pub ready_lookback_hours: i64,
    /// Rooms of unfinished sessions this long past start are ended.
    pub expired_cleanup_hours: i64,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            platform: "livekit".to_string(),
            base_url: "https://meet.localhost".to_string(),
            preparation_minutes: 10,
            buffer_minutes: 5,
            early_join_minutes: 15,
            max_future_hours: 2,
            teacher_join_before_minutes: 30,
            teacher_join_after_minutes: 120,
            student_join_before_minutes: 15,
            student_join_after_minutes: 30,
            max_participants: 10,
            recording_enabled: false,
            timeout_buffer_minutes: 30,
            overtime_buffer_minutes: 60,
            empty_timeout_seconds: 1800,
            default_duration_minutes: 60,
            ready_lookahead_hours: 24,
            ready_lookback_hours: 24,
            expired_cleanup_hours: 2,
        }
    }
}

/// Retry policy for failed attendance operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts before an operation is dead-lettered.
    pub max_attempts: u32,
    /// Delay before each retry, indexed by failed attempt count.
    pub backoff_seconds: Vec<i64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_seconds: vec![30, 60, 120],
        }
    }
}

impl RetrySettings {
    /// Returns the delay before the next attempt after `attempts` failures.
    ///
    /// Past the end of the schedule the last entry repeats.
    pub fn backoff_after(&self, attempts: u32) -> i64 {
        let index = attempts.saturating_sub(1) as usize;
        self.backoff_seconds
            .get(index)
            .or_else(|| self.backoff_seconds.last())
            .copied()
            .unwrap_or(60)
    }
}

/// Run intervals for the background jobs, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// CalculateSessionAttendance interval.
    pub calculate_attendance_secs: u64,
    /// ProcessDelayedLeaveEvent interval.
    pub delayed_leave_secs: u64,
    /// ReconcileOrphanedAttendanceEvents interval.
    pub reconcile_orphans_secs: u64,
    /// RetryAttendanceOperation interval.
    pub retry_operations_secs: u64,
    /// CreateSessionMeetingJob sweep interval.
    pub create_meetings_secs: u64,
    /// PrepareUpcomingSessions interval.
    pub prepare_upcoming_secs: u64,
    /// UpdateSessionStatuses interval.
    pub update_statuses_secs: u64,
    /// CalculateSessionEarnings interval.
    pub calculate_earnings_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            calculate_attendance_secs: 300,
            delayed_leave_secs: 15,
            reconcile_orphans_secs: 600,
            retry_operations_secs: 30,
            create_meetings_secs: 60,
            prepare_upcoming_secs: 60,
            update_statuses_secs: 60,
            calculate_earnings_secs: 3600,
        }
    }
}

/// Per-academy overrides from academies.yaml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademyOverrides {
    /// Overrides [`MeetingSettings::preparation_minutes`].
    #[serde(default)]
    pub preparation_minutes: Option<i64>,
    /// Overrides [`MeetingSettings::buffer_minutes`].
    #[serde(default)]
    pub buffer_minutes: Option<i64>,
    /// Overrides [`AttendanceSettings::grace_period_minutes`].
    #[serde(default)]
    pub late_tolerance_minutes: Option<i64>,
    /// Overrides [`MeetingSettings::max_participants`].
    #[serde(default)]
    pub max_participants: Option<u32>,
    /// Overrides [`MeetingSettings::recording_enabled`].
    #[serde(default)]
    pub recording_enabled: Option<bool>,
}

/// academies.yaml file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcademiesConfig {
    /// Map of academy id to overrides.
    #[serde(default)]
    pub academies: HashMap<u64, AcademyOverrides>,
}

/// engine.yaml file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Attendance section.
    pub attendance: AttendanceSettings,
    /// Meeting section.
    pub meeting: MeetingSettings,
    /// Retry section.
    pub retry: RetrySettings,
    /// Job interval section.
    pub jobs: JobSettings,
}

/// Effective timing settings for one academy, after applying overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademySettings {
    /// Minutes before start when a session becomes ready.
    pub preparation_minutes: i64,
    /// Minutes after the end before auto-completion.
    pub buffer_minutes: i64,
    /// Late tolerance after the scheduled start.
    pub late_tolerance_minutes: i64,
    /// Room capacity.
    pub max_participants: u32,
    /// Whether rooms record.
    pub recording_enabled: bool,
}

/// The complete engine configuration loaded from YAML files.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    settings: EngineSettings,
    academies: HashMap<u64, AcademyOverrides>,
}

impl EngineConfig {
    /// Creates a new EngineConfig from its component parts.
    pub fn new(settings: EngineSettings, academies: HashMap<u64, AcademyOverrides>) -> Self {
        Self {
            settings,
            academies,
        }
    }

    /// Returns the global settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the attendance settings.
    pub fn attendance(&self) -> &AttendanceSettings {
        &self.settings.attendance
    }

    /// Returns the meeting settings.
    pub fn meeting(&self) -> &MeetingSettings {
        &self.settings.meeting
    }

    /// Returns the retry policy.
    pub fn retry(&self) -> &RetrySettings {
        &self.settings.retry
    }

    /// Returns the job intervals.
    pub fn jobs(&self) -> &JobSettings {
        &self.settings.jobs
    }

    /// Returns the raw overrides for every configured academy.
    pub fn academy_overrides(&self) -> &HashMap<u64, AcademyOverrides> {
        &self.academies
    }

    /// Resolves the effective settings for an academy.
    pub fn academy_settings(&self, academy_id: u64) -> AcademySettings {
        let meeting = &self.settings.meeting;
        let overrides = self.academies.get(&academy_id);
        let pick = |f: fn(&AcademyOverrides) -> Option<i64>, default: i64| {
            overrides.and_then(f).unwrap_or(default)
        };

        AcademySettings {
            preparation_minutes: pick(|o| o.preparation_minutes, meeting.preparation_minutes),
            buffer_minutes: pick(|o| o.buffer_minutes, meeting.buffer_minutes),
            late_tolerance_minutes: pick(
                |o| o.late_tolerance_minutes,
                self.settings.attendance.grace_period_minutes,
            ),
            max_participants: overrides
                .and_then(|o| o.max_participants)
                .unwrap_or(meeting.max_participants),
            recording_enabled: overrides
                .and_then(|o| o.recording_enabled)
                .unwrap_or(meeting.recording_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.attendance.calculation_delay_minutes, 5);
        assert_eq!(settings.attendance.grace_period_minutes, 15);
        assert_eq!(settings.meeting.preparation_minutes, 10);
        assert_eq!(settings.meeting.buffer_minutes, 5);
        assert_eq!(settings.retry.backoff_seconds, vec![30, 60, 120]);
    }

    #[test]
    fn test_academy_settings_fall_back_to_defaults() {
        let config = EngineConfig::default();
        let settings = config.academy_settings(99);
        assert_eq!(settings.preparation_minutes, 10);
        assert_eq!(settings.late_tolerance_minutes, 15);
        assert_eq!(settings.max_participants, 10);
        assert!(!settings.recording_enabled);
    }

    #[test]
    fn test_academy_overrides_apply_per_field() {
        let mut academies = HashMap::new();
        academies.insert(
            2,
            AcademyOverrides {
                preparation_minutes: Some(20),
                recording_enabled: Some(true),
                ..Default::default()
            },
        );
        let config = EngineConfig::new(EngineSettings::default(), academies);

        let settings = config.academy_settings(2);
        assert_eq!(settings.preparation_minutes, 20);
        assert!(settings.recording_enabled);
        assert_eq!(settings.buffer_minutes, 5);
    }

    #[test]
    fn test_backoff_after_repeats_last_entry() {
        let retry = RetrySettings::default();
        assert_eq!(retry.backoff_after(1), 30);
        assert_eq!(retry.backoff_after(2), 60);
        assert_eq!(retry.backoff_after(3), 120);
        assert_eq!(retry.backoff_after(7), 120);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "attendance:\n  grace_period_minutes: 10\n";
        let settings: EngineSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.attendance.grace_period_minutes, 10);
        assert_eq!(settings.attendance.lookback_days, 7);
        assert_eq!(settings.meeting.platform, "livekit");
    }
}
