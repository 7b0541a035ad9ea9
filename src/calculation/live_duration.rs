//! Live attendance duration and stale cycle handling.
//!
//! While a session runs, the stored total only covers closed cycles. These
//! helpers add the open cycle on top and close cycles that were left open
//! after the session ended.

use chrono::{DateTime, Duration, Utc};

use crate::models::{AUTO_CLOSE_SESSION_ENDED, AttendanceCycle, MeetingAttendance, SessionWindow};

use super::cycle_duration::{calculate_cycle_duration, clipped_minutes};

/// Returns the minutes attended so far, counting an open cycle.
///
/// * Before the start only completed minutes count.
/// * Past `end + post_grace` an open interval counts as closed at the
///   scheduled end, matching what [`auto_close_stale_cycles`] would store.
/// * Otherwise the open cycle counts from `max(join, start)` to `now`,
///   clipped at the end.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::current_duration;
/// use academy_sessions::models::{MeetingAttendance, ParticipantRole, SessionWindow};
/// use chrono::{DateTime, Utc};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
/// let window = SessionWindow::from_duration(at("2026-01-15T09:00:00Z"), 60);
///
/// let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
/// attendance.record_join(at("2026-01-15T08:55:00Z"));
///
/// assert_eq!(current_duration(&attendance, &window, at("2026-01-15T09:25:00Z"), 30), 25);
/// ```
pub fn current_duration(
    attendance: &MeetingAttendance,
    window: &SessionWindow,
    now: DateTime<Utc>,
    post_grace_minutes: i64,
) -> i64 {
    let completed = calculate_cycle_duration(&attendance.cycles, window);

    if now < window.start {
        return completed;
    }

    let Some(joined) = attendance.open_join_time() else {
        return completed;
    };

    let stale = now > window.end + Duration::minutes(post_grace_minutes);
    match attendance.cycles.last() {
        Some(AttendanceCycle::Interval { .. }) if stale => {
            completed + clipped_minutes(joined, window.end, window)
        }
        Some(AttendanceCycle::Event { .. }) if stale => completed,
        _ => completed + clipped_minutes(joined, now, window),
    }
}

/// Closes open interval cycles of a session that ended more than
/// `post_grace_minutes` ago.
///
/// Closed cycles end at the scheduled end and are flagged `auto_closed`
/// with reason `session_ended`. Webhook-form joins are left untouched.
/// Returns true if anything changed, in which case the stored total is
/// recomputed.
pub fn auto_close_stale_cycles(
    attendance: &mut MeetingAttendance,
    window: &SessionWindow,
    now: DateTime<Utc>,
    post_grace_minutes: i64,
) -> bool {
    if now <= window.end + Duration::minutes(post_grace_minutes) {
        return false;
    }

    let mut closed_at = None;
    for cycle in attendance.cycles.iter_mut() {
        if let AttendanceCycle::Interval {
            joined_at,
            left_at,
            duration_minutes,
            auto_closed,
            auto_close_reason,
        } = cycle
        {
            if left_at.is_some() {
                continue;
            }
            let leave = window.end.max(*joined_at);
            *left_at = Some(leave);
            *duration_minutes = Some(clipped_minutes(*joined_at, leave, window));
            *auto_closed = true;
            *auto_close_reason = Some(AUTO_CLOSE_SESSION_ENDED.to_string());
            closed_at = Some(leave);
        }
    }

    let Some(leave) = closed_at else {
        return false;
    };

    attendance.leave_count += 1;
    attendance.last_leave_time = Some(match attendance.last_leave_time {
        Some(previous) if previous > leave => previous,
        _ => leave,
    });
    attendance.recompute_total(window);

    tracing::debug!(
        session_id = attendance.session_id,
        user_id = attendance.user_id,
        total_minutes = attendance.total_duration_minutes,
        "Auto-closed stale attendance cycle"
    );

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventKind, ParticipantRole};

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn window() -> SessionWindow {
        SessionWindow::from_duration(make_datetime("2026-01-15T09:00:00Z"), 60)
    }

    fn joined_at(s: &str) -> MeetingAttendance {
        let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
        attendance.record_join(make_datetime(s));
        attendance
    }

    #[test]
    fn test_before_start_counts_only_completed() {
        let attendance = joined_at("2026-01-15T08:50:00Z");
        let minutes = current_duration(
            &attendance,
            &window(),
            make_datetime("2026-01-15T08:58:00Z"),
            30,
        );
        assert_eq!(minutes, 0);
    }

    #[test]
    fn test_open_cycle_counts_until_now() {
        let mut attendance = joined_at("2026-01-15T09:00:00Z");
        attendance.record_leave(make_datetime("2026-01-15T09:10:00Z"), &window());
        attendance.record_join(make_datetime("2026-01-15T09:20:00Z"));

        let minutes = current_duration(
            &attendance,
            &window(),
            make_datetime("2026-01-15T09:35:00Z"),
            30,
        );
        assert_eq!(minutes, 25);
    }

    #[test]
    fn test_open_cycle_clipped_at_end_during_grace() {
        let attendance = joined_at("2026-01-15T09:30:00Z");
        let minutes = current_duration(
            &attendance,
            &window(),
            make_datetime("2026-01-15T10:20:00Z"),
            30,
        );
        assert_eq!(minutes, 30);
    }

    #[test]
    fn test_stale_webhook_join_counts_nothing() {
        let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
        attendance.cycles.push(AttendanceCycle::Event {
            kind: EventKind::Join,
            timestamp: make_datetime("2026-01-15T09:30:00Z"),
        });

        let minutes = current_duration(
            &attendance,
            &window(),
            make_datetime("2026-01-15T11:00:00Z"),
            30,
        );
        assert_eq!(minutes, 0);
    }

    #[test]
    fn test_auto_close_after_grace() {
        let mut attendance = joined_at("2026-01-15T09:20:00Z");
        let changed = auto_close_stale_cycles(
            &mut attendance,
            &window(),
            make_datetime("2026-01-15T10:31:00Z"),
            30,
        );

        assert!(changed);
        assert!(!attendance.is_currently_in_meeting());
        assert_eq!(attendance.total_duration_minutes, 40);
        assert_eq!(
            attendance.last_leave_time,
            Some(make_datetime("2026-01-15T10:00:00Z"))
        );
        match &attendance.cycles[0] {
            AttendanceCycle::Interval {
                auto_closed,
                auto_close_reason,
                ..
            } => {
                assert!(*auto_closed);
                assert_eq!(auto_close_reason.as_deref(), Some("session_ended"));
            }
            other => panic!("Expected interval, got {:?}", other),
        }
    }

    #[test]
    fn test_auto_close_waits_for_grace() {
        let mut attendance = joined_at("2026-01-15T09:20:00Z");
        let changed = auto_close_stale_cycles(
            &mut attendance,
            &window(),
            make_datetime("2026-01-15T10:30:00Z"),
            30,
        );
        assert!(!changed);
        assert!(attendance.is_currently_in_meeting());
    }

    #[test]
    fn test_auto_close_ignores_webhook_joins() {
        let mut attendance = MeetingAttendance::new(1, 20, ParticipantRole::Student);
        attendance.cycles.push(AttendanceCycle::Event {
            kind: EventKind::Join,
            timestamp: make_datetime("2026-01-15T09:30:00Z"),
        });

        let changed = auto_close_stale_cycles(
            &mut attendance,
            &window(),
            make_datetime("2026-01-15T12:00:00Z"),
            30,
        );
        assert!(!changed);
    }
}
