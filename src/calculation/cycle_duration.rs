//! Join/leave cycle duration calculation.
//!
//! Every cycle is clipped to the scheduled session window before it is
//! counted, so time spent in the room before the start or after the end
//! never contributes to attendance.

use chrono::{DateTime, Utc};

use crate::models::{AttendanceCycle, EventKind, SessionWindow};

/// Rounds seconds to the nearest whole minute, half up.
fn round_to_minutes(seconds: i64) -> i64 {
    (seconds + 30) / 60
}

/// Returns the minutes of `[joined, left]` that fall inside the window.
///
/// Returns 0 when the clipped interval is empty.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::clipped_minutes;
/// use academy_sessions::models::SessionWindow;
/// use chrono::{DateTime, Utc};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
/// let window = SessionWindow::from_duration(at("2026-01-15T09:00:00Z"), 60);
///
/// // Joined 10 minutes early, left 10 minutes late: only the 60 scheduled minutes count.
/// assert_eq!(clipped_minutes(at("2026-01-15T08:50:00Z"), at("2026-01-15T10:10:00Z"), &window), 60);
/// ```
pub fn clipped_minutes(joined: DateTime<Utc>, left: DateTime<Utc>, window: &SessionWindow) -> i64 {
    let start = joined.max(window.start);
    let end = left.min(window.end);

    if start >= end {
        return 0;
    }

    round_to_minutes((end - start).num_seconds())
}

/// Sums the clipped minutes of every closed cycle.
///
/// Webhook-form cycles are paired in order: a `join` opens a pending
/// join and the next `leave` closes it. A later join replaces a pending
/// one, a leave without a pending join is ignored, and a join that never
/// sees its leave counts nothing. Interval-form cycles count only once
/// they carry a `left_at`.
///
/// Overlapping intervals are merged before rounding, so time in the room
/// is never counted twice and the total never exceeds the window.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::calculate_cycle_duration;
/// use academy_sessions::models::{AttendanceCycle, SessionWindow};
/// use chrono::{DateTime, Utc};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
/// let window = SessionWindow::from_duration(at("2026-01-15T09:00:00Z"), 60);
/// let cycles = vec![
///     AttendanceCycle::closed(at("2026-01-15T09:00:00Z"), at("2026-01-15T09:20:00Z")),
///     AttendanceCycle::closed(at("2026-01-15T09:30:00Z"), at("2026-01-15T09:50:00Z")),
///     AttendanceCycle::open(at("2026-01-15T09:55:00Z")),
/// ];
///
/// assert_eq!(calculate_cycle_duration(&cycles, &window), 40);
/// ```
pub fn calculate_cycle_duration(cycles: &[AttendanceCycle], window: &SessionWindow) -> i64 {
    let mut intervals = Vec::with_capacity(cycles.len());
    let mut pending_join: Option<DateTime<Utc>> = None;

    for cycle in cycles {
        match cycle {
            AttendanceCycle::Event {
                kind: EventKind::Join,
                timestamp,
            } => {
                pending_join = Some(*timestamp);
            }
            AttendanceCycle::Event {
                kind: EventKind::Leave,
                timestamp,
            } => {
                if let Some(joined) = pending_join.take() {
                    intervals.push((joined, *timestamp));
                }
            }
            AttendanceCycle::Interval {
                joined_at,
                left_at: Some(left_at),
                ..
            } => {
                intervals.push((*joined_at, *left_at));
            }
            AttendanceCycle::Interval { left_at: None, .. } => {}
        }
    }

    merged_minutes(intervals, window)
}

/// Clips intervals to the window, merges the overlapping ones and sums
/// the rounded minutes of each merged span.
///
/// Spans that only touch stay separate so each keeps its own rounding.
fn merged_minutes(intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>, window: &SessionWindow) -> i64 {
    let mut clipped: Vec<_> = intervals
        .into_iter()
        .map(|(joined, left)| (joined.max(window.start), left.min(window.end)))
        .filter(|(start, end)| start < end)
        .collect();
    clipped.sort_by_key(|(start, _)| *start);

    let mut total = 0;
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for (start, end) in clipped {
        current = match current {
            Some((open_start, open_end)) if start < open_end => {
                Some((open_start, open_end.max(end)))
            }
            Some((open_start, open_end)) => {
                total += round_to_minutes((open_end - open_start).num_seconds());
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }

    if let Some((start, end)) = current {
        total += round_to_minutes((end - start).num_seconds());
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn window() -> SessionWindow {
        SessionWindow::from_duration(make_datetime("2026-01-15T09:00:00Z"), 60)
    }

    fn event(kind: EventKind, s: &str) -> AttendanceCycle {
        AttendanceCycle::Event {
            kind,
            timestamp: make_datetime(s),
        }
    }

    #[test]
    fn test_interval_inside_window_counts_fully() {
        let cycles = vec![AttendanceCycle::closed(
            make_datetime("2026-01-15T09:10:00Z"),
            make_datetime("2026-01-15T09:40:00Z"),
        )];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 30);
    }

    #[test]
    fn test_interval_clipped_at_both_ends() {
        let cycles = vec![AttendanceCycle::closed(
            make_datetime("2026-01-15T08:30:00Z"),
            make_datetime("2026-01-15T11:00:00Z"),
        )];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 60);
    }

    #[test]
    fn test_interval_entirely_outside_counts_nothing() {
        let cycles = vec![
            AttendanceCycle::closed(
                make_datetime("2026-01-15T08:00:00Z"),
                make_datetime("2026-01-15T08:59:00Z"),
            ),
            AttendanceCycle::closed(
                make_datetime("2026-01-15T10:00:00Z"),
                make_datetime("2026-01-15T10:30:00Z"),
            ),
        ];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 0);
    }

    #[test]
    fn test_webhook_pairs_are_matched_in_order() {
        let cycles = vec![
            event(EventKind::Join, "2026-01-15T09:00:00Z"),
            event(EventKind::Leave, "2026-01-15T09:15:00Z"),
            event(EventKind::Join, "2026-01-15T09:20:00Z"),
            event(EventKind::Leave, "2026-01-15T09:45:00Z"),
        ];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 40);
    }

    #[test]
    fn test_unmatched_webhook_events_are_ignored() {
        let cycles = vec![
            event(EventKind::Leave, "2026-01-15T09:05:00Z"),
            event(EventKind::Join, "2026-01-15T09:10:00Z"),
            event(EventKind::Join, "2026-01-15T09:12:00Z"),
            event(EventKind::Leave, "2026-01-15T09:30:00Z"),
            event(EventKind::Join, "2026-01-15T09:40:00Z"),
        ];
        // The second join replaces the first pending join.
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 18);
    }

    #[test]
    fn test_latest_pending_join_wins() {
        let cycles = vec![
            event(EventKind::Join, "2026-01-15T09:10:00Z"),
            event(EventKind::Join, "2026-01-15T09:40:00Z"),
            event(EventKind::Leave, "2026-01-15T09:50:00Z"),
        ];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 10);
    }

    #[test]
    fn test_overlapping_intervals_are_counted_once() {
        let cycles = vec![
            AttendanceCycle::closed(
                make_datetime("2026-01-15T09:00:00Z"),
                make_datetime("2026-01-15T09:30:00Z"),
            ),
            AttendanceCycle::closed(
                make_datetime("2026-01-15T08:58:00Z"),
                make_datetime("2026-01-15T09:50:00Z"),
            ),
        ];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 50);
    }

    #[test]
    fn test_mixed_forms_overlap_is_counted_once() {
        let cycles = vec![
            event(EventKind::Join, "2026-01-15T09:10:00Z"),
            event(EventKind::Leave, "2026-01-15T09:40:00Z"),
            AttendanceCycle::closed(
                make_datetime("2026-01-15T09:20:00Z"),
                make_datetime("2026-01-15T09:45:00Z"),
            ),
        ];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 35);
    }

    #[test]
    fn test_per_cycle_rounding_to_nearest_minute() {
        let cycles = vec![
            AttendanceCycle::closed(
                make_datetime("2026-01-15T09:00:00Z"),
                make_datetime("2026-01-15T09:10:29Z"),
            ),
            AttendanceCycle::closed(
                make_datetime("2026-01-15T09:20:00Z"),
                make_datetime("2026-01-15T09:30:30Z"),
            ),
        ];
        assert_eq!(calculate_cycle_duration(&cycles, &window()), 21);
    }

    #[test]
    fn test_leave_before_join_counts_nothing() {
        assert_eq!(
            clipped_minutes(
                make_datetime("2026-01-15T09:30:00Z"),
                make_datetime("2026-01-15T09:10:00Z"),
                &window()
            ),
            0
        );
    }

    proptest! {
        #[test]
        fn prop_clipped_total_never_exceeds_window(
            offsets in prop::collection::vec((-120i64..180, 0i64..240), 0..8)
        ) {
            let window = window();
            let cycles: Vec<AttendanceCycle> = offsets
                .iter()
                .map(|(start, length)| {
                    let joined = window.start + chrono::Duration::minutes(*start);
                    AttendanceCycle::closed(joined, joined + chrono::Duration::minutes(*length))
                })
                .collect();

            let total = calculate_cycle_duration(&cycles, &window);
            prop_assert!(total >= 0);
            prop_assert!(total <= window.duration_minutes());
        }
    }
}
