//! Meeting attendance models.
//!
//! A [`MeetingAttendance`] is the per-user, per-session record of every
//! time the user entered and left the meeting room. Cycles arrive in two
//! shapes: raw webhook events and closed intervals written by the
//! tracking layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SessionWindow;
use crate::calculation::{calculate_cycle_duration, clipped_minutes};

/// Reason recorded on cycles closed because the session ended.
pub const AUTO_CLOSE_SESSION_ENDED: &str = "session_ended";

/// The role a participant plays in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// An enrolled student.
    Student,
    /// The teacher running the session.
    Teacher,
}

/// The classified outcome of an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Present for at least the attended threshold and on time.
    Attended,
    /// Present for at least the attended threshold but joined after the grace deadline.
    Late,
    /// Joined but present for less than the attended threshold.
    Left,
    /// Never joined, or present for less than the minimum presence.
    Absent,
}

impl AttendanceStatus {
    /// Returns the lowercase identifier of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Attended => "attended",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Left => "left",
            AttendanceStatus::Absent => "absent",
        }
    }

    /// Returns true if the participant counts as present.
    pub fn is_present(&self) -> bool {
        matches!(self, AttendanceStatus::Attended | AttendanceStatus::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A join or a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The participant entered the room.
    Join,
    /// The participant left the room.
    Leave,
}

impl EventKind {
    /// Returns the lowercase identifier of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Join => "join",
            EventKind::Leave => "leave",
        }
    }
}

/// One entry in an attendance record's cycle list.
///
/// # Example
///
/// ```
/// use academy_sessions::models::AttendanceCycle;
///
/// let event: AttendanceCycle =
///     serde_json::from_str(r#"{"type": "join", "timestamp": "2026-01-15T09:00:00Z"}"#).unwrap();
/// assert!(matches!(event, AttendanceCycle::Event { .. }));
///
/// let interval: AttendanceCycle =
///     serde_json::from_str(r#"{"joined_at": "2026-01-15T09:00:00Z", "left_at": null}"#).unwrap();
/// assert!(interval.is_open());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttendanceCycle {
    /// A raw webhook event. Pairs are formed from consecutive join/leave.
    Event {
        /// Join or leave.
        #[serde(rename = "type")]
        kind: EventKind,
        /// When it happened.
        timestamp: DateTime<Utc>,
    },
    /// A join with an optional leave.
    Interval {
        /// When the participant entered.
        joined_at: DateTime<Utc>,
        /// When the participant left; `None` while still inside.
        #[serde(default)]
        left_at: Option<DateTime<Utc>>,
        /// Minutes counted for the interval once closed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_minutes: Option<i64>,
        /// Whether the interval was closed by the engine rather than a leave.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        auto_closed: bool,
        /// Why the interval was auto-closed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_close_reason: Option<String>,
    },
}

impl AttendanceCycle {
    /// Creates an open interval starting at `joined_at`.
    pub fn open(joined_at: DateTime<Utc>) -> Self {
        AttendanceCycle::Interval {
            joined_at,
            left_at: None,
            duration_minutes: None,
            auto_closed: false,
            auto_close_reason: None,
        }
    }

    /// Creates a closed interval.
    pub fn closed(joined_at: DateTime<Utc>, left_at: DateTime<Utc>) -> Self {
        AttendanceCycle::Interval {
            joined_at,
            left_at: Some(left_at),
            duration_minutes: None,
            auto_closed: false,
            auto_close_reason: None,
        }
    }

    /// Returns true for an interval without a leave or a trailing join event.
    pub fn is_open(&self) -> bool {
        match self {
            AttendanceCycle::Event { kind, .. } => *kind == EventKind::Join,
            AttendanceCycle::Interval { left_at, .. } => left_at.is_none(),
        }
    }

    /// Returns the join time carried by the cycle, if any.
    pub fn join_time(&self) -> Option<DateTime<Utc>> {
        match self {
            AttendanceCycle::Event {
                kind: EventKind::Join,
                timestamp,
            } => Some(*timestamp),
            AttendanceCycle::Event { .. } => None,
            AttendanceCycle::Interval { joined_at, .. } => Some(*joined_at),
        }
    }

    /// Returns the leave time carried by the cycle, if any.
    pub fn leave_time(&self) -> Option<DateTime<Utc>> {
        match self {
            AttendanceCycle::Event {
                kind: EventKind::Leave,
                timestamp,
            } => Some(*timestamp),
            AttendanceCycle::Event { .. } => None,
            AttendanceCycle::Interval { left_at, .. } => *left_at,
        }
    }
}

/// The attendance of one user in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingAttendance {
    /// The session attended.
    pub session_id: u64,
    /// The attending user.
    pub user_id: u64,
    /// Student or teacher.
    pub role: ParticipantRole,
    /// Every join/leave cycle in arrival order.
    #[serde(default)]
    pub cycles: Vec<AttendanceCycle>,
    /// First time the user entered the room.
    #[serde(default)]
    pub first_join_time: Option<DateTime<Utc>>,
    /// Last time the user left the room.
    #[serde(default)]
    pub last_leave_time: Option<DateTime<Utc>>,
    /// Last client heartbeat.
    #[serde(default)]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Clipped minutes of all closed cycles.
    #[serde(default)]
    pub total_duration_minutes: i64,
    /// Scheduled session duration used for the percentage.
    #[serde(default)]
    pub session_duration_minutes: Option<i64>,
    /// Classified outcome once calculated.
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
    /// Share of the scheduled duration spent in the room.
    #[serde(default)]
    pub percentage: Decimal,
    /// Whether the final calculation ran.
    #[serde(default)]
    pub is_calculated: bool,
    /// When the final calculation ran.
    #[serde(default)]
    pub calculated_at: Option<DateTime<Utc>>,
    /// Number of joins recorded.
    #[serde(default)]
    pub join_count: u32,
    /// Number of leaves recorded.
    #[serde(default)]
    pub leave_count: u32,
}

impl MeetingAttendance {
    /// Creates an empty record for a user in a session.
    pub fn new(session_id: u64, user_id: u64, role: ParticipantRole) -> Self {
        Self {
            session_id,
            user_id,
            role,
            cycles: Vec::new(),
            first_join_time: None,
            last_leave_time: None,
            last_heartbeat_at: None,
            total_duration_minutes: 0,
            session_duration_minutes: None,
            status: None,
            percentage: Decimal::ZERO,
            is_calculated: false,
            calculated_at: None,
            join_count: 0,
            leave_count: 0,
        }
    }

    /// Returns true while the last cycle is still open.
    pub fn is_currently_in_meeting(&self) -> bool {
        self.cycles.last().is_some_and(AttendanceCycle::is_open)
    }

    /// Returns the join time of the open cycle, if the user is inside.
    pub fn open_join_time(&self) -> Option<DateTime<Utc>> {
        self.cycles
            .last()
            .filter(|cycle| cycle.is_open())
            .and_then(AttendanceCycle::join_time)
    }

    /// Records a join at `at`.
    ///
    /// Returns false without changing anything when a cycle is already open,
    /// so duplicate join webhooks are harmless. A join delivered late, with
    /// a timestamp before the last recorded leave, opens its cycle at that
    /// leave instead so cycles never overlap.
    pub fn record_join(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_currently_in_meeting() {
            return false;
        }

        let at = match self.last_leave_from_cycles() {
            Some(last_leave) if at < last_leave => last_leave,
            _ => at,
        };

        self.cycles.push(AttendanceCycle::open(at));
        self.first_join_time = Some(match self.first_join_time {
            Some(first) if first <= at => first,
            _ => at,
        });
        self.join_count += 1;
        self.last_heartbeat_at = Some(at);
        self.is_calculated = false;
        true
    }

    /// Records a leave at `at`, closing the open cycle.
    ///
    /// Returns false when no cycle is open.
    pub fn record_leave(&mut self, at: DateTime<Utc>, window: &SessionWindow) -> bool {
        let Some(last) = self.cycles.last_mut() else {
            return false;
        };

        let needs_leave_event = match last {
            AttendanceCycle::Interval {
                joined_at,
                left_at,
                duration_minutes,
                ..
            } if left_at.is_none() => {
                let leave = at.max(*joined_at);
                *left_at = Some(leave);
                *duration_minutes = Some(clipped_minutes(*joined_at, leave, window));
                false
            }
            AttendanceCycle::Event {
                kind: EventKind::Join,
                ..
            } => true,
            _ => return false,
        };

        if needs_leave_event {
            self.cycles.push(AttendanceCycle::Event {
                kind: EventKind::Leave,
                timestamp: at,
            });
        }

        self.last_leave_time = Some(at);
        self.leave_count += 1;
        self.is_calculated = false;
        self.recompute_total(window);
        true
    }

    /// Recomputes the clipped total from the cycles.
    pub fn recompute_total(&mut self, window: &SessionWindow) {
        self.total_duration_minutes = calculate_cycle_duration(&self.cycles, window);
    }

    /// Records a client heartbeat.
    pub fn update_heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat_at = Some(now);
    }

    /// Returns true if the user is inside but has not sent a heartbeat for
    /// more than `minutes`.
    pub fn has_stale_heartbeat(&self, now: DateTime<Utc>, minutes: i64) -> bool {
        if !self.is_currently_in_meeting() {
            return false;
        }
        match self.last_heartbeat_at.or_else(|| self.open_join_time()) {
            Some(last) => (now - last).num_minutes() > minutes,
            None => false,
        }
    }

    /// Returns the earliest join found in the cycles.
    pub fn first_join_from_cycles(&self) -> Option<DateTime<Utc>> {
        self.cycles.iter().filter_map(AttendanceCycle::join_time).min()
    }

    /// Returns the latest leave found in the cycles.
    pub fn last_leave_from_cycles(&self) -> Option<DateTime<Utc>> {
        self.cycles.iter().filter_map(AttendanceCycle::leave_time).max()
    }

    /// Returns the first join, preferring the stored value.
    pub fn effective_first_join(&self) -> Option<DateTime<Utc>> {
        self.first_join_time.or_else(|| self.first_join_from_cycles())
    }

    /// Marks the record absent without any presence.
    pub fn mark_absent(&mut self, now: DateTime<Utc>, session_duration_minutes: i64) {
        self.status = Some(AttendanceStatus::Absent);
        self.total_duration_minutes = 0;
        self.percentage = Decimal::ZERO;
        self.session_duration_minutes = Some(session_duration_minutes);
        self.is_calculated = true;
        self.calculated_at = Some(now);
    }
}
