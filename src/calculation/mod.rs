//! Calculation logic for the session engine.
//!
//! This module contains the pure calculations the engine is built on:
//! clipping join/leave cycles to the session window, classifying the
//! resulting attendance, measuring live durations, closing stale cycles,
//! placing a session in its timing phase, deciding who may join, and
//! pricing a finished session for its teacher.

mod attendance;
mod attendance_status;
mod cycle_duration;
mod earnings;
mod live_duration;
mod session_timing;

pub use attendance::{AttendanceCalculation, calculate_attendance};
pub use attendance_status::{AttendanceRules, attendance_percentage, determine_attendance_status};
pub use cycle_duration::{calculate_cycle_duration, clipped_minutes};
pub use earnings::{EarningCalculation, calculate_session_earning};
pub use live_duration::{auto_close_stale_cycles, current_duration};
pub use session_timing::{
    SessionPhase, SessionTiming, can_join, can_join_window, room_empty_timeout_secs,
    room_max_duration_secs, session_timing,
};
