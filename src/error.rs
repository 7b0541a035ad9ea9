//! Error types for the session engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while tracking sessions,
//! reconciling attendance and calculating earnings.

use thiserror::Error;

/// The main error type for the session engine.
///
/// All operations in the engine return this error type, making it easy
/// to handle errors consistently throughout the application.
///
/// # Example
///
/// ```
/// use academy_sessions::error::EngineError;
///
/// let error = EngineError::SessionNotFound { session_id: 42 };
/// assert_eq!(error.to_string(), "Session not found: 42");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The academy (tenant) does not exist.
    #[error("Academy not found: {academy_id}")]
    AcademyNotFound {
        /// The missing academy id.
        academy_id: u64,
    },

    /// The session does not exist.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The missing session id.
        session_id: u64,
    },

    /// No attendance record exists for the user in the session.
    #[error("Attendance not found for user {user_id} in session {session_id}")]
    AttendanceNotFound {
        /// The session id.
        session_id: u64,
        /// The user id.
        user_id: u64,
    },

    /// The subscription does not exist.
    #[error("Subscription not found: {subscription_id}")]
    SubscriptionNotFound {
        /// The missing subscription id.
        subscription_id: u64,
    },

    /// The subscription has no sessions left to consume.
    #[error("Subscription {subscription_id} has no remaining sessions")]
    SubscriptionExhausted {
        /// The exhausted subscription id.
        subscription_id: u64,
    },

    /// The teacher profile does not exist.
    #[error("Teacher not found: {teacher_id}")]
    TeacherNotFound {
        /// The missing teacher id.
        teacher_id: u64,
    },

    /// The teacher has no rate configured for the calculation method.
    #[error("Rate not found for teacher {teacher_id} using method '{method}'")]
    RateNotFound {
        /// The teacher id.
        teacher_id: u64,
        /// The calculation method that needed a rate.
        method: String,
    },

    /// A session status transition was not allowed.
    #[error("Invalid transition for session {session_id} from {from} to {to}: {reason}")]
    InvalidTransition {
        /// The session id.
        session_id: u64,
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
        /// Why the transition was refused.
        reason: String,
    },

    /// An earning record could not be changed in its current state.
    #[error("Invalid earning state: {message}")]
    InvalidEarningState {
        /// A description of the conflict.
        message: String,
    },

    /// A webhook event was malformed or inconsistent.
    #[error("Invalid attendance event: {message}")]
    InvalidEvent {
        /// A description of what made the event invalid.
        message: String,
    },

    /// The meeting provider failed.
    #[error("Meeting provider error: {message}")]
    Meeting {
        /// A description of the provider failure.
        message: String,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// A description of the storage failure.
        message: String,
    },

    /// No background job is registered under the given name.
    #[error("Unknown job: {name}")]
    UnknownJob {
        /// The requested job name.
        name: String,
    },

    /// A general calculation error occurred.
    #[error("Calculation error: {message}")]
    CalculationError {
        /// A description of the calculation error.
        message: String,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
