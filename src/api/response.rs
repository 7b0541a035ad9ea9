//! Response types for the session engine API.
//!
//! This module defines the response bodies and the error handling for
//! the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::SessionTiming;
use crate::error::EngineError;
use crate::models::{AttendanceCycle, AttendanceStatus, ParticipantRole, SessionStatus};
use crate::tracking::IngestOutcome;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// Creates a 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

fn not_found(code: &str, error: &EngineError) -> ApiErrorResponse {
    ApiErrorResponse {
        status: StatusCode::NOT_FOUND,
        error: ApiError::new(code, error.to_string()),
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        match &error {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ApiErrorResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiError::with_details(
                        "CONFIG_ERROR",
                        "Configuration error",
                        error.to_string(),
                    ),
                }
            }
            EngineError::AcademyNotFound { .. } => not_found("ACADEMY_NOT_FOUND", &error),
            EngineError::SessionNotFound { .. } => not_found("SESSION_NOT_FOUND", &error),
            EngineError::AttendanceNotFound { .. } => not_found("ATTENDANCE_NOT_FOUND", &error),
            EngineError::SubscriptionNotFound { .. } => {
                not_found("SUBSCRIPTION_NOT_FOUND", &error)
            }
            EngineError::TeacherNotFound { .. } => not_found("TEACHER_NOT_FOUND", &error),
            EngineError::UnknownJob { .. } => not_found("UNKNOWN_JOB", &error),
            EngineError::SubscriptionExhausted { .. } => ApiErrorResponse {
                status: StatusCode::CONFLICT,
                error: ApiError::new("SUBSCRIPTION_EXHAUSTED", error.to_string()),
            },
            EngineError::InvalidTransition { reason, .. } => ApiErrorResponse {
                status: StatusCode::CONFLICT,
                error: ApiError::with_details(
                    "INVALID_TRANSITION",
                    error.to_string(),
                    reason.clone(),
                ),
            },
            EngineError::InvalidEarningState { .. } => ApiErrorResponse {
                status: StatusCode::CONFLICT,
                error: ApiError::new("INVALID_EARNING_STATE", error.to_string()),
            },
            EngineError::RateNotFound { .. } => ApiErrorResponse {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::with_details(
                    "RATE_NOT_FOUND",
                    error.to_string(),
                    "The teacher profile has no rate for this kind of session",
                ),
            },
            EngineError::InvalidEvent { .. } => ApiErrorResponse {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::new("INVALID_EVENT", error.to_string()),
            },
            EngineError::CalculationError { message } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::with_details(
                    "CALCULATION_ERROR",
                    "Calculation failed",
                    message.clone(),
                ),
            },
            EngineError::Meeting { message } => ApiErrorResponse {
                status: StatusCode::BAD_GATEWAY,
                error: ApiError::with_details(
                    "MEETING_PROVIDER_ERROR",
                    "Meeting provider failed",
                    message.clone(),
                ),
            },
            EngineError::Storage { message } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details("STORAGE_ERROR", "Storage failed", message.clone()),
            },
        }
    }
}

/// Response body for `POST /webhooks/meeting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// The ingested event id.
    pub event_id: String,
    /// What happened to it.
    pub outcome: IngestOutcome,
}

/// One attendance record with its live duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceView {
    /// Participant.
    pub user_id: u64,
    /// Participant role.
    pub role: ParticipantRole,
    /// Whether the participant is inside right now.
    pub is_currently_in_meeting: bool,
    /// Minutes attended so far, counting an open cycle.
    pub current_duration_minutes: i64,
    /// Classified status, once calculated.
    pub status: Option<AttendanceStatus>,
    /// Attendance percentage, once calculated.
    pub percentage: Decimal,
    /// Whether the final calculation ran.
    pub is_calculated: bool,
    /// The raw cycles.
    pub cycles: Vec<AttendanceCycle>,
}

/// Response body for `GET /sessions/:id/attendance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAttendanceResponse {
    /// The session.
    pub session_id: u64,
    /// Current session status.
    pub status: SessionStatus,
    /// One entry per participant.
    pub attendances: Vec<AttendanceView>,
}

/// Response body for `POST /sessions/:id/attendance/calculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResponse {
    /// The session.
    pub session_id: u64,
    /// Records calculated.
    pub records: usize,
}

/// Response body for `GET /sessions/:id/timing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingResponse {
    /// The session.
    pub session_id: u64,
    /// Current session status.
    pub status: SessionStatus,
    /// Phase and countdowns.
    pub timing: SessionTiming,
    /// Whether the teacher may enter now.
    pub teacher_can_join: bool,
    /// Whether a student may enter now.
    pub student_can_join: bool,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
    /// Crate version.
    pub version: String,
}
