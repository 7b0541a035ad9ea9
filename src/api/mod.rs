//! HTTP API module for the session engine.
//!
//! This module provides the REST endpoints for meeting webhooks,
//! attendance, session transitions, jobs and teacher earnings.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    CalculateRequest, EarningsQuery, HeartbeatRequest, TransitionRequest, WebhookEventType,
    WebhookRequest, WindowRequest,
};
pub use response::{
    ApiError, ApiErrorResponse, AttendanceView, FinalizeResponse, HealthResponse,
    SessionAttendanceResponse, TimingResponse, WebhookResponse,
};
pub use state::AppState;
