//! HTTP request handlers for the session engine API.
//!
//! This module contains the handler functions for all API endpoints.

use std::str::FromStr;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{
    AttendanceRules, calculate_attendance, can_join, current_duration, session_timing,
};
use crate::error::EngineResult;
use crate::jobs::{JobKind, earnings_summary, run_job};
use crate::lifecycle::apply_transition;
use crate::models::{ParticipantRole, SessionWindow};
use crate::reconciliation::finalize_session_attendance;
use crate::tracking::{ingest_event, record_heartbeat};

use super::request::{
    CalculateRequest, EarningsQuery, HeartbeatRequest, TransitionRequest, WebhookRequest,
};
use super::response::{
    ApiError, ApiErrorResponse, AttendanceView, FinalizeResponse, HealthResponse,
    SessionAttendanceResponse, TimingResponse, WebhookResponse,
};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/calculate", post(calculate_handler))
        .route("/webhooks/meeting", post(webhook_handler))
        .route("/sessions/:id/heartbeat", post(heartbeat_handler))
        .route("/sessions/:id/attendance", get(attendance_handler))
        .route(
            "/sessions/:id/attendance/calculate",
            post(finalize_attendance_handler),
        )
        .route("/sessions/:id/timing", get(timing_handler))
        .route("/sessions/:id/transitions", post(transition_handler))
        .route("/jobs/:name/run", post(run_job_handler))
        .route("/teachers/:id/earnings", get(earnings_handler))
        .with_state(state)
}

/// Unwraps a JSON body or builds the 400 response for it.
fn parse_json<T>(
    correlation_id: Uuid,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, Response> {
    let rejection = match payload {
        Ok(Json(req)) => return Ok(req),
        Err(rejection) => rejection,
    };

    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            // The body text carries serde's detailed message
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") || body_text.contains("unknown variant") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };

    Err(ApiErrorResponse::bad_request(error).into_response())
}

/// Turns an engine result into a JSON response, logging failures.
fn respond<T: Serialize>(correlation_id: Uuid, action: &str, result: EngineResult<T>) -> Response {
    match result {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            Json(body),
        )
            .into_response(),
        Err(err) => {
            warn!(
                correlation_id = %correlation_id,
                action,
                error = %err,
                "Request failed"
            );
            let api_error: ApiErrorResponse = err.into();
            (
                api_error.status,
                [(header::CONTENT_TYPE, "application/json")],
                Json(api_error.error),
            )
                .into_response()
        }
    }
}

/// Handler for GET /health.
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for POST /calculate.
///
/// Runs the attendance calculation over a posted window and cycles
/// without touching storage.
async fn calculate_handler(
    State(state): State<AppState>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing calculation request");

    let request = match parse_json(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let window: SessionWindow = request.window.into();
    if window.end <= window.start {
        warn!(correlation_id = %correlation_id, "Session window ends before it starts");
        return ApiErrorResponse::bad_request(ApiError::validation_error(
            "window.end must be after window.start",
        ))
        .into_response();
    }

    let engine = state.engine();
    let rules = match request.academy_id {
        Some(academy_id) => engine.attendance_rules(academy_id),
        None => AttendanceRules::from_settings(engine.config().attendance()),
    };

    let start_time = Instant::now();
    let result = calculate_attendance(&request.to_attendance(), &window, &rules);
    info!(
        correlation_id = %correlation_id,
        cycles = request.cycles.len(),
        status = %result.status,
        total_minutes = result.total_minutes,
        duration_us = start_time.elapsed().as_micros(),
        "Calculation completed successfully"
    );

    respond(correlation_id, "calculate", Ok(result))
}

/// Handler for POST /webhooks/meeting.
async fn webhook_handler(
    State(state): State<AppState>,
    payload: Result<Json<WebhookRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match parse_json(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        correlation_id = %correlation_id,
        event_id = %request.event_id,
        session_id = request.session_id,
        user_id = request.user_id,
        event = ?request.event,
        "Received meeting webhook"
    );

    let event = request.into_event(state.now());
    let event_id = event.id.clone();
    let result = ingest_event(state.engine(), event, state.now())
        .map(|outcome| WebhookResponse { event_id, outcome });

    respond(correlation_id, "webhook", result)
}

/// Handler for POST /sessions/:id/heartbeat.
async fn heartbeat_handler(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match parse_json(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let result = record_heartbeat(state.engine(), session_id, request.user_id, state.now());
    respond(correlation_id, "heartbeat", result)
}

/// Handler for GET /sessions/:id/attendance.
///
/// Reports every participant with the minutes attended so far.
async fn attendance_handler(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let engine = state.engine();
    let now = state.now();

    let result = engine.session(session_id).and_then(|session| {
        let window = session.window();
        let post_grace = engine.config().attendance().post_session_grace_minutes;
        let attendances = engine
            .store()
            .list_attendances(session_id)?
            .into_iter()
            .map(|attendance| AttendanceView {
                user_id: attendance.user_id,
                role: attendance.role,
                is_currently_in_meeting: attendance.is_currently_in_meeting(),
                current_duration_minutes: current_duration(&attendance, &window, now, post_grace),
                status: attendance.status,
                percentage: attendance.percentage,
                is_calculated: attendance.is_calculated,
                cycles: attendance.cycles,
            })
            .collect();

        Ok(SessionAttendanceResponse {
            session_id,
            status: session.status,
            attendances,
        })
    });

    respond(correlation_id, "attendance", result)
}

/// Handler for POST /sessions/:id/attendance/calculate.
async fn finalize_attendance_handler(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, session_id, "Finalizing attendance");

    let engine = state.engine();
    let result = engine.session(session_id).and_then(|session| {
        let records = finalize_session_attendance(engine, &session, state.now())?;
        Ok(FinalizeResponse {
            session_id,
            records,
        })
    });

    respond(correlation_id, "finalize_attendance", result)
}

/// Handler for GET /sessions/:id/timing.
async fn timing_handler(State(state): State<AppState>, Path(session_id): Path<u64>) -> Response {
    let correlation_id = Uuid::new_v4();
    let engine = state.engine();
    let now = state.now();

    let result = engine.session(session_id).map(|session| {
        let settings = engine.config().academy_settings(session.academy_id);
        let meeting = engine.config().meeting();
        TimingResponse {
            session_id,
            status: session.status,
            timing: session_timing(&session, &settings, now),
            teacher_can_join: can_join(&session, ParticipantRole::Teacher, now, meeting),
            student_can_join: can_join(&session, ParticipantRole::Student, now, meeting),
        }
    });

    respond(correlation_id, "timing", result)
}

/// Handler for POST /sessions/:id/transitions.
async fn transition_handler(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let request = match parse_json(correlation_id, payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        correlation_id = %correlation_id,
        session_id,
        action = ?request.action,
        actor_id = ?request.actor_id,
        "Applying session transition"
    );

    let result = apply_transition(
        state.engine(),
        session_id,
        request.action,
        request.reason,
        request.actor_id,
        state.now(),
    );
    respond(correlation_id, "transition", result)
}

/// Handler for POST /jobs/:name/run.
async fn run_job_handler(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, job = %name, "Running job on demand");

    let result =
        JobKind::from_str(&name).and_then(|kind| run_job(state.engine(), kind, state.now()));
    respond(correlation_id, "run_job", result)
}

/// Handler for GET /teachers/:id/earnings?month=YYYY-MM.
async fn earnings_handler(
    State(state): State<AppState>,
    Path(teacher_id): Path<u64>,
    query: Result<Query<EarningsQuery>, QueryRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            warn!(correlation_id = %correlation_id, error = %rejection, "Bad earnings query");
            return ApiErrorResponse::bad_request(ApiError::validation_error(
                rejection.body_text(),
            ))
            .into_response();
        }
    };

    let result = earnings_summary(state.engine(), teacher_id, &query.month);
    respond(correlation_id, "earnings", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::AttendanceCalculation;
    use crate::config::ConfigLoader;
    use crate::engine::Engine;
    use crate::models::{Academy, AttendanceStatus, Session, SessionKind, SessionType};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use tower::ServiceExt;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T08:55:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn create_test_state() -> AppState {
        let engine = Engine::in_memory(ConfigLoader::load("./config/default").unwrap());
        engine
            .store()
            .save_academy(Academy::new(1, "Noor", "noor"))
            .unwrap();
        engine
            .store()
            .save_session(Session::new(
                1,
                1,
                SessionKind::Quran,
                SessionType::Group,
                10,
                DateTime::parse_from_rfc3339("2026-01-15T09:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
                60,
            ))
            .unwrap();
        AppState::with_clock(engine, fixed_now)
    }

    async fn send(request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = create_router(create_test_state())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) =
            send(Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn test_calculate_late_join() {
        let body = r#"{
            "window": {"start": "2026-01-15T09:00:00Z", "end": "2026-01-15T10:00:00Z"},
            "cycles": [
                {"joined_at": "2026-01-15T09:20:00Z", "left_at": "2026-01-15T10:00:00Z"}
            ]
        }"#;
        let (status, body) = send(post_json("/calculate", body)).await;

        assert_eq!(status, StatusCode::OK);
        let result: AttendanceCalculation = serde_json::from_slice(&body).unwrap();
        assert_eq!(result.total_minutes, 40);
        assert_eq!(result.status, AttendanceStatus::Late);
        assert_eq!(result.audit_steps.len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let (status, body) = send(post_json("/calculate", "{invalid json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_missing_window_returns_validation_error() {
        let (status, body) = send(post_json("/calculate", r#"{"cycles": []}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.contains("missing field"));
    }

    #[tokio::test]
    async fn test_inverted_window_returns_validation_error() {
        let body = r#"{
            "window": {"start": "2026-01-15T10:00:00Z", "end": "2026-01-15T09:00:00Z"}
        }"#;
        let (status, body) = send(post_json("/calculate", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_timing_uses_fixed_clock() {
        let (status, body) = send(
            Request::builder()
                .uri("/sessions/1/timing")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let timing: TimingResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(timing.timing.minutes_until_start, Some(5));
        assert!(timing.teacher_can_join);
        assert!(timing.student_can_join);
    }

    #[tokio::test]
    async fn test_unknown_session_returns_404() {
        let (status, body) = send(
            Request::builder()
                .uri("/sessions/99/attendance")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_job_returns_404() {
        let (status, body) = send(post_json("/jobs/send_newsletter/run", "")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "UNKNOWN_JOB");
    }

    #[tokio::test]
    async fn test_earnings_without_month_returns_400() {
        let (status, body) = send(
            Request::builder()
                .uri("/teachers/10/earnings")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
    }
}
