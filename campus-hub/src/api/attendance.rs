//! Attendance session endpoints: open, status, verify
//!
//! Request/response bodies use the camelCase field names the dashboards
//! already send. Rejections are 200 responses with `accepted: false` and a
//! reason; only malformed input is a client error.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use campus_common::session::{RedemptionOutcome, SessionScope};

use crate::{attendance, AppState};

/// POST /api/attendance/session request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub faculty_id: String,
    pub year: String,
    pub section: String,
    pub branch: String,
    pub subject: String,
    #[serde(default = "default_period")]
    pub period: u32,
    /// Window length; the server default applies when omitted
    pub ttl_seconds: Option<u64>,
}

fn default_period() -> u32 {
    1
}

/// POST /api/attendance/session response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub code: String,
    pub ttl_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/attendance/session
///
/// Opens an attendance window for the given scope, superseding any window
/// already open for an equal scope, and announces it on the event stream.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), (StatusCode, Json<serde_json::Value>)> {
    let scope = SessionScope::normalized(
        &req.faculty_id,
        &req.year,
        &req.section,
        &req.branch,
        &req.subject,
        req.period,
    );
    let ttl = req.ttl_seconds.unwrap_or(state.config.default_ttl_secs);

    let token = state.sessions.create_token(scope, ttl).map_err(|e| {
        error!("Failed to open attendance window: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    state
        .hub
        .publish(&crate::session::SessionService::opened_event(&token));

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            code: token.code,
            ttl_seconds: token.ttl_seconds,
            expires_at: token.expires_at,
        }),
    ))
}

/// GET /api/attendance/session/:code response body
///
/// Drives the issuing dashboard's countdown ring and live join counter.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    pub join_count: u64,
}

/// GET /api/attendance/session/:code
///
/// Authoritative status for a code. Unknown and expired codes answer
/// `valid: false`, never an error: the client countdown is advisory and
/// reconciles to this.
pub async fn session_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Json<SessionStatusResponse> {
    let status = state.sessions.status(&code);
    Json(SessionStatusResponse {
        valid: status.valid,
        remaining_seconds: status.remaining_seconds,
        join_count: state.sessions.join_count(&code),
    })
}

/// POST /api/attendance/verify request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub code: String,
    pub redeemer_id: String,
}

/// POST /api/attendance/verify
///
/// Redeems a code for one student. Both acceptance and rejection are 200
/// responses; the caller branches on `accepted`/`reason`.
pub async fn verify_session(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Json<RedemptionOutcome> {
    let outcome = attendance::redeem(&state.sessions, &state.hub, &req.code, &req.redeemer_id);
    Json(outcome)
}
