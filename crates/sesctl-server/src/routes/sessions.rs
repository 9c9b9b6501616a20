//! Session lifecycle routes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use sesctl_core::{DurationParts, Error, LoginInput, SessionSnapshot, TouchInput};

use crate::state::AppState;

/// Create session router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/update", put(update))
        .route("/status", get(status))
        .route("/sessions", get(list_active).delete(delete_all))
        .route("/session-log", get(list_all))
}

/// Core error mapped onto an HTTP response.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::SessionExists(_) => StatusCode::CONFLICT,
            e if e.is_corrupt_record() => StatusCode::INTERNAL_SERVER_ERROR,
            e if e.is_storage_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPayload {
    pub ip: String,
    pub mac_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub session_id: String,
    pub email: String,
    pub nickname: String,
    pub client: EndpointPayload,
    pub server: EndpointPayload,
    pub status: String,
    pub created_at: String,
    pub last_accessed: String,
    pub connection_time: DurationParts,
    pub inactivity_time: DurationParts,
}

impl SessionPayload {
    fn from_snapshot(snapshot: SessionSnapshot, state: &AppState) -> Self {
        let clock = state.engine.clock();
        let record = snapshot.record;
        Self {
            session_id: record.session_id,
            email: record.email,
            nickname: record.nickname,
            client: EndpointPayload {
                ip: record.client.ip,
                mac_address: record.client.mac_address,
            },
            server: EndpointPayload {
                ip: record.server.ip,
                mac_address: record.server.mac_address,
            },
            status: record.status.as_str().to_string(),
            created_at: clock.format(record.created_at),
            last_accessed: clock.format(record.last_accessed),
            connection_time: snapshot.connection,
            inactivity_time: snapshot.inactivity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub mac_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub session_id: String,
}

/// Create a session
pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let session_id = state.engine.login(LoginInput {
        email: req.email,
        nickname: req.nickname,
        mac_address: req.mac_address,
        client_ip: peer.ip().to_string(),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            session_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Terminate a session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = required_id(req.session_id)?;
    state.engine.logout(&session_id)?;
    Ok(Json(MessageResponse {
        message: "Logout successful".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub session_id: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    /// Explicit refresh instant in the canonical timestamp form.
    pub last_accessed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub session: SessionPayload,
}

/// Refresh a session, optionally updating identity fields
pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = required_id(req.session_id)?;
    let last_accessed = req
        .last_accessed
        .map(|text| state.engine.clock().parse(&text))
        .transpose()?;

    let snapshot = state.engine.touch(
        &session_id,
        TouchInput {
            email: req.email,
            nickname: req.nickname,
            last_accessed,
        },
    )?;

    Ok(Json(SessionResponse {
        message: "Session updated".to_string(),
        session: SessionPayload::from_snapshot(snapshot, &state),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub session_id: Option<String>,
}

/// Session status with computed durations; never refreshes liveness
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = required_id(params.session_id)?;
    let snapshot = state.queries.get(&session_id)?;
    Ok(Json(SessionResponse {
        message: "Session status".to_string(),
        session: SessionPayload::from_snapshot(snapshot, &state),
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub message: String,
    pub sessions: Vec<SessionPayload>,
}

/// Only active sessions
pub async fn list_active(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let snapshots = state.queries.list_active()?;
    Ok(Json(SessionListResponse {
        message: "Active sessions".to_string(),
        sessions: to_payloads(snapshots, &state),
    }))
}

/// Every session, regardless of status
pub async fn list_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let snapshots = state.queries.list_all()?;
    Ok(Json(SessionListResponse {
        message: "Session log".to_string(),
        sessions: to_payloads(snapshots, &state),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub message: String,
    pub deleted_count: usize,
}

/// Administrative reset
pub async fn delete_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    let deleted_count = state.engine.delete_all()?;
    Ok(Json(DeleteAllResponse {
        message: "All sessions deleted".to_string(),
        deleted_count,
    }))
}

fn required_id(session_id: Option<String>) -> Result<String, ApiError> {
    match session_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError(Error::MissingField("sessionId"))),
    }
}

fn to_payloads(snapshots: Vec<SessionSnapshot>, state: &AppState) -> Vec<SessionPayload> {
    snapshots
        .into_iter()
        .map(|s| SessionPayload::from_snapshot(s, state))
        .collect()
}
