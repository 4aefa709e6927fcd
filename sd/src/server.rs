//! HTTP API
//!
//! Thin axum layer over the orchestrator and session service. Every
//! response uses a `{success, ...}` envelope; failures carry an `error`
//! string instead of a bare status code so thin clients can render them
//! directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::StudyPlan;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::orchestrator::{Orchestrator, TurnError};
use crate::session::SessionService;
use crate::tools::ToolResult;

/// Shared state for all handlers
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionService>,
    pub metrics: Arc<Metrics>,
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/sessions", post(create_session).get(list_sessions))
        .route("/api/sessions/:id/history", get(session_history))
        .route("/api/health", get(health))
        .route("/api/metrics", get(metrics))
        .with_state(state)
}

/// Bind and serve until the process exits
pub async fn serve(state: Arc<AppState>, bind: &str) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("HTTP API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    /// Omitted on the first turn; the server creates a session then
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    success: bool,
    session_id: String,
    response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    study_plan: Option<StudyPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_result: Option<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct FailureResponse {
    success: bool,
    error: String,
}

fn failure(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<FailureResponse>) {
    (
        status,
        Json(FailureResponse {
            success: false,
            error: error.into(),
        }),
    )
}

/// POST /api/chat - submit one turn
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<FailureResponse>)> {
    let session_id = match request.session_id {
        Some(id) => id,
        None => state
            .sessions
            .create()
            .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
    };

    match state.orchestrator.handle_turn(&session_id, &request.message).await {
        Ok(outcome) => Ok(Json(ChatResponse {
            success: true,
            session_id,
            response: outcome.response,
            study_plan: outcome.study_plan,
            execution_result: outcome.execution_result,
            error: None,
        })),
        Err(e @ TurnError::SessionNotFound { .. }) => Err(failure(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ TurnError::EmptyMessage) => Err(failure(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            error!(error = %e, "chat: turn failed");
            state.metrics.record_turn_failure();
            Err(failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    success: bool,
    session_id: String,
}

/// POST /api/sessions - create a new session
async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CreateSessionResponse>, (StatusCode, Json<FailureResponse>)> {
    let session_id = state
        .sessions
        .create()
        .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(CreateSessionResponse {
        success: true,
        session_id,
    }))
}

#[derive(Debug, Serialize)]
struct SessionsResponse {
    success: bool,
    sessions: Vec<SessionEntry>,
}

#[derive(Debug, Serialize)]
struct SessionEntry {
    session_id: String,
    first_message: String,
}

/// GET /api/sessions - list sessions for the history sidebar
async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionsResponse>, (StatusCode, Json<FailureResponse>)> {
    let summaries = state
        .sessions
        .list_summaries()
        .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(SessionsResponse {
        success: true,
        sessions: summaries
            .into_iter()
            .map(|s| SessionEntry {
                session_id: s.session_id,
                first_message: s.first_message,
            })
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    success: bool,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    role: String,
    content: String,
}

/// GET /api/sessions/{id}/history - ordered messages for a session
async fn session_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<FailureResponse>)> {
    let messages = state.sessions.history(&session_id).map_err(|e| match e {
        sessionstore::StoreError::NotFound { .. } => failure(StatusCode::NOT_FOUND, e.to_string()),
        _ => failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    })?;

    Ok(Json(HistoryResponse {
        success: true,
        history: messages
            .into_iter()
            .map(|m| HistoryEntry {
                role: m.role.to_string(),
                content: m.content,
            })
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    success: bool,
}

/// GET /api/health - liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { success: true })
}

#[derive(Debug, Serialize)]
struct MetricsResponse {
    success: bool,
    metrics: MetricsSnapshot,
}

/// GET /api/metrics - counter snapshot
async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        success: true,
        metrics: state.metrics.snapshot(),
    })
}
