//! Localhost REST API for session metadata and daemon status.
//!
//! Consumed by the operator UI and by curl during bench setup. Binds to
//! loopback only; there is no auth layer.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::adapters::acquisition::RecordingState;
use crate::error::{Result, ShepherdError};
use crate::session::SessionManager;

/// State shared between the daemon loop and the API handlers
pub struct ApiState {
    pub manager: RwLock<SessionManager>,
    pub acquisition_connected: AtomicBool,
    pub recording_state: RwLock<RecordingState>,
    pub recorder_reachable: AtomicBool,
    /// Operators allowed in metadata; empty disables the check
    pub operators: Vec<String>,
}

impl ApiState {
    pub fn new(manager: SessionManager, operators: Vec<String>) -> Self {
        Self {
            manager: RwLock::new(manager),
            acquisition_connected: AtomicBool::new(false),
            recording_state: RwLock::new(RecordingState::Unknown),
            recorder_reachable: AtomicBool::new(false),
            operators,
        }
    }
}

pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route(
            "/api/session/metadata",
            post(set_metadata).delete(clear_metadata),
        )
        .route("/api/session/current", get(get_current_session))
        .route("/api/session/history", get(get_session_history))
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// Serve the API until the process exits
pub async fn serve(state: Arc<ApiState>, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| ShepherdError::Validation(format!("bad API address: {e}")))?;

    let app = build_router(state);
    info!("API server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ShepherdError::Internal(format!("API server error: {e}")))?;
    Ok(())
}

async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let manager = state.manager.read().await;
    let recording_state = *state.recording_state.read().await;

    let session = manager.active_session().map(|s| {
        json!({
            "session_id": s.session_id,
            "subject_id": s.subject_id,
            "recording_type": s.recording_type,
            "chamber": s.chamber,
            "camera": s.camera,
            "start_time_local": s.start_time_local,
        })
    });

    let pending = manager.pending_metadata();

    Json(json!({
        "daemon": "running",
        "acquisition": {
            "connected": state.acquisition_connected.load(Ordering::SeqCst),
            "recording_state": recording_state.to_string(),
        },
        "recorder": {
            "reachable": state.recorder_reachable.load(Ordering::SeqCst),
        },
        "session": session,
        "pending_metadata": {
            "subject_id": pending.subject_id,
            "recording_type": pending.recording_type,
            "operator": pending.operator,
            "chamber": pending.chamber,
            "is_default": pending.is_default(),
        },
    }))
}

#[derive(Debug, Deserialize)]
struct MetadataPatch {
    subject_id: Option<String>,
    recording_type: Option<String>,
    operator: Option<String>,
    chamber: Option<u32>,
}

async fn set_metadata(
    State(state): State<Arc<ApiState>>,
    Json(patch): Json<MetadataPatch>,
) -> impl IntoResponse {
    let mut manager = state.manager.write().await;

    if let Some(chamber) = patch.chamber {
        if manager.camera_for_chamber(chamber).is_none() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("no camera configured for chamber {chamber}"),
                })),
            );
        }
    }

    if let Some(operator) = &patch.operator {
        if !state.operators.is_empty() && !state.operators.contains(operator) {
            // Warn only: bench reality beats the roster.
            warn!(operator = %operator, "operator not in configured roster");
        }
    }

    let updated = manager.set_metadata(
        patch.subject_id,
        patch.recording_type,
        patch.operator,
        patch.chamber,
    );

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "metadata": {
                "subject_id": updated.subject_id,
                "recording_type": updated.recording_type,
                "operator": updated.operator,
                "chamber": updated.chamber,
                "is_default": updated.is_default(),
            },
        })),
    )
}

async fn clear_metadata(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.manager.write().await.clear_metadata();
    Json(json!({ "status": "ok", "message": "metadata cleared to defaults" }))
}

async fn get_current_session(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let manager = state.manager.read().await;
    match manager.active_session() {
        Some(session) => Json(json!({ "session": session })),
        None => Json(json!({ "session": null })),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn get_session_history(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let manager = state.manager.read().await;
    let history = manager.history();

    // Newest first
    let recent: Vec<_> = history.iter().rev().take(limit).collect();

    Json(json!({
        "count": recent.len(),
        "total": history.len(),
        "sessions": recent,
    }))
}

async fn health_check(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let acquisition_ok = state.acquisition_connected.load(Ordering::SeqCst);
    let recorder_ok = state.recorder_reachable.load(Ordering::SeqCst);
    let healthy = acquisition_ok && recorder_ok;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "healthy": healthy,
            "acquisition_connected": acquisition_ok,
            "recorder_reachable": recorder_ok,
        })),
    )
}
