use super::state::{AppState, SessionInfo};
use crate::cache::CacheStats;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub session_id: String,
    pub accumulated_seconds: f64,
    pub active: bool,
    pub limit_seconds: f64,
    pub limit_exceeded: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub status: String,
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / and GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            service: state.config.service.name.clone(),
        }),
    )
}

/// GET /cache/stats
/// Translation cache statistics
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.services.cache.stats())
}

/// POST /cache/clear
/// Drop every cached translation
pub async fn cache_clear(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.services.cache.len();
    state.services.cache.clear();
    info!("Translation cache cleared ({} entries)", cleared);

    (
        StatusCode::OK,
        Json(CacheClearResponse {
            status: "cleared".to_string(),
            cleared,
        }),
    )
}

/// GET /usage/:session_id
/// Accumulated usage for a session id, including ended sessions
pub async fn get_usage(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let limit = state.config.usage.limit_seconds;

    match state.services.usage.snapshot(&session_id) {
        Some(snapshot) => (
            StatusCode::OK,
            Json(UsageResponse {
                session_id,
                accumulated_seconds: snapshot.accumulated_seconds,
                active: snapshot.active,
                limit_seconds: limit,
                limit_exceeded: snapshot.accumulated_seconds >= limit,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /sessions
/// Currently connected sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    let sessions = state.sessions.read().await;
    let mut list: Vec<SessionInfo> = sessions.values().cloned().collect();
    list.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    Json(list)
}
