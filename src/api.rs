//! Operator HTTP facade
//!
//! Read-only view of the running bot: liveness, session and catalog counts,
//! and the payments held for manual handling.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::audit::InterventionLog;
use crate::directory::AssetDirectory;
use crate::state::SessionStore;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
                timestamp: Utc::now().to_rfc3339(),
            },
            Err(e) => Self::error(format!("response encoding failed: {}", e)),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub bot_id: Uuid,
    pub sessions: Arc<dyn SessionStore>,
    pub directory: Arc<AssetDirectory>,
    pub interventions: Arc<InterventionLog>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct Status {
    bot_id: Uuid,
    started_at: DateTime<Utc>,
    uptime_secs: i64,
    sessions: usize,
    assets: usize,
    interventions: usize,
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let now = Utc::now();
    let status = Status {
        bot_id: state.bot_id,
        started_at: state.started_at,
        uptime_secs: (now - state.started_at).num_seconds(),
        sessions: state.sessions.len().await,
        assets: state.directory.len(),
        interventions: state.interventions.len().await,
    };

    (StatusCode::OK, Json(ApiResponse::success(status)))
}

async fn interventions(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let held = state.interventions.list().await;
    (StatusCode::OK, Json(ApiResponse::success(held)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/hc", get(health))
        .route("/api/status", get(status))
        .route("/api/interventions", get(interventions))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!(port, "API server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
