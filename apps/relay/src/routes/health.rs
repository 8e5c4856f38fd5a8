//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Liveness probe with session counters

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::session::SessionManager;

/// Shared application state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    /// Live sessions, for the counters in the liveness body
    pub sessions: SessionManager,
}

impl HealthState {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

/// Liveness probe body
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
    pub connections: usize,
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
        .with_state(state)
}

/// Simple health check - always returns OK if the server is running
///
/// # Response
/// - 200 OK with body "OK"
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness probe
///
/// Returns 200 while the process can handle requests, along with how many
/// sessions and connections it is currently relaying.
async fn liveness_probe(State(state): State<HealthState>) -> impl IntoResponse {
    Json(LivenessResponse {
        status: "alive",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.total_sessions(),
        connections: state.sessions.total_connections(),
    })
}
