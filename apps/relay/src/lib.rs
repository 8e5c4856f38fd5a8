//! Playsync relay library
//!
//! Keeps the participants of a viewing session in step: one participant
//! drives playback, the relay samples the driver's playhead and fans the
//! shared manifest out to everyone else.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod session;
pub mod websocket;

use axum::{extract::Extension, routing::get, Router};
use playsync_shared_config::TimingConfig;

// Re-export commonly used types
pub use error::{RelayError, RelayResult};
pub use session::{Manifest, SessionManager};
pub use websocket::ServerMessage;

use routes::{health_router, HealthState};
use websocket::{root_handler, ws_handler};

/// Build the relay's routes: the WebSocket endpoint, the greeting and health
pub fn build_router(sessions: SessionManager, timing: TimingConfig) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
        // Nested health routes: /health, /health/live
        .nest("/health", health_router(HealthState::new(sessions.clone())))
        .layer(Extension(sessions))
        .layer(Extension(timing))
}
