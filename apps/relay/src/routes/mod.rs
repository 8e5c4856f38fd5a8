//! HTTP route handlers for the relay
//!
//! Everything except the WebSocket upgrade lives here:
//! - Health check and status endpoints

pub mod health;

pub use health::{health_router, HealthState};
