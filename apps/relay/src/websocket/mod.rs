//! WebSocket transport
//!
//! Upgrades incoming connections, joins them to their session and pumps
//! frames between the socket and the session's message router.

pub mod handler;
pub mod heartbeat;
pub mod messages;

pub use handler::{root_handler, ws_handler, HandshakeParams};
pub use heartbeat::Liveness;
pub use messages::{ClientEnvelope, ClientMessage, ServerMessage};
