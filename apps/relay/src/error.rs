//! Error handling for the relay
//!
//! Errors are confined to the connection or request they arise in; none of
//! them is fatal to the process once the listener is up.

use thiserror::Error;

/// Main relay error type
#[derive(Error, Debug)]
pub enum RelayError {
    // ========== Handshake ==========
    /// The connection URL lacked the session token or participant id
    #[error("The following query parameters are required: token, userid.")]
    MissingHandshakeParams,

    // ========== Messaging ==========
    /// An inbound frame could not be decoded
    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// The session was torn down while a connection still referenced it
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A newer connection of the same participant replaced this one
    #[error("connection superseded: {0}")]
    ConnectionSuperseded(String),

    // ========== Transport ==========
    /// Certificate or key could not be loaded
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether the peer caused the error, as opposed to the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingHandshakeParams | Self::InvalidMessage(_)
        )
    }
}

impl From<crate::session::SessionError> for RelayError {
    fn from(err: crate::session::SessionError) -> Self {
        match err {
            crate::session::SessionError::SessionNotFound(token) => Self::SessionNotFound(token),
            crate::session::SessionError::ConnectionSuperseded(participant_id) => {
                Self::ConnectionSuperseded(participant_id)
            }
            crate::session::SessionError::Serialization(e) => Self::InvalidMessage(e),
        }
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
