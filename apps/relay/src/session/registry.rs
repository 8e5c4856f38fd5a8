//! Connection registry
//!
//! Tracks the live connections of one session in join order. The order
//! matters: when the driver leaves, the earliest remaining connection takes
//! over.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::messages::ServerMessage;

/// Server-generated identifier of a single connection
pub type ConnectionId = Uuid;

/// Handle for sending messages to a specific WebSocket connection
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,

    /// Channel feeding the connection's writer task
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for this connection
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.send(msg).map_err(|_| SendError::ConnectionClosed)
    }
}

/// One participant's connection within a session
#[derive(Debug)]
pub struct ConnectionEntry {
    pub participant_id: String,
    pub handle: ConnectionHandle,
}

/// Ordered list of a session's connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Vec<ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a connection.
    ///
    /// A participant id is unique within a session: an existing connection
    /// for the same participant is evicted and returned so the caller can
    /// notify it. The new connection always goes to the back of the list.
    pub fn join(
        &mut self,
        participant_id: &str,
        handle: ConnectionHandle,
    ) -> Option<ConnectionEntry> {
        let displaced = self
            .entries
            .iter()
            .position(|e| e.participant_id == participant_id)
            .map(|i| self.entries.remove(i));

        self.entries.push(ConnectionEntry {
            participant_id: participant_id.to_string(),
            handle,
        });

        displaced
    }

    /// Remove the connection with the given participant and connection id.
    ///
    /// Returns the number of remaining connections, or `None` when no such
    /// connection is registered (for example after it was displaced).
    pub fn leave(&mut self, participant_id: &str, connection_id: ConnectionId) -> Option<usize> {
        let index = self
            .entries
            .iter()
            .position(|e| e.participant_id == participant_id && e.handle.id() == connection_id)?;
        self.entries.remove(index);
        Some(self.entries.len())
    }

    /// All connections except the one belonging to `exclude_id`
    pub fn broadcast_targets<'a>(
        &'a self,
        exclude_id: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ConnectionEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| exclude_id != Some(e.participant_id.as_str()))
    }

    /// Find the connection of a participant
    pub fn find(&self, participant_id: &str) -> Option<&ConnectionEntry> {
        self.entries
            .iter()
            .find(|e| e.participant_id == participant_id)
    }

    /// Find a connection by its id
    pub fn find_connection(&self, connection_id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.iter().find(|e| e.handle.id() == connection_id)
    }

    /// Participant ids in join order
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.participant_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Error type for send operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("session not found")]
    SessionNotFound,

    #[error("connection not found")]
    ConnectionNotFound,

    #[error("connection closed")]
    ConnectionClosed,
}
