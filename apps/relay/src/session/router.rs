//! Message routing
//!
//! Interprets inbound client messages for one connection, mutates the
//! session's manifest and driver election, and fans the result out.
//!
//! Any `play`, `time` or `select` from a participant who is not the driver
//! promotes that participant to driver and controller: whoever issues a
//! state-changing command becomes the source of truth. `control` is the
//! explicit handoff and is guarded by the session's exclusive driver lock.

use serde_json::Value;

use super::manifest::{driver_id_of, Manifest};
use super::registry::ConnectionId;
use super::state::SessionState;
use super::SessionManager;
use crate::websocket::messages::{
    ClientEnvelope, ClientMessage, DriverUpdatePayload, RequestKind, ServerMessage,
};

/// What happened to an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The manifest changed and was broadcast
    Applied,
    /// The message was valid but had no effect
    Ignored,
    /// A driver claim was refused because the lock is held
    Rejected,
}

/// Handles messages arriving on a single connection
#[derive(Debug, Clone)]
pub struct MessageRouter {
    token: String,
    participant_id: String,
    connection_id: ConnectionId,
    sessions: SessionManager,
}

impl MessageRouter {
    pub fn new(
        token: String,
        participant_id: String,
        connection_id: ConnectionId,
        sessions: SessionManager,
    ) -> Self {
        Self {
            token,
            participant_id,
            connection_id,
            sessions,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Decode and handle a raw frame.
    ///
    /// Undecodable frames are answered with an error to this connection only
    /// and never affect the session.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<Outcome, SessionError> {
        let envelope: ClientEnvelope = match serde_json::from_slice(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(
                    token = %self.token,
                    participant_id = %self.participant_id,
                    error = %e,
                    "Failed to parse client message"
                );
                self.send_to_self(ServerMessage::error(format!("Invalid message: {}", e)));
                return Err(SessionError::Serialization(e));
            }
        };
        self.handle_message(envelope)
    }

    /// Handle an incoming client message
    pub fn handle_message(&self, envelope: ClientEnvelope) -> Result<Outcome, SessionError> {
        tracing::debug!(
            token = %self.token,
            participant_id = %self.participant_id,
            message = ?envelope,
            "Received"
        );

        if let ClientMessage::Unknown = envelope.message {
            tracing::info!(
                token = %self.token,
                participant_id = %self.participant_id,
                "Unhandled manifest change, ignoring"
            );
            return Ok(Outcome::Ignored);
        }

        self.sessions
            .with_session(&self.token, |state| {
                // A reconnect may have displaced this connection already.
                if state.registry.find_connection(self.connection_id).is_none() {
                    tracing::debug!(
                        token = %self.token,
                        participant_id = %self.participant_id,
                        connection_id = %self.connection_id,
                        "Dropping message from superseded connection"
                    );
                    return Err(SessionError::ConnectionSuperseded(self.participant_id.clone()));
                }
                Ok(self.apply(state, envelope))
            })
            .unwrap_or_else(|| Err(SessionError::SessionNotFound(self.token.clone())))
    }

    /// Apply one message while holding the session exclusively
    fn apply(&self, state: &mut SessionState, envelope: ClientEnvelope) -> Outcome {
        let token = self.token.as_str();
        let sender = self.participant_id.as_str();
        let is_driver = state.driver.is_driver(sender);

        let mut manifest = state.manifests.get_or_create();
        if let Some(at_time) = envelope.at_time {
            manifest.current_time = at_time;
        }

        let mut prompt_driver = false;

        match envelope.message {
            ClientMessage::Play { value } => {
                manifest.is_playing = value;
                if !is_driver {
                    self.promote(state, &mut manifest);
                }
                if value {
                    self.sessions.arm_sampler(token, state);
                } else {
                    state.stop_sampling();
                }
            }
            ClientMessage::Time { value } => {
                manifest.current_time = value;
                if !is_driver {
                    self.promote(state, &mut manifest);
                }
            }
            ClientMessage::Select { value } => {
                manifest.selected_item = value;
                if !is_driver {
                    self.promote(state, &mut manifest);
                }
            }
            ClientMessage::Control { value: Some(value) } => {
                if !state.driver.try_lock(sender) {
                    tracing::warn!(
                        token = %token,
                        participant_id = %sender,
                        holder = ?state.driver.lock_holder(),
                        "Driver claim refused, lock already held"
                    );
                    return Outcome::Rejected;
                }
                let driver_id = driver_id_of(&value).unwrap_or(sender).to_string();
                state.driver.assign(token, &driver_id);
                manifest.current_driver = Some(value.clone());
                manifest.controller = Some(sender.to_string());

                let update = ServerMessage::DriverUpdate(DriverUpdatePayload {
                    driver: Some(value),
                    selection: manifest.selected_item.clone(),
                });
                state.broadcast(token, &update, Some(self.origin(&envelope.from)));
            }
            ClientMessage::Control { value: None } => {
                state.driver.unlock();
                manifest.current_driver = None;

                // The legacy release path never carried the selection.
                let update = ServerMessage::DriverUpdate(DriverUpdatePayload {
                    driver: None,
                    selection: None,
                });
                state.broadcast(token, &update, Some(self.origin(&envelope.from)));
                prompt_driver = true;
            }
            ClientMessage::Response { request, response } => {
                let is_sample = request.as_deref() == Some(RequestKind::SampleTime.as_str());
                match (is_sample && is_driver, response.as_ref().and_then(Value::as_f64)) {
                    (true, Some(playhead)) => manifest.current_time = playhead,
                    _ => {
                        tracing::debug!(
                            token = %token,
                            participant_id = %sender,
                            is_driver,
                            "Ignoring response"
                        );
                        return Outcome::Ignored;
                    }
                }
            }
            ClientMessage::Unknown => return Outcome::Ignored,
        }

        state.manifests.set(manifest.clone());
        state.broadcast(token, &ServerMessage::ManifestUpdate(manifest), Some(sender));

        if prompt_driver {
            state.unicast_to_driver(token, ServerMessage::sample_time());
        }

        Outcome::Applied
    }

    /// Make the sender driver and controller
    fn promote(&self, state: &mut SessionState, manifest: &mut Manifest) {
        state.driver.assign(&self.token, &self.participant_id);
        manifest.controller = Some(self.participant_id.clone());
        manifest.current_driver = Some(Value::String(self.participant_id.clone()));
    }

    /// Participant excluded from a driver update: the declared `from`, or the sender
    fn origin<'a>(&'a self, from: &'a Option<String>) -> &'a str {
        from.as_deref().unwrap_or(&self.participant_id)
    }

    /// Send a message to this connection
    fn send_to_self(&self, msg: ServerMessage) {
        if let Err(e) = self
            .sessions
            .send_to_connection(&self.token, self.connection_id, msg)
        {
            tracing::debug!(
                token = %self.token,
                participant_id = %self.participant_id,
                error = %e,
                "Failed to send message to self"
            );
        }
    }
}

/// Errors that can occur while routing a message
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("connection superseded: {0}")]
    ConnectionSuperseded(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
