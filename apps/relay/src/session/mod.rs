//! Session core
//!
//! This module owns all shared playback state:
//! - Connection registry per session token
//! - Manifest store
//! - Driver election and the exclusive driver lock
//! - Broadcast fan-out
//! - The per-session time-sampling loop
//! - Routing of inbound client messages
//!
//! Each token maps to one [`SessionState`]. Every mutation of a session
//! happens while holding that token's map guard, so messages, closes and
//! sampler ticks for the same token never interleave. Guards are never held
//! across an `.await`.

pub mod broadcast;
pub mod driver;
pub mod manifest;
pub mod registry;
pub mod router;
pub mod sampler;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;

use playsync_shared_config::TimingConfig;

pub use driver::DriverElection;
pub use manifest::{Manifest, ManifestStore};
pub use registry::{ConnectionId, SendError};
pub use router::{MessageRouter, Outcome, SessionError};
pub use state::SessionState;

use crate::websocket::messages::ServerMessage;
use registry::ConnectionHandle;

/// Result of a successful join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    /// Identifier of the new connection, needed to leave again
    pub connection_id: ConnectionId,

    /// Whether this connection created the session
    pub is_first: bool,
}

/// Registry of all live sessions
///
/// Thread-safe and cheap to clone. Uses DashMap so that unrelated sessions
/// never contend on a global lock.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, SessionState>>,
    sample_interval: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(TimingConfig::default().sample_interval)
    }
}

impl SessionManager {
    /// Create a session manager whose sampling loops tick every `sample_interval`
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            sample_interval,
        }
    }

    /// Register a new connection for `participant_id` in `token`.
    ///
    /// The first connection of a token creates the session, installs the
    /// default manifest and becomes driver. The new connection is sent the
    /// current manifest, and every connection already present is prompted
    /// for its playhead.
    pub fn join(
        &self,
        token: &str,
        participant_id: &str,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Joined {
        let handle = ConnectionHandle::new(sender);
        let connection_id = handle.id();

        let mut is_first = false;
        let mut session = self.sessions.entry(token.to_string()).or_insert_with(|| {
            is_first = true;
            SessionState::new()
        });
        let state = session.value_mut();

        // A leave may have emptied the session without removing it yet.
        if !is_first && state.registry.is_empty() {
            tracing::debug!(token = %token, "Reviving emptied session");
            *state = SessionState::new();
            is_first = true;
        }

        if is_first {
            tracing::info!(token = %token, "Created session");
            state.driver.assign(token, participant_id);
        }

        let manifest = state.manifests.get_or_create();
        tracing::debug!(token = %token, manifest = ?manifest, "Sending manifest to new connection");
        if let Err(e) = handle.send(ServerMessage::ManifestUpdate(manifest)) {
            tracing::debug!(token = %token, participant_id = %participant_id, error = %e, "Failed to send initial manifest");
        }

        state.broadcast(token, &ServerMessage::sample_time(), Some(participant_id));

        if let Some(displaced) = state.registry.join(participant_id, handle) {
            tracing::warn!(
                token = %token,
                participant_id = %participant_id,
                connection_id = %displaced.handle.id(),
                "Participant reconnected, closing previous connection"
            );
            let _ = displaced
                .handle
                .send(ServerMessage::error("Connection superseded by a newer one."));
        }

        tracing::info!(
            token = %token,
            participant_id = %participant_id,
            connection_id = %connection_id,
            connection_count = state.registry.len(),
            "Connection joined"
        );

        Joined {
            connection_id,
            is_first,
        }
    }

    /// Remove a connection and run driver handoff.
    ///
    /// Returns the number of connections left in the session. When none are
    /// left the whole session, including its manifest, driver and sampling
    /// loop, is torn down.
    pub fn leave(&self, token: &str, participant_id: &str, connection_id: ConnectionId) -> usize {
        let Some(mut session) = self.sessions.get_mut(token) else {
            return 0;
        };
        let state = session.value_mut();

        if state.registry.find_connection(connection_id).is_none() {
            tracing::debug!(
                token = %token,
                participant_id = %participant_id,
                connection_id = %connection_id,
                "Connection already removed"
            );
            return state.registry.len();
        }

        state.clear_if_matches(token, participant_id);

        let remaining = state
            .registry
            .leave(participant_id, connection_id)
            .unwrap_or(state.registry.len());

        if state.driver.release_if_held_by(participant_id) {
            tracing::info!(token = %token, participant_id = %participant_id, "Driver lock released by departure");
        }

        state
            .driver
            .reassign_to_remaining(token, participant_id, state.registry.participants());

        tracing::info!(
            token = %token,
            participant_id = %participant_id,
            connection_id = %connection_id,
            remaining,
            "Connection left"
        );

        if remaining == 0 {
            state.stop_sampling();
            drop(session);
            // A join may have raced in between; only drop a still-empty session.
            if self
                .sessions
                .remove_if(token, |_, s| s.registry.is_empty())
                .is_some()
            {
                tracing::info!(token = %token, "Session torn down");
            }
        }

        remaining
    }

    /// Snapshot of a session's manifest
    pub fn manifest(&self, token: &str) -> Option<Manifest> {
        self.sessions
            .get(token)
            .and_then(|s| s.manifests.current().cloned())
    }

    /// Replace a session's manifest. Returns false if the session does not exist.
    pub fn set_manifest(&self, token: &str, manifest: Manifest) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut s) => {
                s.manifests.set(manifest);
                true
            }
            None => false,
        }
    }

    /// Current driver of a session
    pub fn current_driver(&self, token: &str) -> Option<String> {
        self.sessions
            .get(token)
            .and_then(|s| s.driver.current().map(str::to_string))
    }

    pub fn is_driver(&self, token: &str, participant_id: &str) -> bool {
        self.sessions
            .get(token)
            .map(|s| s.driver.is_driver(participant_id))
            .unwrap_or(false)
    }

    /// Set a session's driver unconditionally
    pub fn assign_driver(&self, token: &str, participant_id: &str) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut s) => {
                s.driver.assign(token, participant_id);
                true
            }
            None => false,
        }
    }

    /// Whether a session's exclusive driver lock is held
    pub fn is_driver_locked(&self, token: &str) -> bool {
        self.sessions
            .get(token)
            .map(|s| s.driver.is_locked())
            .unwrap_or(false)
    }

    /// Send to every connection of `token` except `exclude_id`'s
    pub fn broadcast(&self, token: &str, msg: &ServerMessage, exclude_id: Option<&str>) -> usize {
        self.sessions
            .get(token)
            .map(|s| s.broadcast(token, msg, exclude_id))
            .unwrap_or(0)
    }

    /// Send only to the driver of `token`
    pub fn unicast_to_driver(&self, token: &str, msg: ServerMessage) -> bool {
        self.sessions
            .get(token)
            .map(|s| s.unicast_to_driver(token, msg))
            .unwrap_or(false)
    }

    /// Send to a single connection
    pub fn send_to_connection(
        &self,
        token: &str,
        connection_id: ConnectionId,
        msg: ServerMessage,
    ) -> Result<(), SendError> {
        let session = self.sessions.get(token).ok_or(SendError::SessionNotFound)?;
        let entry = session
            .registry
            .find_connection(connection_id)
            .ok_or(SendError::ConnectionNotFound)?;
        entry.handle.send(msg)
    }

    /// Participant ids that would receive a broadcast, in join order
    pub fn broadcast_targets(&self, token: &str, exclude_id: Option<&str>) -> Vec<String> {
        self.sessions
            .get(token)
            .map(|s| {
                s.registry
                    .broadcast_targets(exclude_id)
                    .map(|e| e.participant_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Start (or restart) the sampling loop of `token`
    pub fn start_sampling(&self, token: &str) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut s) => {
                self.arm_sampler(token, s.value_mut());
                true
            }
            None => false,
        }
    }

    /// Cancel the sampling loop of `token`
    pub fn stop_sampling(&self, token: &str) {
        if let Some(mut s) = self.sessions.get_mut(token) {
            s.stop_sampling();
        }
    }

    pub fn is_sampling(&self, token: &str) -> bool {
        self.sessions
            .get(token)
            .map(|s| s.is_sampling())
            .unwrap_or(false)
    }

    /// Create a router for messages arriving on one connection
    pub fn router(
        &self,
        token: impl Into<String>,
        participant_id: impl Into<String>,
        connection_id: ConnectionId,
    ) -> MessageRouter {
        MessageRouter::new(token.into(), participant_id.into(), connection_id, self.clone())
    }

    pub fn has_session(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    /// Number of connections in a session
    pub fn connection_count(&self, token: &str) -> usize {
        self.sessions
            .get(token)
            .map(|s| s.registry.len())
            .unwrap_or(0)
    }

    /// Number of live sessions
    pub fn total_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Number of connections across all sessions
    pub fn total_connections(&self) -> usize {
        self.sessions.iter().map(|s| s.registry.len()).sum()
    }

    /// Arm the sampler while the caller holds the session guard
    pub(crate) fn arm_sampler(&self, token: &str, state: &mut SessionState) {
        // Replacing the handle aborts any previous loop first.
        state.stop_sampling();
        state.sampler = Some(sampler::spawn(
            Arc::downgrade(&self.sessions),
            token.to_string(),
            self.sample_interval,
        ));
        tracing::debug!(token = %token, "Sampling loop armed");
    }

    /// Run `f` with exclusive access to a session
    pub(crate) fn with_session<R>(
        &self,
        token: &str,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Option<R> {
        self.sessions.get_mut(token).map(|mut s| f(s.value_mut()))
    }
}
