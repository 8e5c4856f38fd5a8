//! Broadcast engine
//!
//! Fan-out of server messages to a session's connections. Sends never fail
//! towards the caller: a closed connection is cleaned up by its own close
//! path, so a failed send is only logged.

use super::registry::ConnectionHandle;
use super::state::SessionState;
use crate::websocket::messages::ServerMessage;

impl SessionState {
    /// Send to every connection except the one belonging to `exclude_id`.
    ///
    /// Returns the number of connections the message was queued for.
    pub fn broadcast(&self, token: &str, msg: &ServerMessage, exclude_id: Option<&str>) -> usize {
        let mut sent = 0;
        for entry in self.registry.broadcast_targets(exclude_id) {
            match entry.handle.send(msg.clone()) {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::debug!(
                        token = %token,
                        participant_id = %entry.participant_id,
                        error = %e,
                        "Failed to send broadcast"
                    );
                }
            }
        }
        sent
    }

    /// Send only to the current driver's connection.
    ///
    /// Skipped when there is no driver, the driver has no connection, or an
    /// exclusive driver lock is held.
    pub fn unicast_to_driver(&self, token: &str, msg: ServerMessage) -> bool {
        if self.driver.is_locked() {
            tracing::trace!(token = %token, "Driver lock held, skipping unicast");
            return false;
        }
        let Some(driver) = self.driver.current() else {
            return false;
        };
        match self.registry.find(driver) {
            Some(entry) => self.deliver(token, &entry.participant_id, &entry.handle, msg),
            None => false,
        }
    }

    fn deliver(
        &self,
        token: &str,
        participant_id: &str,
        handle: &ConnectionHandle,
        msg: ServerMessage,
    ) -> bool {
        if let Err(e) = handle.send(msg) {
            tracing::debug!(
                token = %token,
                participant_id = %participant_id,
                error = %e,
                "Failed to send message"
            );
            return false;
        }
        true
    }
}
