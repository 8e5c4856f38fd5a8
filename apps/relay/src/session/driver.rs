//! Driver election
//!
//! The driver is the participant whose self-reported clock is trusted as the
//! playback time source. A session also carries an exclusive driver lock
//! taken by an explicit `control` claim; while it is held, competing claims
//! are refused and the sampling loop stays quiet.

use super::state::SessionState;
use crate::websocket::messages::ServerMessage;

/// Driver assignment and exclusive lock of one session
#[derive(Debug, Default)]
pub struct DriverElection {
    driver: Option<String>,
    lock_holder: Option<String>,
}

impl DriverElection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the driver unconditionally
    pub fn assign(&mut self, token: &str, participant_id: &str) {
        if self.driver.as_deref() == Some(participant_id) {
            return;
        }
        tracing::info!(
            token = %token,
            previous = ?self.driver,
            participant_id = %participant_id,
            "{} has a new driver: {}",
            token,
            participant_id
        );
        self.driver = Some(participant_id.to_string());
    }

    /// Current driver, if any
    pub fn current(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn is_driver(&self, participant_id: &str) -> bool {
        self.driver.as_deref() == Some(participant_id)
    }

    /// Hand the driver role to the earliest remaining participant.
    ///
    /// Only acts when `departing` is the current driver. With no candidates
    /// left the driver becomes absent. Returns the new driver.
    pub fn reassign_to_remaining<'a>(
        &mut self,
        token: &str,
        departing: &str,
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> Option<&str> {
        if !self.is_driver(departing) {
            return self.current();
        }

        tracing::info!(
            token = %token,
            participant_id = %departing,
            "Driver {} is leaving {}",
            departing,
            token
        );
        self.driver = None;

        if let Some(next) = candidates.into_iter().next() {
            self.assign(token, next);
        }
        self.current()
    }

    /// Whether an exclusive driver claim is active
    pub fn is_locked(&self) -> bool {
        self.lock_holder.is_some()
    }

    pub fn lock_holder(&self) -> Option<&str> {
        self.lock_holder.as_deref()
    }

    /// Take the exclusive lock. Fails if it is already held.
    pub fn try_lock(&mut self, holder: &str) -> bool {
        if self.is_locked() {
            return false;
        }
        self.lock_holder = Some(holder.to_string());
        true
    }

    pub fn unlock(&mut self) {
        self.lock_holder = None;
    }

    /// Release the lock if `participant_id` holds it
    pub fn release_if_held_by(&mut self, participant_id: &str) -> bool {
        if self.lock_holder.as_deref() == Some(participant_id) {
            self.lock_holder = None;
            true
        } else {
            false
        }
    }
}

impl SessionState {
    /// Clear `currentDriver` if it names `participant_id`, telling the rest
    /// of the session.
    pub fn clear_if_matches(&mut self, token: &str, participant_id: &str) -> bool {
        let mut manifest = self.manifests.get_or_create();
        if manifest.current_driver_id() != Some(participant_id) {
            return false;
        }
        manifest.current_driver = None;
        self.manifests.set(manifest.clone());
        self.broadcast(
            token,
            &ServerMessage::ManifestUpdate(manifest),
            Some(participant_id),
        );
        true
    }
}
