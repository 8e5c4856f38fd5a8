//! Per-session state aggregate

use super::driver::DriverElection;
use super::manifest::ManifestStore;
use super::registry::ConnectionRegistry;
use super::sampler::SamplerHandle;

/// Everything the relay knows about one session token.
///
/// Created when the first connection joins and dropped when the last one
/// leaves. Dropping it cancels the sampling loop.
#[derive(Debug, Default)]
pub struct SessionState {
    pub registry: ConnectionRegistry,
    pub manifests: ManifestStore,
    pub driver: DriverElection,
    pub sampler: Option<SamplerHandle>,
}

impl SessionState {
    /// Create a session with a default manifest installed
    pub fn new() -> Self {
        let mut state = Self::default();
        state.manifests.get_or_create();
        state
    }

    /// Whether a sampling loop is armed
    pub fn is_sampling(&self) -> bool {
        self.sampler.is_some()
    }

    /// Cancel the sampling loop, if any
    pub fn stop_sampling(&mut self) {
        if self.sampler.take().is_some() {
            tracing::debug!("Sampling loop cancelled");
        }
    }
}
