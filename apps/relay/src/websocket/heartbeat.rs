//! Connection liveness
//!
//! Every heartbeat period the writer checks whether the peer answered the
//! previous ping, then sends a new one. A peer that stayed silent for a whole
//! period is considered dead and its connection is terminated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared liveness flag between a connection's reader and writer
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// A fresh connection counts as alive until its first probe
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record a pong (or any other sign of life)
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Start a new probe.
    ///
    /// Returns whether the peer responded since the previous probe and
    /// resets the flag for the next one.
    pub fn probe(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
