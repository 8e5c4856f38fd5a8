//! Time-sampling loop
//!
//! While a session is playing, its driver is asked for its playhead on a
//! fixed cadence. Each session has at most one loop: arming replaces (and
//! thereby aborts) the previous one, and dropping the handle aborts the task.

use std::sync::Weak;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::state::SessionState;
use crate::websocket::messages::ServerMessage;

/// Owned handle of a running sampling loop
#[derive(Debug)]
pub struct SamplerHandle {
    task: JoinHandle<()>,
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the sampling loop for `token`.
///
/// The first tick fires immediately. The loop ends on its own once the
/// session disappears.
pub(crate) fn spawn(
    sessions: Weak<DashMap<String, SessionState>>,
    token: String,
    period: Duration,
) -> SamplerHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let Some(sessions) = sessions.upgrade() else {
                break;
            };
            if !tick(&sessions, &token) {
                tracing::debug!(token = %token, "Session gone, sampling loop exiting");
                break;
            }
        }
    });

    SamplerHandle { task }
}

/// Prompt the driver of `token` for its playhead.
///
/// Returns `false` when the session no longer exists.
pub(crate) fn tick(sessions: &DashMap<String, SessionState>, token: &str) -> bool {
    let Some(session) = sessions.get(token) else {
        return false;
    };
    if !session.registry.is_empty() && session.unicast_to_driver(token, ServerMessage::sample_time())
    {
        tracing::trace!(token = %token, driver = ?session.driver.current(), "Asked driver for sampleTime");
    }
    true
}
