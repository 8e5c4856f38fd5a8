//! Sync timing configuration

use std::time::Duration;

use crate::{parse_env, ConfigError, ConfigResult};

/// How often the driver is asked for its playhead
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 2000;

/// How often connections are probed for liveness
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Cadence of the time-sampling loop and the liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Interval between `sampleTime` requests to a session's driver
    pub sample_interval: Duration,

    /// Interval between heartbeat pings
    pub heartbeat_interval: Duration,
}

impl TimingConfig {
    /// Load timing configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let sample_ms: u64 = parse_env("SAMPLE_INTERVAL_MS", DEFAULT_SAMPLE_INTERVAL_MS)?;
        let heartbeat_secs: u64 =
            parse_env("HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS)?;

        if sample_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "SAMPLE_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if heartbeat_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "HEARTBEAT_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            sample_interval: Duration::from_millis(sample_ms),
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
        })
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
        }
    }
}
