//! TLS termination settings

use std::path::PathBuf;

use crate::{env_flag, get_env_or_default, parse_env, ConfigResult};

/// Port the listener moves to when TLS is enabled and no override is given
pub const DEFAULT_TLS_PORT: u16 = 443;

/// TLS configuration
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Whether the listener terminates TLS itself (`SSL=true`)
    pub enabled: bool,

    /// Path to the PEM certificate chain
    pub cert_path: PathBuf,

    /// Path to the PEM private key
    pub key_path: PathBuf,

    /// Port used instead of `PORT` when TLS is enabled
    pub port: u16,
}

impl TlsConfig {
    /// Load TLS configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            enabled: env_flag("SSL"),
            cert_path: PathBuf::from(get_env_or_default(
                "TLS_CERT_PATH",
                "./cert/certificate.crt",
            )),
            key_path: PathBuf::from(get_env_or_default("TLS_KEY_PATH", "./cert/privateKey.key")),
            port: parse_env("TLS_PORT", DEFAULT_TLS_PORT)?,
        })
    }

    /// Create an enabled configuration for the given files (useful for testing)
    pub fn with_files(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            port: DEFAULT_TLS_PORT,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_path: PathBuf::from("./cert/certificate.crt"),
            key_path: PathBuf::from("./cert/privateKey.key"),
            port: DEFAULT_TLS_PORT,
        }
    }
}
