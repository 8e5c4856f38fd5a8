//! Relay server configuration

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{bail, Context, Result};
use playsync_shared_config::{CommonConfig, Environment, TimingConfig, TlsConfig};

/// Default plain-HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Relay server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Plain-HTTP port (default: 3000)
    pub port: u16,

    /// CORS allowed origins (optional)
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// With `SSL=true` the certificate and key must both be readable, since
    /// the listener cannot start without them.
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let config = Self {
            common,

            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .context("Invalid PORT value")?,

            cors_allowed_origins: env::var("CORS_ORIGINS").ok().map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        };

        if config.common.tls.enabled {
            Self::validate_tls_files(&config.common.tls)?;
        }

        Ok(config)
    }

    /// Ensure the certificate and key referenced by the TLS config exist
    fn validate_tls_files(tls: &TlsConfig) -> Result<()> {
        for (what, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
            if !path.is_file() {
                bail!(
                    "SSL is enabled but the TLS {} was not found at {}. \
                     Set TLS_CERT_PATH / TLS_KEY_PATH or disable SSL.",
                    what,
                    path.display()
                );
            }
        }
        Ok(())
    }

    /// Port the listener binds to: the TLS port when SSL is on
    pub fn listen_port(&self) -> u16 {
        if self.common.tls.enabled {
            self.common.tls.port
        } else {
            self.port
        }
    }

    /// Socket address the listener binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listen_port()))
    }

    /// Get TLS configuration
    pub fn tls(&self) -> &TlsConfig {
        &self.common.tls
    }

    /// Get sampling and heartbeat timing
    pub fn timing(&self) -> TimingConfig {
        self.common.timing
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    // Mutex to ensure tests that modify environment variables don't run in parallel
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "PORT",
        "SSL",
        "TLS_PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "SAMPLE_INTERVAL_MS",
        "HEARTBEAT_INTERVAL_SECS",
        "CORS_ORIGINS",
        "ENVIRONMENT",
    ];

    /// Helper to temporarily set environment variables for a test
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Clear every relay variable, then apply `vars`
        fn new(vars: &[(&str, &str)]) -> Self {
            let saved: Vec<_> = VARS
                .iter()
                .map(|k| {
                    let old = env::var(*k).ok();
                    env::remove_var(*k);
                    (k.to_string(), old)
                })
                .collect();
            for (k, v) in vars {
                env::set_var(*k, *v);
            }
            Self { vars: saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (k, v) in &self.vars {
                match v {
                    Some(val) => env::set_var(k, val),
                    None => env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[]);

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.listen_port(), 3000);
        assert!(!config.tls().enabled);
        assert_eq!(config.timing().sample_interval, Duration::from_millis(2000));
        assert_eq!(config.timing().heartbeat_interval, Duration::from_secs(30));
        assert!(config.cors_allowed_origins.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_port_override() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("PORT", "8081")]);

        let config = Config::from_env().unwrap();
        assert_eq!(config.listen_port(), 8081);
        assert_eq!(config.listen_addr().port(), 8081);
    }

    #[test]
    fn test_invalid_port_fails() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("PORT", "not-a-port")]);

        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("Invalid PORT value"));
    }

    #[test]
    fn test_ssl_requires_certificate_files() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[
            ("SSL", "true"),
            ("TLS_CERT_PATH", "/nonexistent/certificate.crt"),
            ("TLS_KEY_PATH", "/nonexistent/privateKey.key"),
        ]);

        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("certificate"));
        assert!(err.contains("/nonexistent/certificate.crt"));
    }

    #[test]
    fn test_ssl_moves_listener_to_tls_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = env::temp_dir().join(format!("playsync-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cert = dir.join("certificate.crt");
        let key = dir.join("privateKey.key");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let _guard = EnvGuard::new(&[
            ("SSL", "true"),
            ("PORT", "3000"),
            ("TLS_CERT_PATH", cert.to_str().unwrap()),
            ("TLS_KEY_PATH", key.to_str().unwrap()),
        ]);

        let config = Config::from_env().unwrap();
        assert!(config.tls().enabled);
        assert_eq!(config.listen_port(), 443);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cors_origins_parsing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[(
            "CORS_ORIGINS",
            "https://watch.example.com, https://tv.example.com,,",
        )]);

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            Some(vec![
                "https://watch.example.com".to_string(),
                "https://tv.example.com".to_string()
            ])
        );
    }

    #[test]
    fn test_zero_sample_interval_fails() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("SAMPLE_INTERVAL_MS", "0")]);

        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_production_environment() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::new(&[("ENVIRONMENT", "production")]);

        let config = Config::from_env().unwrap();
        assert!(config.is_production());
        assert_eq!(config.environment(), Environment::Production);
    }
}
