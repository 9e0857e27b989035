use crate::adapters::outbound::{split_address, PostgresHealthCheckConfig};
use crate::infrastructure::MonitorConfig;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Config {
    // Endpoints
    pub primary_listen_addr: String,
    pub follower_listen_addr: String,

    // Backends and health-check credentials
    pub backends: Vec<String>,
    pub health_user: String,
    pub health_password: String,
    pub health_database: String,

    // Timings
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub dial_timeout_ms: u64,
    pub drain_timeout_secs: u64,

    // Status API settings
    pub api_enabled: bool,
    pub api_listen_addr: String,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_listen_addr: "0.0.0.0:5432".to_string(),
            follower_listen_addr: "0.0.0.0:5433".to_string(),
            backends: Vec::new(),
            health_user: "postgres".to_string(),
            health_password: String::new(),
            health_database: "postgres".to_string(),
            probe_interval_ms: 1000,
            probe_timeout_ms: 5000,
            dial_timeout_ms: 5000,
            drain_timeout_secs: 30,
            api_enabled: false,
            api_listen_addr: "0.0.0.0:8081".to_string(),
            debug: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("primary_listen_addr", &self.primary_listen_addr)
            .field("follower_listen_addr", &self.follower_listen_addr)
            .field("backends", &self.backends)
            .field("health_user", &self.health_user)
            .field("health_password", &"<redacted>")
            .field("health_database", &self.health_database)
            .field("probe_interval_ms", &self.probe_interval_ms)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .field("dial_timeout_ms", &self.dial_timeout_ms)
            .field("drain_timeout_secs", &self.drain_timeout_secs)
            .field("api_enabled", &self.api_enabled)
            .field("api_listen_addr", &self.api_listen_addr)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Config {
    /// Build a config from an arbitrary variable lookup.
    ///
    /// Missing variables and unparsable numbers fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(false)
        };

        let backends = lookup("ROUTER_BACKENDS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            primary_listen_addr: string("ROUTER_PRIMARY_LISTEN_ADDR", defaults.primary_listen_addr),
            follower_listen_addr: string(
                "ROUTER_FOLLOWER_LISTEN_ADDR",
                defaults.follower_listen_addr,
            ),
            backends,
            health_user: string("ROUTER_HEALTH_USER", defaults.health_user),
            health_password: string("ROUTER_HEALTH_PASSWORD", defaults.health_password),
            health_database: string("ROUTER_HEALTH_DATABASE", defaults.health_database),
            probe_interval_ms: number("ROUTER_PROBE_INTERVAL_MS", defaults.probe_interval_ms),
            probe_timeout_ms: number("ROUTER_PROBE_TIMEOUT_MS", defaults.probe_timeout_ms),
            dial_timeout_ms: number("ROUTER_DIAL_TIMEOUT_MS", defaults.dial_timeout_ms),
            drain_timeout_secs: number("ROUTER_DRAIN_TIMEOUT_SECS", defaults.drain_timeout_secs),
            api_enabled: flag("ROUTER_API_ENABLED"),
            api_listen_addr: string("ROUTER_API_LISTEN_ADDR", defaults.api_listen_addr),
            debug: lookup("DEBUG").is_some(),
        }
    }

    /// Reject configurations the router cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }
        if let Some(bad) = self.backends.iter().find(|b| !is_backend_address(b)) {
            return Err(ConfigError::InvalidBackendAddress(bad.clone()));
        }
        if self.probe_interval_ms == 0 {
            return Err(ConfigError::ZeroProbeInterval);
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(self.probe_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }

    pub fn health_check_config(&self) -> PostgresHealthCheckConfig {
        PostgresHealthCheckConfig {
            user: self.health_user.clone(),
            password: self.health_password.clone(),
            database: self.health_database.clone(),
        }
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// `host:port` or `[v6]:port`, parsed the same way the health check dials it.
fn is_backend_address(address: &str) -> bool {
    let has_port = address
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    has_port && split_address(address).is_ok()
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no backends configured (set ROUTER_BACKENDS)")]
    NoBackends,
    #[error("backend address must be host:port, got {0:?}")]
    InvalidBackendAddress(String),
    #[error("probe interval must be greater than zero")]
    ZeroProbeInterval,
    #[error("probe timeout must be greater than zero")]
    ZeroProbeTimeout,
}

/// Load configuration from the process environment.
pub fn load_config() -> anyhow::Result<Config> {
    let cfg = Config::from_lookup(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}
