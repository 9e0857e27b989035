//! Health Check Port
//!
//! Defines the transport the probing tasks use to talk to a backend.
//! Any client speaking the database's wire protocol can implement it.

use async_trait::async_trait;

/// Failures of a single probe cycle.
///
/// These never leave the probing task: each one turns into an
/// `Unavailable` backend and a log line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("ping failed: {0}")]
    Ping(String),
    #[error("role query failed: {0}")]
    Query(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// Opens health-check sessions to backends.
///
/// This is an outbound port. The monitor owns one connector and every
/// probing task holds a shared handle to it.
#[async_trait]
pub trait HealthCheckConnector: Send + Sync {
    /// Open a new session to `address` (`host:port`).
    async fn connect(&self, address: &str) -> Result<Box<dyn HealthCheckSession>, ProbeError>;
}

/// A persistent health-check connection to one backend.
///
/// A probing task keeps its session across cycles and drops it after any
/// failure so the next cycle reconnects.
#[async_trait]
pub trait HealthCheckSession: Send {
    /// Liveness check on the open connection.
    async fn ping(&mut self) -> Result<(), ProbeError>;

    /// Whether the instance is currently replaying a primary's stream.
    async fn is_in_recovery(&mut self) -> Result<bool, ProbeError>;
}
