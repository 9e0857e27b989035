//! PostgreSQL Health Check
//!
//! Implements the health-check port on top of a single `sqlx` connection
//! per backend. The role check is `pg_is_in_recovery()`.

use crate::domain::ports::{HealthCheckConnector, HealthCheckSession, ProbeError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use std::fmt;

const DEFAULT_PORT: u16 = 5432;
const ROLE_QUERY: &str = "SELECT pg_is_in_recovery()";

/// Credentials used by every health-check connection.
#[derive(Clone)]
pub struct PostgresHealthCheckConfig {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for PostgresHealthCheckConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
        }
    }
}

impl fmt::Debug for PostgresHealthCheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresHealthCheckConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Opens plain (non-TLS) PostgreSQL connections for probing.
pub struct PostgresHealthCheck {
    config: PostgresHealthCheckConfig,
}

impl PostgresHealthCheck {
    pub fn new(config: PostgresHealthCheckConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self, address: &str) -> Result<PgConnectOptions, ProbeError> {
        let (host, port) = split_address(address)?;
        Ok(PgConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .ssl_mode(PgSslMode::Disable)
            .application_name("replica-router")
            .disable_statement_logging())
    }
}

#[async_trait]
impl HealthCheckConnector for PostgresHealthCheck {
    async fn connect(&self, address: &str) -> Result<Box<dyn HealthCheckSession>, ProbeError> {
        let options = self.connect_options(address)?;
        let conn = options
            .connect()
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;
        Ok(Box::new(PostgresSession { conn }))
    }
}

struct PostgresSession {
    conn: PgConnection,
}

#[async_trait]
impl HealthCheckSession for PostgresSession {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        self.conn
            .ping()
            .await
            .map_err(|e| ProbeError::Ping(e.to_string()))
    }

    async fn is_in_recovery(&mut self) -> Result<bool, ProbeError> {
        sqlx::query_scalar::<_, bool>(ROLE_QUERY)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| ProbeError::Query(e.to_string()))
    }
}

/// Split `host:port` (or `[v6]:port`). A bare host gets the default port.
pub(crate) fn split_address(address: &str) -> Result<(String, u16), ProbeError> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ProbeError::Connect(format!("invalid address: {}", address)))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(address, port)?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(ProbeError::Connect(format!("invalid address: {}", address))),
        };
        return Ok((host.to_string(), port));
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            Ok((host.to_string(), parse_port(address, port)?))
        }
        Some(_) => Err(ProbeError::Connect(format!(
            "invalid address: {} (wrap IPv6 hosts in brackets)",
            address
        ))),
        None => Ok((address.to_string(), DEFAULT_PORT)),
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16, ProbeError> {
    port.parse()
        .map_err(|_| ProbeError::Connect(format!("invalid port in address: {}", address)))
}
