//! replica-router Library
//!
//! Routes client connections to a primary/follower set of PostgreSQL
//! replicas. Exposes the components for use in integration tests and as a
//! library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{EndpointServer, StatusServer};
pub use adapters::outbound::{PostgresHealthCheck, PostgresHealthCheckConfig};
pub use config::{load_config, Config, ConfigError};
pub use domain::entities::Backend;
pub use domain::ports::{HealthCheckConnector, HealthCheckSession, ProbeError};
pub use domain::value_objects::{Role, RoleFilter, UNAVAILABLE_LATENCY};
pub use infrastructure::{BackendMonitor, MonitorConfig, RouteError, ShutdownController};
