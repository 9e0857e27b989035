mod postgres_health_check;

pub(crate) use postgres_health_check::split_address;
pub use postgres_health_check::{PostgresHealthCheck, PostgresHealthCheckConfig};
