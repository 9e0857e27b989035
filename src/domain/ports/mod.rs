mod health_check;

#[cfg(test)]
pub(crate) mod mock;

pub use health_check::{HealthCheckConnector, HealthCheckSession, ProbeError};
