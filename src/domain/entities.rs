//! Domain Entities - Core business objects
//!
//! A `Backend` is the in-memory record of one configured database instance.
//! Its fields are only mutable through methods that keep role and latency
//! consistent with each other.

use crate::domain::value_objects::{Role, UNAVAILABLE_LATENCY};
use std::time::Duration;

/// One monitored database instance.
///
/// The address never changes after creation. Role and latency are
/// overwritten by the backend's probing task, always through the
/// registry's write lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    address: String,
    role: Role,
    latency: Duration,
}

impl Backend {
    /// Create a backend in the initial `Unavailable` state.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: Role::Unavailable,
            latency: UNAVAILABLE_LATENCY,
        }
    }

    /// Network location (`host:port`).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Most recent role-check round trip, or `UNAVAILABLE_LATENCY`.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Latency in milliseconds, `None` while unavailable.
    pub fn latency_ms(&self) -> Option<u64> {
        if self.role.is_available() {
            Some(self.latency.as_millis() as u64)
        } else {
            None
        }
    }

    pub fn is_available(&self) -> bool {
        self.role.is_available()
    }

    /// Apply the result of a successful probe cycle.
    ///
    /// Recording `Role::Unavailable` is equivalent to `mark_unavailable`,
    /// the measured latency is discarded in that case.
    pub fn record_probe(&mut self, role: Role, latency: Duration) {
        if role.is_available() {
            self.role = role;
            self.latency = latency;
        } else {
            self.mark_unavailable();
        }
    }

    /// Pin the backend to the tail of the latency order.
    pub fn mark_unavailable(&mut self) {
        self.role = Role::Unavailable;
        self.latency = UNAVAILABLE_LATENCY;
    }
}
