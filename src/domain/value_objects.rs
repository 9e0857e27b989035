//! Value Objects - Immutable domain primitives
//!
//! Roles a backend can report and the filters routing queries select with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Latency assigned to a backend that is not currently usable.
///
/// Sorts after every measured latency, which keeps unavailable backends
/// at the tail of the registry.
pub const UNAVAILABLE_LATENCY: Duration = Duration::MAX;

/// Replication role a backend reported on its last probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not reachable, or the last probe cycle failed
    #[default]
    Unavailable,
    /// Accepting writes (not in recovery)
    Primary,
    /// Replaying a primary's stream (in recovery), read-only
    Follower,
}

impl Role {
    /// Map the result of `pg_is_in_recovery()` to a role.
    pub fn from_recovery(in_recovery: bool) -> Self {
        if in_recovery {
            Self::Follower
        } else {
            Self::Primary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Primary => "primary",
            Self::Follower => "follower",
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which roles a routing query accepts.
///
/// The primary endpoint must never land on a follower, while the follower
/// endpoint takes whichever available backend answers fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleFilter {
    /// Only backends reporting themselves as primary
    Primary,
    /// Any available backend, primary or follower
    Any,
}

impl RoleFilter {
    /// Whether a backend in `role` satisfies this filter.
    pub fn matches(&self, role: Role) -> bool {
        match self {
            Self::Primary => role == Role::Primary,
            Self::Any => role.is_available(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for RoleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
