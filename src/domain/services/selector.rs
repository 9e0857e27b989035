//! Backend Selector Service
//!
//! Pure domain logic for ordering backends and picking one for a role.
//! This service has NO external dependencies - it's pure Rust.

use crate::domain::entities::Backend;
use crate::domain::value_objects::RoleFilter;

/// Selection over a latency-ordered backend list.
///
/// `select` relies on the slice being sorted by `sort_by_latency`: the first
/// match is then the lowest-latency match, and unavailable backends (pinned
/// to the maximum latency) can never shadow an available one.
pub struct Selector;

impl Selector {
    /// First backend in iteration order whose role satisfies `filter`.
    pub fn select(backends: &[Backend], filter: RoleFilter) -> Option<&Backend> {
        backends.iter().find(|b| filter.matches(b.role()))
    }

    /// Sort ascending by latency.
    ///
    /// The sort is stable: backends with equal latency keep their previous
    /// relative order, so ties resolve deterministically.
    pub fn sort_by_latency(backends: &mut [Backend]) {
        backends.sort_by_key(|b| b.latency());
    }
}
