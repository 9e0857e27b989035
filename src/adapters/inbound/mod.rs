mod endpoint_server;
mod status_server;

pub use endpoint_server::EndpointServer;
pub use status_server::StatusServer;

// Re-export for external use (e.g., integration tests)
#[allow(unused_imports)]
pub use status_server::{BackendStatus, BackendsListResponse, HealthResponse};
