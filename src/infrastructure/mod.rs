//! Infrastructure Layer
//!
//! The backend registry, its probing tasks and shutdown coordination.

pub mod backend_monitor;
mod prober;
pub mod shutdown;

pub use backend_monitor::{BackendMonitor, MonitorConfig, RouteError};
pub use shutdown::{shutdown_signal, SessionGuard, ShutdownController};
