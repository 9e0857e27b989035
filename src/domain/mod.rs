//! Domain Layer
//!
//! Backend records, roles, selection and the health-check port.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::Backend;
pub use value_objects::{Role, RoleFilter, UNAVAILABLE_LATENCY};
