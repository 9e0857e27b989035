//! Adapters Layer
//!
//! Inbound: client endpoints and the status API.
//! Outbound: the PostgreSQL health-check transport.

pub mod inbound;
pub mod outbound;
