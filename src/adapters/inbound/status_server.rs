//! Status API Server
//!
//! Read-only HTTP view of the backend registry for operators and
//! orchestration health checks.

use crate::domain::entities::Backend;
use crate::domain::value_objects::Role;
use crate::infrastructure::{BackendMonitor, ShutdownController};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// One backend as reported by the API.
#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub role: Role,
    /// `null` while the backend is unavailable
    pub latency_ms: Option<u64>,
}

impl From<&Backend> for BackendStatus {
    fn from(backend: &Backend) -> Self {
        Self {
            address: backend.address().to_string(),
            role: backend.role(),
            latency_ms: backend.latency_ms(),
        }
    }
}

/// List of backends response, in routing preference order.
#[derive(Debug, Serialize)]
pub struct BackendsListResponse {
    pub backends: Vec<BackendStatus>,
    pub total: usize,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backends: usize,
    pub primaries: usize,
    pub followers: usize,
}

/// HTTP server exposing the registry.
pub struct StatusServer {
    listen_addr: String,
    monitor: Arc<BackendMonitor>,
    shutdown: ShutdownController,
}

impl StatusServer {
    pub fn new(
        listen_addr: String,
        monitor: Arc<BackendMonitor>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr,
            monitor,
            shutdown,
        }
    }

    /// Run the API server until shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = router(self.monitor.clone()).layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("status API listening on {}", self.listen_addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}

fn router(monitor: Arc<BackendMonitor>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/backends", get(list_backends_handler))
        .with_state(monitor)
}

// Handler functions

async fn health_handler(State(monitor): State<Arc<BackendMonitor>>) -> impl IntoResponse {
    let backends = monitor.snapshot().await;
    let count_role = |role: Role| backends.iter().filter(|b| b.role() == role).count();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backends: backends.len(),
        primaries: count_role(Role::Primary),
        followers: count_role(Role::Follower),
    })
}

async fn list_backends_handler(State(monitor): State<Arc<BackendMonitor>>) -> impl IntoResponse {
    let backends: Vec<BackendStatus> = monitor
        .snapshot()
        .await
        .iter()
        .map(BackendStatus::from)
        .collect();

    Json(BackendsListResponse {
        total: backends.len(),
        backends,
    })
}
