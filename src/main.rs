//! replica-router - PostgreSQL primary/follower connection router
//!
//! This is the composition root that wires together all the components.

use replica_router::infrastructure::shutdown_signal;
use replica_router::{
    load_config, BackendMonitor, EndpointServer, PostgresHealthCheck, RoleFilter,
    ShutdownController, StatusServer,
};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting replica-router primary={} follower={} backends={}",
        cfg.primary_listen_addr,
        cfg.follower_listen_addr,
        cfg.backends.len()
    );
    tracing::debug!("configuration: {:?}", cfg);

    let shutdown = ShutdownController::new();

    // 1. Backend registry with one probing task per backend
    let connector = Arc::new(PostgresHealthCheck::new(cfg.health_check_config()));
    let monitor = BackendMonitor::new(connector, cfg.monitor_config(), shutdown.clone());
    for address in &cfg.backends {
        monitor.add(address.clone()).await;
    }

    // 2. Client endpoints
    let primary = EndpointServer::new(
        monitor.clone(),
        cfg.primary_listen_addr.clone(),
        RoleFilter::Primary,
        cfg.dial_timeout(),
        shutdown.clone(),
    );
    let follower = EndpointServer::new(
        monitor.clone(),
        cfg.follower_listen_addr.clone(),
        RoleFilter::Any,
        cfg.dial_timeout(),
        shutdown.clone(),
    );

    // 3. Optional status API
    let status = cfg.api_enabled.then(|| {
        StatusServer::new(cfg.api_listen_addr.clone(), monitor.clone(), shutdown.clone())
    });

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let status_task = async {
        match &status {
            Some(server) => server.run().await,
            None => Ok(()),
        }
    };

    let result = tokio::try_join!(primary.run(), follower.run(), status_task);

    // A listener failing to bind takes everything else down with it
    shutdown.shutdown();
    monitor.shutdown().await;

    if !shutdown.wait_for_drain(cfg.drain_timeout()).await {
        tracing::warn!("exiting with client sessions still open");
    }
    tracing::info!("replica-router stopped");

    result.map(|_| ())
}
