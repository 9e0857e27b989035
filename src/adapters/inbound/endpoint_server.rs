//! Endpoint Server Adapter
//!
//! Accepts client TCP connections on one logical endpoint and splices each
//! of them to a backend chosen by the monitor.

use crate::domain::value_objects::RoleFilter;
use crate::infrastructure::{BackendMonitor, ShutdownController};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Listener for one endpoint.
///
/// This adapter:
/// 1. Accepts incoming TCP connections
/// 2. Asks the monitor for a backend matching the endpoint's role filter
/// 3. Performs bidirectional TCP copy (L4 passthrough)
///
/// A client whose request cannot be routed is simply disconnected.
pub struct EndpointServer {
    monitor: Arc<BackendMonitor>,
    listen_addr: String,
    filter: RoleFilter,
    dial_timeout: Duration,
    shutdown: ShutdownController,
}

impl EndpointServer {
    pub fn new(
        monitor: Arc<BackendMonitor>,
        listen_addr: String,
        filter: RoleFilter,
        dial_timeout: Duration,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            monitor,
            listen_addr,
            filter,
            dial_timeout,
            shutdown,
        }
    }

    /// Bind the listen address and serve until shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!(
            "{} endpoint listening on {}",
            self.filter,
            listener.local_addr()?
        );

        loop {
            let (stream, addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = self.shutdown.cancelled() => {
                    tracing::info!("{} endpoint stopped accepting", self.filter);
                    return Ok(());
                }
            };

            let monitor = self.monitor.clone();
            let filter = self.filter;
            let dial_timeout = self.dial_timeout;
            let guard = self.shutdown.session_guard();

            tokio::spawn(async move {
                if let Err(e) =
                    Self::handle_connection(monitor, stream, addr, filter, dial_timeout).await
                {
                    tracing::debug!("session from {} ended with error: {:?}", addr, e);
                }
                drop(guard);
            });
        }
    }

    async fn handle_connection(
        monitor: Arc<BackendMonitor>,
        client_stream: TcpStream,
        client_addr: SocketAddr,
        filter: RoleFilter,
        dial_timeout: Duration,
    ) -> io::Result<()> {
        let backend_stream = match monitor.acquire(filter, dial_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("cannot route {} client {}: {}", filter, client_addr, e);
                return Ok(());
            }
        };

        tracing::debug!(
            "proxying {} -> {} ({})",
            client_addr,
            backend_stream.peer_addr()?,
            filter
        );

        Self::proxy_bidirectional(client_stream, backend_stream).await
    }

    /// Copy bytes both ways until each side has closed.
    async fn proxy_bidirectional(
        client_stream: TcpStream,
        backend_stream: TcpStream,
    ) -> io::Result<()> {
        let (mut client_read, mut client_write) = client_stream.into_split();
        let (mut backend_read, mut backend_write) = backend_stream.into_split();

        let client_to_backend = async {
            let result = io::copy(&mut client_read, &mut backend_write).await;
            let _ = backend_write.shutdown().await;
            result
        };

        let backend_to_client = async {
            let result = io::copy(&mut backend_read, &mut client_write).await;
            let _ = client_write.shutdown().await;
            result
        };

        let (c2b, b2c) = tokio::join!(client_to_backend, backend_to_client);

        // Resets while closing are normal
        if let Err(e) = c2b {
            tracing::trace!("client->backend copy error: {:?}", e);
        }
        if let Err(e) = b2c {
            tracing::trace!("backend->client copy error: {:?}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::ports::mock::ScriptedConnector;
    use crate::domain::value_objects::Role;
    use crate::infrastructure::MonitorConfig;
    use tokio::io::AsyncReadExt;

    /// Backend that answers every read with the same bytes prefixed by a tag.
    async fn spawn_echo_backend(tag: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 64];
                    while let Ok(n) = stream.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        let _ = stream.write_all(tag).await;
                        let _ = stream.write_all(&buf[..n]).await;
                    }
                });
            }
        });
        addr
    }

    async fn start_endpoint(
        monitor: Arc<BackendMonitor>,
        filter: RoleFilter,
        shutdown: ShutdownController,
    ) -> (SocketAddr, tokio::task::JoinHandle<anyhow::Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = EndpointServer::new(
            monitor,
            addr.to_string(),
            filter,
            Duration::from_millis(500),
            shutdown,
        );
        let handle = tokio::spawn(async move { server.serve(listener).await });
        (addr, handle)
    }

    fn create_monitor() -> Arc<BackendMonitor> {
        BackendMonitor::new(
            ScriptedConnector::new(),
            MonitorConfig::default(),
            ShutdownController::new(),
        )
    }

    async fn roundtrip(endpoint: SocketAddr, payload: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(endpoint).await.unwrap();
        client.write_all(payload).await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        response
    }

    #[test]
    fn test_endpoint_server_new() {
        let server = EndpointServer::new(
            create_monitor(),
            "0.0.0.0:5432".to_string(),
            RoleFilter::Primary,
            Duration::from_secs(5),
            ShutdownController::new(),
        );
        assert_eq!(server.listen_addr, "0.0.0.0:5432");
        assert_eq!(server.filter, RoleFilter::Primary);
    }

    #[tokio::test]
    async fn test_primary_endpoint_splices_to_primary() {
        let monitor = create_monitor();
        let primary = spawn_echo_backend(b"P:").await;
        let follower = spawn_echo_backend(b"F:").await;
        monitor.register(&primary).await;
        monitor.register(&follower).await;
        monitor.record_probe(&primary, Role::Primary, Duration::from_millis(9)).await;
        monitor.record_probe(&follower, Role::Follower, Duration::from_millis(1)).await;

        let shutdown = ShutdownController::new();
        let (endpoint, _) = start_endpoint(monitor, RoleFilter::Primary, shutdown).await;

        assert_eq!(roundtrip(endpoint, b"insert").await, b"P:insert");
    }

    #[tokio::test]
    async fn test_follower_endpoint_prefers_lowest_latency() {
        let monitor = create_monitor();
        let primary = spawn_echo_backend(b"P:").await;
        let follower = spawn_echo_backend(b"F:").await;
        monitor.register(&primary).await;
        monitor.register(&follower).await;
        monitor.record_probe(&primary, Role::Primary, Duration::from_millis(9)).await;
        monitor.record_probe(&follower, Role::Follower, Duration::from_millis(1)).await;

        let shutdown = ShutdownController::new();
        let (endpoint, _) = start_endpoint(monitor, RoleFilter::Any, shutdown).await;

        assert_eq!(roundtrip(endpoint, b"select").await, b"F:select");
    }

    #[tokio::test]
    async fn test_unroutable_client_is_disconnected() {
        let monitor = create_monitor();
        let shutdown = ShutdownController::new();
        let (endpoint, _) = start_endpoint(monitor, RoleFilter::Primary, shutdown).await;

        let mut client = TcpStream::connect(endpoint).await.unwrap();
        let mut response = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut response))
            .await
            .unwrap();
        assert!(read.is_ok());
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_serve_returns_on_shutdown() {
        let shutdown = ShutdownController::new();
        let (_, handle) =
            start_endpoint(create_monitor(), RoleFilter::Any, shutdown.clone()).await;

        shutdown.shutdown();
        let result = tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_session_is_tracked_until_closed() {
        let monitor = create_monitor();
        let backend = spawn_echo_backend(b"").await;
        monitor.register(&backend).await;
        monitor.record_probe(&backend, Role::Primary, Duration::from_millis(1)).await;

        let shutdown = ShutdownController::new();
        let (endpoint, _) = start_endpoint(monitor, RoleFilter::Primary, shutdown.clone()).await;

        let response = roundtrip(endpoint, b"x").await;
        assert_eq!(response, b"x");
        assert!(shutdown.wait_for_drain(Duration::from_secs(1)).await);
    }
}
