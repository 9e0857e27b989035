//! Backend Monitor
//!
//! Registry of all configured backends, kept sorted by latency behind a
//! single readers-writer lock. Each backend gets its own probing task;
//! routing queries scan the sorted list under the read lock and dial the
//! first match.

use crate::domain::entities::Backend;
use crate::domain::ports::HealthCheckConnector;
use crate::domain::services::Selector;
use crate::domain::value_objects::{Role, RoleFilter};
use crate::infrastructure::prober::Prober;
use crate::infrastructure::shutdown::ShutdownController;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Probing configuration shared by every backend.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between two probe cycles of the same backend
    pub interval: Duration,
    /// Upper bound for each of connect, ping and role query
    pub probe_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Errors surfaced to routing callers.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no available instance")]
    NoAvailableInstance,
    #[error("dial {address} failed: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Registry of monitored backends.
pub struct BackendMonitor {
    /// Always sorted ascending by latency
    backends: RwLock<Vec<Backend>>,
    connector: Arc<dyn HealthCheckConnector>,
    config: MonitorConfig,
    shutdown: ShutdownController,
    probers: Mutex<Vec<JoinHandle<()>>>,
}

impl BackendMonitor {
    pub fn new(
        connector: Arc<dyn HealthCheckConnector>,
        config: MonitorConfig,
        shutdown: ShutdownController,
    ) -> Arc<Self> {
        Arc::new(Self {
            backends: RwLock::new(Vec::new()),
            connector,
            config,
            shutdown,
            probers: Mutex::new(Vec::new()),
        })
    }

    /// Register a backend and start its probing task.
    ///
    /// Returns `false` (and starts nothing) if the address is already
    /// registered.
    pub async fn add(self: &Arc<Self>, address: impl Into<String>) -> bool {
        let address = address.into();
        if !self.register(&address).await {
            tracing::warn!("backend {} is already registered, ignoring", address);
            return false;
        }

        let prober = Prober::new(
            address,
            Arc::downgrade(self),
            self.connector.clone(),
            self.config.clone(),
        );
        let handle = tokio::spawn(prober.run(self.shutdown.clone()));
        self.probers.lock().push(handle);
        true
    }

    /// Insert an unavailable backend without starting a probing task.
    pub(crate) async fn register(&self, address: &str) -> bool {
        let mut backends = self.backends.write().await;
        if backends.iter().any(|b| b.address() == address) {
            return false;
        }
        backends.push(Backend::new(address));
        Selector::sort_by_latency(&mut backends);
        true
    }

    /// Open a connection to the lowest-latency backend matching `filter`.
    ///
    /// A failed dial marks the selected backend unavailable before the error
    /// is returned, so the next call picks a different backend even if its
    /// probing task has not run yet. The dial is never retried here.
    pub async fn acquire(
        &self,
        filter: RoleFilter,
        timeout: Duration,
    ) -> Result<TcpStream, RouteError> {
        self.acquire_with(filter, timeout, |address| async move {
            TcpStream::connect(address).await
        })
        .await
    }

    /// `acquire` with the dial supplied by the caller.
    pub(crate) async fn acquire_with<C, F>(
        &self,
        filter: RoleFilter,
        timeout: Duration,
        connect: C,
    ) -> Result<TcpStream, RouteError>
    where
        C: FnOnce(String) -> F,
        F: Future<Output = io::Result<TcpStream>>,
    {
        let address = {
            let backends = self.backends.read().await;
            match Selector::select(&backends, filter) {
                Some(backend) => backend.address().to_string(),
                None => return Err(RouteError::NoAvailableInstance),
            }
        };

        let result = match tokio::time::timeout(timeout, connect(address.clone())).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")),
        };

        match result {
            Ok(stream) => {
                tracing::trace!("routed {} connection to {}", filter, address);
                Ok(stream)
            }
            Err(source) => {
                tracing::warn!("backend {}: dial failed: {}", address, source);
                self.mark_unavailable(&address).await;
                Err(RouteError::Dial { address, source })
            }
        }
    }

    /// Apply a successful probe cycle: role, latency and re-sort under one
    /// write lock.
    pub(crate) async fn record_probe(&self, address: &str, role: Role, latency: Duration) {
        self.update(address, |b| b.record_probe(role, latency)).await;
    }

    pub(crate) async fn mark_unavailable(&self, address: &str) {
        self.update(address, Backend::mark_unavailable).await;
    }

    async fn update<F>(&self, address: &str, apply: F)
    where
        F: FnOnce(&mut Backend),
    {
        let mut backends = self.backends.write().await;
        if let Some(backend) = backends.iter_mut().find(|b| b.address() == address) {
            apply(backend);
            Selector::sort_by_latency(&mut backends);
        }
    }

    /// Point-in-time copy of the registry, in latency order.
    pub async fn snapshot(&self) -> Vec<Backend> {
        self.backends.read().await.clone()
    }

    /// Current role of `address`, if registered.
    pub async fn role_of(&self, address: &str) -> Option<Role> {
        self.backends
            .read()
            .await
            .iter()
            .find(|b| b.address() == address)
            .map(Backend::role)
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.read().await.is_empty()
    }

    /// Signal shutdown and wait for every probing task to exit.
    pub async fn shutdown(&self) {
        self.shutdown.shutdown();
        let probers = std::mem::take(&mut *self.probers.lock());
        for handle in probers {
            if let Err(e) = handle.await {
                tracing::error!("probing task failed: {}", e);
            }
        }
    }
}
