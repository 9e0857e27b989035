//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use replica_router::{
    BackendMonitor, HealthCheckConnector, HealthCheckSession, MonitorConfig, ProbeError, Role,
    ShutdownController,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// How a fake database node answers health checks.
#[derive(Debug, Clone, Copy)]
pub enum NodeState {
    Down,
    Primary(Duration),
    Follower(Duration),
}

/// In-memory cluster whose node states tests flip at will.
#[derive(Clone, Default)]
pub struct FakeCluster {
    nodes: Arc<Mutex<HashMap<String, NodeState>>>,
}

impl FakeCluster {
    pub fn set(&self, address: &str, state: NodeState) {
        self.nodes.lock().insert(address.to_string(), state);
    }

    fn state(&self, address: &str) -> NodeState {
        self.nodes
            .lock()
            .get(address)
            .copied()
            .unwrap_or(NodeState::Down)
    }
}

#[async_trait]
impl HealthCheckConnector for FakeCluster {
    async fn connect(&self, address: &str) -> Result<Box<dyn HealthCheckSession>, ProbeError> {
        match self.state(address) {
            NodeState::Down => Err(ProbeError::Connect("connection refused".to_string())),
            _ => Ok(Box::new(FakeSession {
                cluster: self.clone(),
                address: address.to_string(),
            })),
        }
    }
}

struct FakeSession {
    cluster: FakeCluster,
    address: String,
}

#[async_trait]
impl HealthCheckSession for FakeSession {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        match self.cluster.state(&self.address) {
            NodeState::Down => Err(ProbeError::Ping("connection reset".to_string())),
            _ => Ok(()),
        }
    }

    async fn is_in_recovery(&mut self) -> Result<bool, ProbeError> {
        match self.cluster.state(&self.address) {
            NodeState::Down => Err(ProbeError::Query("connection reset".to_string())),
            NodeState::Primary(delay) => {
                tokio::time::sleep(delay).await;
                Ok(false)
            }
            NodeState::Follower(delay) => {
                tokio::time::sleep(delay).await;
                Ok(true)
            }
        }
    }
}

pub fn create_monitor(cluster: &FakeCluster, interval: Duration) -> Arc<BackendMonitor> {
    BackendMonitor::new(
        Arc::new(cluster.clone()),
        MonitorConfig {
            interval,
            probe_timeout: Duration::from_secs(1),
        },
        ShutdownController::new(),
    )
}

/// Loopback listener that accepts and holds connections.
pub async fn spawn_listener() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Loopback address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Poll until `address` reports `role`, failing after two seconds.
pub async fn wait_for_role(monitor: &BackendMonitor, address: &str, role: Role) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while monitor.role_of(address).await != Some(role) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "backend {} never became {}",
            address,
            role
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
