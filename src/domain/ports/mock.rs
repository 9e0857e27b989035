//! Scripted health-check transport for unit tests.

use super::{HealthCheckConnector, HealthCheckSession, ProbeError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted backend answers on each step of a probe cycle.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub connect_ok: bool,
    pub ping_ok: bool,
    /// `None` makes the role query fail
    pub in_recovery: Option<bool>,
    pub query_delay: Duration,
}

impl Script {
    pub fn primary() -> Self {
        Self {
            connect_ok: true,
            ping_ok: true,
            in_recovery: Some(false),
            query_delay: Duration::ZERO,
        }
    }

    pub fn follower() -> Self {
        Self {
            in_recovery: Some(true),
            ..Self::primary()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            connect_ok: false,
            ..Self::primary()
        }
    }
}

type Scripts = Arc<Mutex<HashMap<String, Script>>>;

fn lookup(scripts: &Scripts, address: &str) -> Script {
    scripts
        .lock()
        .get(address)
        .copied()
        .unwrap_or_else(Script::unreachable)
}

/// Connector whose backends answer from a script that tests can change
/// between cycles. Open sessions see changes immediately.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Scripts,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, address: &str, script: Script) {
        self.scripts.lock().insert(address.to_string(), script);
    }

    /// Number of sessions opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheckConnector for ScriptedConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn HealthCheckSession>, ProbeError> {
        if !lookup(&self.scripts, address).connect_ok {
            return Err(ProbeError::Connect("connection refused".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            scripts: self.scripts.clone(),
            address: address.to_string(),
        }))
    }
}

struct ScriptedSession {
    scripts: Scripts,
    address: String,
}

#[async_trait]
impl HealthCheckSession for ScriptedSession {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        if lookup(&self.scripts, &self.address).ping_ok {
            Ok(())
        } else {
            Err(ProbeError::Ping("server closed the connection".to_string()))
        }
    }

    async fn is_in_recovery(&mut self) -> Result<bool, ProbeError> {
        let script = lookup(&self.scripts, &self.address);
        if !script.query_delay.is_zero() {
            tokio::time::sleep(script.query_delay).await;
        }
        script
            .in_recovery
            .ok_or_else(|| ProbeError::Query("unexpected result".to_string()))
    }
}
