//! Backend Prober
//!
//! One probing task per backend. Every tick it makes sure a health-check
//! session is open, pings it, asks the backend whether it is in recovery
//! and reports role and latency back to the monitor.

use crate::domain::ports::{HealthCheckConnector, HealthCheckSession, ProbeError};
use crate::domain::value_objects::Role;
use crate::infrastructure::backend_monitor::{BackendMonitor, MonitorConfig};
use crate::infrastructure::shutdown::ShutdownController;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Probing state for a single backend.
pub(crate) struct Prober {
    address: String,
    monitor: Weak<BackendMonitor>,
    connector: Arc<dyn HealthCheckConnector>,
    config: MonitorConfig,
    /// Kept open across successful cycles, dropped on any failure
    session: Option<Box<dyn HealthCheckSession>>,
    /// Role reported by the previous cycle
    role: Role,
    /// Whether the previous cycle failed
    failing: bool,
}

impl Prober {
    pub(crate) fn new(
        address: String,
        monitor: Weak<BackendMonitor>,
        connector: Arc<dyn HealthCheckConnector>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            address,
            monitor,
            connector,
            config,
            session: None,
            role: Role::Unavailable,
            failing: false,
        }
    }

    /// Probe on every tick until shutdown or until the monitor is dropped.
    ///
    /// The first cycle runs immediately. A cycle that overruns the interval
    /// delays the next tick instead of bursting to catch up.
    pub(crate) async fn run(mut self, shutdown: ShutdownController) {
        tracing::info!("backend {}: starting monitoring", self.address);

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            let Some(monitor) = self.monitor.upgrade() else {
                break;
            };
            self.run_cycle(&monitor).await;
        }

        tracing::info!("backend {}: stopped monitoring", self.address);
    }

    /// Run one probe cycle and publish its result.
    pub(crate) async fn run_cycle(&mut self, monitor: &BackendMonitor) -> Role {
        let role = match self.probe().await {
            Ok((role, latency)) => {
                tracing::trace!("backend {}: {} in {:?}", self.address, role, latency);
                monitor.record_probe(&self.address, role, latency).await;
                self.failing = false;
                role
            }
            Err(e) => {
                // First failure of each outage at warn, repeats at debug
                if self.failing {
                    tracing::debug!("backend {}: {}", self.address, e);
                } else {
                    tracing::warn!("backend {}: {}", self.address, e);
                }
                self.failing = true;
                monitor.mark_unavailable(&self.address).await;
                Role::Unavailable
            }
        };

        if role != self.role {
            tracing::info!("backend {} is now {} (was {})", self.address, role, self.role);
            self.role = role;
        }
        role
    }

    /// Steps of a cycle up to the role query. Returns the role and the
    /// measured round trip of the role query.
    async fn probe(&mut self) -> Result<(Role, Duration), ProbeError> {
        let timeout = self.config.probe_timeout;

        // Taken out so any early return drops it
        let mut session = match self.session.take() {
            Some(session) => session,
            None => {
                let session =
                    bounded(timeout, "connect", self.connector.connect(&self.address)).await?;
                tracing::debug!("backend {}: health-check session opened", self.address);
                session
            }
        };

        bounded(timeout, "ping", session.ping()).await?;

        let started = Instant::now();
        let in_recovery = bounded(timeout, "role query", session.is_in_recovery()).await?;
        let latency = started.elapsed();

        self.session = Some(session);
        Ok((Role::from_recovery(in_recovery), latency))
    }
}

async fn bounded<T, F>(timeout: Duration, step: &'static str, fut: F) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(step)),
    }
}
