//! Graceful Shutdown Handler
//!
//! One signal stops the endpoint listeners, the status API and every
//! probing task. Spliced client sessions are counted so the process can
//! wait for them to drain.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;

/// Shutdown coordinator shared by all long-running tasks.
#[derive(Clone)]
pub struct ShutdownController {
    initiated: Arc<AtomicBool>,
    active_sessions: Arc<AtomicUsize>,
    signal_tx: broadcast::Sender<()>,
    drained: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (signal_tx, _) = broadcast::channel(1);
        Self {
            initiated: Arc::new(AtomicBool::new(false)),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            signal_tx,
            drained: Arc::new(Notify::new()),
        }
    }

    /// Initiate shutdown. Only the first call has any effect.
    pub fn shutdown(&self) {
        if !self.initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating shutdown");
            let _ = self.signal_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been initiated, including when it already
    /// was before the call.
    pub async fn cancelled(&self) {
        let mut rx = self.signal_tx.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Number of client sessions currently spliced to a backend.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Track a client session until the guard is dropped.
    pub fn session_guard(&self) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            controller: self.clone(),
        }
    }

    fn session_ended(&self) {
        if self.active_sessions.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Wait until no sessions remain, or `timeout` elapses.
    ///
    /// Returns whether the drain completed.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                if self.active_sessions() == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    "drain timeout: {} client sessions still active",
                    self.active_sessions()
                );
                false
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one spliced client session.
pub struct SessionGuard {
    controller: ShutdownController,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.controller.session_ended();
    }
}

/// Wait for Ctrl+C or SIGTERM, then initiate shutdown.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM");
        }
    }

    controller.shutdown();
}
