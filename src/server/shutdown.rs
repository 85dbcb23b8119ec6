use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Broadcasts one shutdown request to every front end.
///
/// Handles:
/// - signal reception (SIGTERM, SIGINT)
/// - programmatic shutdown, used by tests and by a front end that fails
/// - late subscribers, which still observe a shutdown that already happened
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        *self.tx.borrow()
    }

    /// Initiate shutdown and notify all waiters. Later calls do nothing.
    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            info!("Initiating graceful shutdown");
        }
    }

    /// Resolve once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|&stopping| stopping).await;
    }

    /// Wait for SIGINT or SIGTERM, then initiate shutdown.
    ///
    /// Also returns early if shutdown was initiated some other way.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown");
            },
            _ = self.wait() => return,
        }

        self.shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
