//! Operator interrupt handling
//!
//! The driver only looks at the signal between pages: a request already in
//! flight is allowed to finish, retry waits are cut short, and no new request
//! starts once shutdown was requested.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared shutdown flag that can also be awaited
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Check if shutdown was requested
    pub fn is_shutdown_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Request shutdown
    pub fn request_shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Resolve once shutdown has been requested
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

/// Create a shutdown signal that listens for SIGINT/SIGTERM
#[cfg(unix)]
pub fn shutdown_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, finishing current page before exit");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, finishing current page before exit");
            }
        }

        trigger.request_shutdown();
    });

    Ok(shutdown)
}

/// Create a shutdown signal that listens for Ctrl+C
#[cfg(not(unix))]
pub fn shutdown_signal() -> std::io::Result<ShutdownSignal> {
    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, finishing current page before exit");
            }
            Err(e) => {
                tracing::warn!("Failed to listen for Ctrl+C signal: {}", e);
                return;
            }
        }

        trigger.request_shutdown();
    });

    Ok(shutdown)
}
