//! Graceful shutdown signaling.
//!
//! A single process-wide flag backed by a watch channel. Long-lived
//! tasks check it at loop boundaries and select on [`Shutdown::wait`]
//! to break out of blocking awaits.

use tokio::sync::watch;
use tracing::warn;

/// Cloneable handle to the process-wide shutdown flag
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown handle
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Trip the flag; all waiters wake
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when shutdown is triggered
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Trip the flag once the process receives SIGINT (Ctrl+C) or, on
    /// Unix, SIGTERM
    pub async fn listen_for_signals(&self) {
        sigint_or_sigterm().await;
        self.trigger();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn sigint_or_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM listener unavailable ({}); stopping on Ctrl+C only", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigint_or_sigterm() {
    let _ = tokio::signal::ctrl_c().await;
}
