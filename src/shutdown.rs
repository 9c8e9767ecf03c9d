//! Cooperative shutdown coordination
//!
//! A single flag flips from "running" to "shutdown requested" exactly once.
//! Remote calls check it right before they are issued, and sleeps in the
//! retrier and the poll loop wake up early when it flips.

use crate::error::TrackerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    wake: Notify,
}

/// Handle to the process-wide shutdown flag
///
/// Cloning is cheap; every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Idempotent.
    ///
    /// Returns true for the call that actually flipped the flag.
    pub fn request_shutdown(&self) -> bool {
        let first = !self.inner.requested.swap(true, Ordering::SeqCst);
        if first {
            self.inner.wake.notify_waiters();
        }
        first
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Fails with `ShutdownRequested` once shutdown has been requested
    ///
    /// Call this immediately before issuing a remote request.
    pub fn ensure_running(&self) -> Result<(), TrackerError> {
        if self.is_shutdown_requested() {
            Err(TrackerError::ShutdownRequested)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless shutdown is requested first
    ///
    /// Returns true if the full duration elapsed, false if the sleep was cut
    /// short (or never started) because of a shutdown request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        // Registered before the flag check so a request landing in between still wakes us.
        let notified = self.inner.wake.notified();
        if self.is_shutdown_requested() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_shutdown_requested(),
            _ = notified => false,
        }
    }

    /// Spawns a task that requests shutdown on Ctrl-C
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutting down…");
                    coordinator.request_shutdown();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_one_way_and_idempotent() {
        let shutdown = ShutdownCoordinator::new();
        assert!(!shutdown.is_shutdown_requested());
        assert!(shutdown.ensure_running().is_ok());

        assert!(shutdown.request_shutdown());
        assert!(!shutdown.request_shutdown());
        assert!(shutdown.is_shutdown_requested());
        assert!(matches!(
            shutdown.ensure_running(),
            Err(TrackerError::ShutdownRequested)
        ));
    }

    #[test]
    fn test_clones_share_flag() {
        let shutdown = ShutdownCoordinator::new();
        let other = shutdown.clone();
        other.request_shutdown();
        assert!(shutdown.is_shutdown_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_when_running() {
        let shutdown = ShutdownCoordinator::new();
        let start = tokio::time::Instant::now();
        assert!(shutdown.sleep(Duration::from_secs(3)).await);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_returns_early_on_shutdown() {
        let shutdown = ShutdownCoordinator::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.request_shutdown();
        });

        let start = tokio::time::Instant::now();
        assert!(!shutdown.sleep(Duration::from_secs(900)).await);
        assert!(start.elapsed() < Duration::from_secs(900));
    }

    #[tokio::test]
    async fn test_sleep_skipped_after_shutdown() {
        let shutdown = ShutdownCoordinator::new();
        shutdown.request_shutdown();
        assert!(!shutdown.sleep(Duration::from_secs(3600)).await);
    }
}
