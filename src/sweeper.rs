//! Background removal of expired nonces
//!
//! Sweeping is storage hygiene only. Claim already rejects expired nonces,
//! so a late or failed sweep never affects login correctness.

use crate::nonce_storage::NonceStorage;
use crate::nonce_store::NonceStore;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running sweeper task
///
/// Dropping the handle stops the sweeper at its next wake-up. Keep it alive
/// for as long as sweeping should continue.
#[derive(Debug)]
#[must_use = "the sweeper stops when its handle is dropped"]
pub struct NonceSweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl NonceSweeperHandle {
    /// Stop after the current sweep, if any, and wait for the task to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Nonce sweeper task failed");
            }
        }
    }

    /// Stop immediately
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task that sweeps expired nonces every `interval`
///
/// The first sweep runs immediately. Sweep errors are logged and the task
/// keeps going. The task runs until [`NonceSweeperHandle::shutdown`] is
/// called or the handle is dropped.
#[must_use = "the sweeper stops when its handle is dropped"]
pub fn spawn_nonce_sweeper<S>(store: NonceStore<S>, interval: Duration) -> NonceSweeperHandle
where
    S: NonceStorage + 'static,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "Nonce sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.sweep_now().await {
                        Ok(removed) => {
                            tracing::debug!(removed, "Nonce sweep finished");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Nonce sweep failed");
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Nonce sweeper stopped");
    });

    NonceSweeperHandle { shutdown, task }
}
