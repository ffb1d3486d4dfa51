//! Background sweep of expired cache entries.
//!
//! The sweep task is owned by a [`SweepHandle`]. It runs until the handle is
//! shut down or dropped, or until the cache itself is dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::EphemeralCache;

/// Handle to a running sweep task.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<usize>>,
}

impl SweepHandle {
    /// Stops the sweep task and waits for it to finish.
    ///
    /// Returns the number of entries the task removed over its lifetime.
    pub async fn shutdown(mut self) -> usize {
        let _ = self.shutdown_tx.send(true);
        let Some(task) = self.task.take() else {
            return 0;
        };
        match task.await {
            Ok(swept) => swept,
            Err(e) => {
                warn!(error = %e, "cache sweep task did not shut down cleanly");
                0
            }
        }
    }

    /// Returns true while the task is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl EphemeralCache {
    /// Starts the background sweep at the configured interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweepHandle {
        self.spawn_sweeper_every(self.config().sweep_interval())
    }

    /// Starts the background sweep with a custom period.
    pub fn spawn_sweeper_every(self: &Arc<Self>, period: Duration) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(sweep_task(Arc::downgrade(self), period, shutdown_rx));
        SweepHandle {
            shutdown_tx,
            task: Some(task),
        }
    }
}

async fn sweep_task(
    cache: Weak<EphemeralCache>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = period.as_secs(), "cache sweep task started");

    let mut total = 0;
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let swept = cache.sweep();
                total += swept;
                if swept > 0 {
                    debug!(swept, remaining = cache.len(), "swept expired cache entries");
                }
            }
        }
    }

    info!(total_swept = total, "cache sweep task stopped");
    total
}
