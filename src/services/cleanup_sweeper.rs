//! Periodic removal of registry keys that have lost their expiry.
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::domain::{SessionRegistry, StoreError};

pub struct CleanupSweeper {
    registry: Arc<dyn SessionRegistry>,
    interval: Duration,
    jitter: bool,
}

impl CleanupSweeper {
    pub fn new(registry: Arc<dyn SessionRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            // tokio panics on a zero period
            interval: interval.max(Duration::from_millis(1)),
            jitter: true,
        }
    }

    /// Run the first tick immediately instead of after a random delay.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// One sweep over the registry.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let removed = self.registry.sweep_orphans().await?;
        if removed > 0 {
            info!(removed, "removed orphaned session keys");
        } else {
            debug!("no orphaned session keys");
        }
        Ok(removed)
    }

    /// Start the sweeper in a background task.
    pub fn start(self) -> SweeperHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown, task }
    }

    /// Loop until `shutdown` carries `true` or its sender is dropped. A
    /// failed tick is logged and retried on the next one.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let delay = if self.jitter {
            let max_ms = self.interval.as_millis().min(u64::MAX as u128) as u64;
            Duration::from_millis(rand::rng().random_range(0..=max_ms))
        } else {
            Duration::ZERO
        };

        info!(
            interval_secs = self.interval.as_secs(),
            initial_delay_ms = delay.as_millis() as u64,
            "cleanup sweeper started"
        );

        let mut ticker = interval_at(Instant::now() + delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "cleanup sweep failed, retrying next interval");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("cleanup sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "cleanup sweeper task failed");
        }
    }
}
