//! SweeperService - periodic inactivity expiry
//!
//! Runs the lifecycle engine's sweep on a fixed interval, independent of any
//! request. The spawned task is explicitly owned: its abort handle is kept so
//! shutdown can stop it, rather than leaving an unmanaged ambient timer.

use std::sync::Arc;
use std::time::Duration;

use sesctl_core::SessionEngine;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Owns the recurring sweep task.
pub struct SweeperService {
    engine: Arc<SessionEngine>,
    handle: Mutex<Option<tokio::task::AbortHandle>>,
}

impl SweeperService {
    pub fn new(engine: Arc<SessionEngine>) -> Self {
        Self {
            engine,
            handle: Mutex::new(None),
        }
    }

    /// Start the periodic sweep. Restarting replaces the previous task.
    pub async fn start(&self, period: Duration) {
        let mut handle = self.handle.lock().await;
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        info!(interval_secs = period.as_secs(), "Starting session sweeper");

        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move {
            let mut tick = interval(period);
            // The first tick fires immediately; skip it so a fresh start
            // does not race session creation during boot.
            tick.tick().await;

            loop {
                tick.tick().await;
                match engine.sweep_expired() {
                    Ok(outcome) => {
                        if outcome.expired > 0 {
                            info!(
                                examined = outcome.examined,
                                expired = outcome.expired,
                                "Sweep expired idle sessions"
                            );
                        } else {
                            debug!(examined = outcome.examined, "Sweep pass clean");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Sweep pass failed");
                    }
                }
            }
        });

        *handle = Some(task.abort_handle());
    }

    /// Stop the sweep task if running.
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(task) = handle.take() {
            task.abort();
            info!("Stopped session sweeper");
        }
    }

    /// Whether the sweep task is currently scheduled.
    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}
