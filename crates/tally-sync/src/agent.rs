//! # Foreground Sync Agent
//!
//! Runs sync passes while the app is in the foreground.
//!
//! ## Agent Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncAgent task                                 │
//! │                                                                         │
//! │   tokio::select! {                                                      │
//! │     connectivity → Online   ──► sync_all()   (reconnect drain)          │
//! │     connectivity → Offline  ──► nothing                                 │
//! │     interval.tick()         ──► sync_all() if online                    │
//! │     shutdown_rx.recv()      ──► break, drop Subscription                │
//! │   }                                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Overlapping triggers are harmless: a pass already running on the engine
//! turns the next `sync_all` into a no-op.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

/// Default interval between polling passes while online.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Drives a [`SyncEngine`] from connectivity changes and a timer.
pub struct SyncAgent {
    engine: Arc<SyncEngine>,
    connectivity: ConnectivityMonitor,
    poll_interval: Duration,
}

/// Handle to a running agent.
pub struct SyncAgentHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncAgentHandle {
    /// Stops the agent and waits for its task to finish.
    ///
    /// A pass in progress is allowed to complete first.
    pub async fn shutdown(self) -> SyncResult<()> {
        // The task may already be gone; joining below reports that.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| SyncError::ChannelError(format!("agent task: {e}")))
    }
}

impl SyncAgent {
    pub fn new(engine: Arc<SyncEngine>, connectivity: ConnectivityMonitor) -> Self {
        SyncAgent {
            engine,
            connectivity,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawns the agent loop on the current runtime.
    pub fn start(self) -> SyncAgentHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        let subscription = self.connectivity.subscribe(move |status| {
            // Receiver gone means the agent stopped.
            let _ = status_tx.send(status);
        });

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            online = self.connectivity.is_online(),
            "Starting sync agent"
        );

        let task = tokio::spawn(async move {
            // Owned by the task; dropping it unregisters the listener.
            let _subscription = subscription;
            self.run(status_rx, shutdown_rx).await;
        });

        SyncAgentHandle { shutdown_tx, task }
    }

    async fn run(
        self,
        mut status_rx: mpsc::UnboundedReceiver<ConnectivityStatus>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.connectivity.is_online() {
                        self.run_pass("poll").await;
                    }
                }

                Some(status) = status_rx.recv() => {
                    if status.is_online() {
                        self.run_pass("reconnect").await;
                    } else {
                        debug!("Went offline, passes paused");
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Sync agent received shutdown");
                    break;
                }
            }
        }

        info!("Sync agent stopped");
    }

    async fn run_pass(&self, reason: &'static str) {
        debug!(reason, "Sync pass requested");
        if let Err(e) = self.engine.sync_all().await {
            error!(reason, error = %e, "Sync pass failed");
        }
    }
}
