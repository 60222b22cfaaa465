// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background polling of submitted simulations.
//!
//! In [`ReconcileMode::Monitor`](crate::config::ReconcileMode::Monitor) every
//! submitted simulation gets one task that polls its Job until a terminal
//! state or the deadline, whichever comes first:
//!
//! ```text
//! watch(id) ──► sleep(poll_interval) ──► get_job ──► observe ──► terminal? ──► exit
//!                    ▲                       │ error: skip tick        │ no
//!                    └───────────────────────┴─────────────────────────┘
//!               deadline reached ──► fail(TIMEOUT) ──► exit
//!               cancelled (delete / shutdown) ──► exit
//! ```
//!
//! The task is the only writer of its simulation's status; it applies
//! observations with the same transition rules as read reconciliation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cluster::ClusterClient;
use crate::error::{Error, ErrorCode};
use crate::store::Store;
use crate::types::{Simulation, SimulationStatus, WorkloadError};

/// Configuration for the workload monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// How often each Job is polled.
    pub poll_interval: Duration,
    /// Time from submission after which a non-terminal simulation fails.
    pub deadline: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            deadline: Duration::from_secs(30 * 60),
        }
    }
}

/// How a monitor task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The Job completed.
    Completed,
    /// The Job failed.
    Failed,
    /// The deadline passed and the simulation was force-failed.
    TimedOut,
    /// The task was cancelled (delete or shutdown).
    Cancelled,
    /// The record was deleted out from under the task.
    Vanished,
}

/// Spawns and tracks one polling task per simulation.
pub struct WorkloadMonitor {
    store: Arc<dyn Store<Simulation>>,
    cluster: Arc<dyn ClusterClient>,
    config: MonitorConfig,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl WorkloadMonitor {
    /// Create a monitor.
    pub fn new(
        store: Arc<dyn Store<Simulation>>,
        cluster: Arc<dyn ClusterClient>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            cluster,
            config,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Monitor configuration.
    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    /// Start polling a simulation. The deadline counts from this call.
    pub async fn watch(&self, simulation_id: &str) -> JoinHandle<MonitorOutcome> {
        let token = self.shutdown.child_token();
        self.tokens
            .lock()
            .await
            .insert(simulation_id.to_string(), token.clone());

        let task = MonitorTask {
            store: self.store.clone(),
            cluster: self.cluster.clone(),
            config: self.config,
            simulation_id: simulation_id.to_string(),
            deadline: Instant::now() + self.config.deadline,
            token,
        };
        let tokens = self.tokens.clone();

        self.tracker.spawn(async move {
            let id = task.simulation_id.clone();
            let outcome = task.run().await;
            tokens.lock().await.remove(&id);
            outcome
        })
    }

    /// Stop polling a simulation. Unknown ids are ignored.
    pub async fn cancel(&self, simulation_id: &str) {
        if let Some(token) = self.tokens.lock().await.remove(simulation_id) {
            token.cancel();
        }
    }

    /// Number of simulations currently being polled.
    pub async fn active(&self) -> usize {
        self.tokens.lock().await.len()
    }

    /// Cancel every task and wait for all of them to exit.
    pub async fn shutdown(&self) {
        info!(active = self.tracker.len(), "Workload monitor shutting down");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Workload monitor stopped");
    }
}

struct MonitorTask {
    store: Arc<dyn Store<Simulation>>,
    cluster: Arc<dyn ClusterClient>,
    config: MonitorConfig,
    simulation_id: String,
    deadline: Instant,
    token: CancellationToken,
}

impl MonitorTask {
    async fn run(self) -> MonitorOutcome {
        debug!(
            simulation_id = %self.simulation_id,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            deadline_secs = self.config.deadline.as_secs(),
            "Monitor started"
        );

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => {
                    break MonitorOutcome::Cancelled;
                }

                _ = tokio::time::sleep_until(self.deadline) => {
                    break self.expire().await;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    // An in-flight poll must not hold off cancellation or the deadline.
                    tokio::select! {
                        biased;

                        _ = self.token.cancelled() => {
                            break MonitorOutcome::Cancelled;
                        }

                        _ = tokio::time::sleep_until(self.deadline) => {
                            break self.expire().await;
                        }

                        polled = self.tick() => {
                            if let Some(outcome) = polled {
                                break outcome;
                            }
                        }
                    }
                }
            }
        };

        debug!(simulation_id = %self.simulation_id, outcome = ?outcome, "Monitor exited");
        outcome
    }

    /// One poll. Returns an outcome when the task should stop.
    async fn tick(&self) -> Option<MonitorOutcome> {
        let unit = crate::types::simulation_unit_name(&self.simulation_id);
        let observed = match self.cluster.get_job(&unit).await {
            Ok(job) => job.status(),
            Err(e) => {
                warn!(
                    simulation_id = %self.simulation_id,
                    error = %e,
                    "Job status query failed; skipping tick"
                );
                return None;
            }
        };

        let now = Utc::now();
        let result = self
            .store
            .update_with(
                &self.simulation_id,
                Box::new(move |sim: &mut Simulation| sim.observe(observed, now)),
            )
            .await;

        match result {
            Ok((sim, changed)) => {
                if changed {
                    info!(
                        simulation_id = %self.simulation_id,
                        status = %sim.status,
                        "Simulation status changed"
                    );
                }
                match sim.status {
                    SimulationStatus::Completed => Some(MonitorOutcome::Completed),
                    SimulationStatus::Failed => Some(MonitorOutcome::Failed),
                    _ => None,
                }
            }
            Err(Error::NotFound { .. }) => Some(MonitorOutcome::Vanished),
            Err(e) => {
                warn!(
                    simulation_id = %self.simulation_id,
                    error = %e,
                    "Failed to record observed status"
                );
                None
            }
        }
    }

    async fn expire(&self) -> MonitorOutcome {
        let error = WorkloadError::new(
            ErrorCode::Timeout,
            format!(
                "Job timeout: no terminal state within {}s",
                self.config.deadline.as_secs()
            ),
        );
        let now = Utc::now();
        let result = self
            .store
            .update_with(
                &self.simulation_id,
                Box::new(move |sim: &mut Simulation| sim.fail(error, now)),
            )
            .await;

        match result {
            Ok((_, true)) => {
                warn!(
                    simulation_id = %self.simulation_id,
                    deadline_secs = self.config.deadline.as_secs(),
                    "Simulation timed out"
                );
                MonitorOutcome::TimedOut
            }
            Ok((sim, false)) if sim.status == SimulationStatus::Completed => {
                MonitorOutcome::Completed
            }
            Ok(_) => MonitorOutcome::Failed,
            Err(Error::NotFound { .. }) => MonitorOutcome::Vanished,
            Err(e) => {
                warn!(
                    simulation_id = %self.simulation_id,
                    error = %e,
                    "Failed to record timeout"
                );
                MonitorOutcome::TimedOut
            }
        }
    }
}
