// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Simulation use cases.
//!
//! Submission order is build spec, submit to the cluster, then persist the
//! pending record, so a record never exists for a Job that was not
//! submitted. Deletion runs the other way: cluster first, then the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterClient, ClusterError};
use crate::config::ReconcileMode;
use crate::error::{Error, Result};
use crate::monitor::WorkloadMonitor;
use crate::results::{ResultArchive, ResultsVolume};
use crate::spec::{SpecBuilder, UnitKind};
use crate::store::Store;
use crate::types::{
    Simulation, SimulationType, is_workload_id, new_workload_id, simulation_unit_name,
};
use crate::uploads::UploadStaging;
use crate::validator;

/// Creates, reads, lists and deletes simulations.
pub struct SimulationService {
    store: Arc<dyn Store<Simulation>>,
    cluster: Arc<dyn ClusterClient>,
    builder: Arc<SpecBuilder>,
    staging: UploadStaging,
    results: ResultsVolume,
    monitor: Option<Arc<WorkloadMonitor>>,
    list_item_budget: Duration,
}

impl SimulationService {
    /// Create a service.
    ///
    /// Passing a monitor puts the service in monitor mode: every submission
    /// is handed to the monitor and reads never write status.
    pub fn new(
        store: Arc<dyn Store<Simulation>>,
        cluster: Arc<dyn ClusterClient>,
        builder: Arc<SpecBuilder>,
        staging: UploadStaging,
        results: ResultsVolume,
        monitor: Option<Arc<WorkloadMonitor>>,
        list_item_budget: Duration,
    ) -> Self {
        Self {
            store,
            cluster,
            builder,
            staging,
            results,
            monitor,
            list_item_budget,
        }
    }

    /// Which path owns status writes.
    pub fn reconcile_mode(&self) -> ReconcileMode {
        if self.monitor.is_some() {
            ReconcileMode::Monitor
        } else {
            ReconcileMode::OnRead
        }
    }

    /// Submit a simulation whose input is already staged at `input_location`.
    pub async fn create(
        &self,
        name: &str,
        sim_type: SimulationType,
        input_location: &str,
    ) -> Result<Simulation> {
        let name = check_name(name)?;
        self.submit(new_workload_id(), name, sim_type, input_location)
            .await
    }

    /// Validate an upload, stage it, and submit a simulation over it.
    ///
    /// The staged directory is removed again if staging or submission
    /// fails.
    pub async fn create_with_upload(
        &self,
        name: &str,
        sim_type: SimulationType,
        filename: &str,
        content: &[u8],
    ) -> Result<Simulation> {
        let name = check_name(name)?;
        validator::validate(sim_type, filename, content.len() as u64, content)?;

        let id = new_workload_id();
        if let Err(e) = self.staging.stage(&id, sim_type, filename, content).await {
            self.discard_staged(&id).await;
            return Err(e);
        }

        match self.submit(id.clone(), name, sim_type, &id).await {
            Ok(sim) => Ok(sim),
            // The Job exists and reads its input from the staged directory.
            Err(e @ Error::Unrecorded { .. }) => Err(e),
            Err(e) => {
                self.discard_staged(&id).await;
                Err(e)
            }
        }
    }

    async fn discard_staged(&self, id: &str) {
        if let Err(cleanup) = self.staging.discard(id).await {
            warn!(simulation_id = %id, error = %cleanup, "Failed to discard staged upload");
        }
    }

    async fn submit(
        &self,
        id: String,
        name: &str,
        sim_type: SimulationType,
        input_location: &str,
    ) -> Result<Simulation> {
        let spec = self
            .builder
            .build_simulation(&id, sim_type, input_location)?;

        self.cluster.create(&spec).await.map_err(|e| {
            warn!(simulation_id = %id, unit = %spec.name, error = %e, "Job submission failed");
            Error::from(e)
        })?;

        let sim = Simulation::new(&id, name, sim_type, input_location, Utc::now());
        if let Err(e) = self.store.create(sim.clone()).await {
            error!(
                simulation_id = %id,
                unit = %spec.name,
                error = %e,
                "Job submitted but simulation record could not be saved"
            );
            return Err(Error::Unrecorded {
                unit: spec.name,
                reason: e.to_string(),
            });
        }

        info!(
            simulation_id = %id,
            sim_type = %sim_type,
            unit = %spec.name,
            backend = self.cluster.backend(),
            "Simulation submitted"
        );

        if let Some(monitor) = &self.monitor {
            monitor.watch(&id).await;
        }
        Ok(sim)
    }

    /// Fetch a simulation, merging in the cluster's view when reads own
    /// status.
    pub async fn get(&self, id: &str) -> Result<Simulation> {
        let sim = self.store.get(id).await?;
        if self.monitor.is_some() || sim.status.is_terminal() {
            return Ok(sim);
        }
        Ok(self.reconcile(sim).await)
    }

    /// All simulations, newest first.
    ///
    /// When reads own status, every non-terminal item is reconciled
    /// concurrently; an item whose reconciliation exceeds the per-item budget
    /// is returned as stored.
    pub async fn list(&self) -> Result<Vec<Simulation>> {
        let snapshot = self.store.list().await?;

        let mut sims = if self.monitor.is_some() {
            snapshot
        } else {
            let budget = self.list_item_budget;
            join_all(snapshot.into_iter().map(|sim| async move {
                if sim.status.is_terminal() {
                    return sim;
                }
                let stored = sim.clone();
                match tokio::time::timeout(budget, self.reconcile(sim)).await {
                    Ok(merged) => merged,
                    Err(_) => {
                        debug!(
                            simulation_id = %stored.id,
                            budget_ms = budget.as_millis() as u64,
                            "Reconcile over budget; returning stored record"
                        );
                        stored
                    }
                }
            }))
            .await
        };

        sims.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sims)
    }

    /// Stream a simulation's result directory as a `.tar.gz`.
    ///
    /// Fails with `NotFound` for an unknown simulation or one whose solver
    /// has not written any results yet. Status is not consulted.
    pub async fn results(&self, id: &str) -> Result<ResultArchive> {
        let sim = self.store.get(id).await?;
        self.results.archive(&sim.id, &sim.result_path).await
    }

    /// Delete the Job, then the record.
    ///
    /// A Job that no longer exists counts as deleted. Any other cluster
    /// failure leaves the record in place. Deleting an id with no record
    /// still releases a Job of that name, so repeated deletes succeed.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let unit = match self.store.get(id).await {
            Ok(sim) => sim.pod_name,
            Err(Error::NotFound { .. }) if is_workload_id(id) => simulation_unit_name(id),
            Err(Error::NotFound { .. }) => {
                debug!(simulation_id = %id, "No simulation to delete");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match self.cluster.delete(UnitKind::Job, &unit).await {
            Ok(()) => {}
            Err(ClusterError::NotFound(_)) => {
                debug!(simulation_id = %id, unit = %unit, "Job already gone");
            }
            Err(e) => {
                warn!(simulation_id = %id, error = %e, "Job deletion failed; keeping record");
                return Err(e.into());
            }
        }

        if let Some(monitor) = &self.monitor {
            monitor.cancel(id).await;
        }
        match self.store.delete(id).await {
            Ok(()) | Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        info!(simulation_id = %id, "Simulation deleted");
        Ok(())
    }

    /// Merge the Job's observed status into a stored record.
    ///
    /// Cluster or store failures are logged and the given record returned.
    async fn reconcile(&self, sim: Simulation) -> Simulation {
        let observed = match self.cluster.get_job(&sim.pod_name).await {
            Ok(job) => job.status(),
            Err(e) => {
                warn!(simulation_id = %sim.id, error = %e, "Job status query failed");
                return sim;
            }
        };
        if observed == sim.status {
            return sim;
        }

        let now = Utc::now();
        let result = self
            .store
            .update_with(
                &sim.id,
                Box::new(move |s: &mut Simulation| s.observe(observed, now)),
            )
            .await;

        match result {
            Ok((merged, changed)) => {
                if changed {
                    info!(
                        simulation_id = %merged.id,
                        from = %sim.status,
                        to = %merged.status,
                        "Simulation status changed"
                    );
                }
                merged
            }
            Err(e) => {
                warn!(simulation_id = %sim.id, error = %e, "Failed to record observed status");
                sim
            }
        }
    }
}

fn check_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidRequest("name is required".to_string()));
    }
    Ok(name)
}
