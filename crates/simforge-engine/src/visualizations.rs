// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Visualization session use cases.
//!
//! Sessions are always reconciled on read; no monitor task owns them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterClient, ClusterError};
use crate::error::{Error, Result};
use crate::spec::{SpecBuilder, UnitKind, VISUALIZATION_PORT};
use crate::store::Store;
use crate::types::{
    Visualization, VisualizationStatus, is_workload_id, new_workload_id, visualization_unit_name,
};

/// Creates, reads and deletes visualization sessions.
pub struct VisualizationService {
    store: Arc<dyn Store<Visualization>>,
    cluster: Arc<dyn ClusterClient>,
    builder: Arc<SpecBuilder>,
}

impl VisualizationService {
    /// Create a service.
    pub fn new(
        store: Arc<dyn Store<Visualization>>,
        cluster: Arc<dyn ClusterClient>,
        builder: Arc<SpecBuilder>,
    ) -> Self {
        Self {
            store,
            cluster,
            builder,
        }
    }

    /// Start a session over a simulation's results.
    ///
    /// `result_location` defaults to the simulation id. The simulation itself
    /// is not looked up.
    pub async fn create(
        &self,
        simulation_id: &str,
        result_location: Option<&str>,
    ) -> Result<Visualization> {
        let simulation_id = simulation_id.trim();
        if simulation_id.is_empty() {
            return Err(Error::InvalidRequest("simulationId is required".to_string()));
        }
        let result_location = result_location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(simulation_id);

        let id = new_workload_id();
        let spec = self.builder.build_visualization(&id, result_location)?;

        self.cluster.create(&spec).await.map_err(|e| {
            warn!(visualization_id = %id, unit = %spec.name, error = %e, "Pod submission failed");
            Error::from(e)
        })?;

        let viz = Visualization::new(&id, simulation_id, result_location, Utc::now());
        if let Err(e) = self.store.create(viz.clone()).await {
            error!(
                visualization_id = %id,
                unit = %spec.name,
                error = %e,
                "Pod submitted but visualization record could not be saved"
            );
            return Err(Error::Unrecorded {
                unit: spec.name,
                reason: e.to_string(),
            });
        }

        info!(
            visualization_id = %id,
            simulation_id = %simulation_id,
            unit = %spec.name,
            "Visualization submitted"
        );
        Ok(viz)
    }

    /// Fetch a session, merging in the Pod's observed status.
    pub async fn get(&self, id: &str) -> Result<Visualization> {
        let viz = self.store.get(id).await?;
        if viz.status.is_terminal() {
            return Ok(viz);
        }

        let observed = match self.cluster.get_pod(&viz.pod_name).await {
            Ok(pod) => pod.status(),
            Err(e) => {
                warn!(visualization_id = %id, error = %e, "Pod status query failed");
                return Ok(viz);
            }
        };
        if observed == viz.status {
            return Ok(viz);
        }

        let now = Utc::now();
        match self
            .store
            .update_with(
                id,
                Box::new(move |v: &mut Visualization| v.observe(observed, now)),
            )
            .await
        {
            Ok((merged, changed)) => {
                if changed {
                    info!(
                        visualization_id = %id,
                        from = %viz.status,
                        to = %merged.status,
                        "Visualization status changed"
                    );
                }
                Ok(merged)
            }
            Err(e) => {
                warn!(visualization_id = %id, error = %e, "Failed to record observed status");
                Ok(viz)
            }
        }
    }

    /// Websocket endpoint of a ready session.
    ///
    /// Fails with `NotReady` for any status other than ready. The resolved
    /// endpoint is cached on the record and reused until the Pod's UID
    /// changes.
    pub async fn websocket_url(&self, id: &str) -> Result<String> {
        let viz = self.get(id).await?;
        if viz.status != VisualizationStatus::Ready {
            return Err(Error::NotReady(format!(
                "visualization {} is {}",
                id, viz.status
            )));
        }

        let pod = match self.cluster.get_pod(&viz.pod_name).await {
            Ok(pod) => pod,
            Err(e) => {
                if let Some(url) = viz.websocket_url {
                    warn!(visualization_id = %id, error = %e, "Pod query failed; serving cached endpoint");
                    return Ok(url);
                }
                return Err(e.into());
            }
        };

        if let Some(url) = &viz.websocket_url
            && pod.uid == viz.pod_uid
        {
            return Ok(url.clone());
        }

        let ip = pod.address(&viz.pod_name).map_err(|e| match e {
            ClusterError::NotAssigned(unit) => {
                Error::NotReady(format!("{} has no network address yet", unit))
            }
            other => Error::from(other),
        })?;
        let url = format!("ws://{}:{}/ws", ip, VISUALIZATION_PORT);

        if viz.websocket_url.is_some() {
            info!(visualization_id = %id, "Visualization pod recreated; endpoint re-resolved");
        }

        let now = Utc::now();
        let endpoint = url.clone();
        let uid = pod.uid.clone();
        if let Err(e) = self
            .store
            .update_with(
                id,
                Box::new(move |v: &mut Visualization| {
                    v.set_endpoint(endpoint, uid, now);
                    true
                }),
            )
            .await
        {
            warn!(visualization_id = %id, error = %e, "Failed to cache endpoint");
        }

        Ok(url)
    }

    /// Sessions opened for a simulation, oldest first. Not reconciled.
    pub async fn list_by_simulation(&self, simulation_id: &str) -> Result<Vec<Visualization>> {
        let mut sessions: Vec<Visualization> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|v| v.simulation_id == simulation_id)
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    /// Delete the Pod, then the record.
    ///
    /// Like simulation deletion, an id with no record still releases a Pod
    /// of that name and succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let unit = match self.store.get(id).await {
            Ok(viz) => viz.pod_name,
            Err(Error::NotFound { .. }) if is_workload_id(id) => visualization_unit_name(id),
            Err(Error::NotFound { .. }) => {
                debug!(visualization_id = %id, "No visualization to delete");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match self.cluster.delete(UnitKind::Pod, &unit).await {
            Ok(()) => {}
            Err(ClusterError::NotFound(_)) => {
                debug!(visualization_id = %id, unit = %unit, "Pod already gone");
            }
            Err(e) => {
                warn!(visualization_id = %id, error = %e, "Pod deletion failed; keeping record");
                return Err(e.into());
            }
        }

        match self.store.delete(id).await {
            Ok(()) | Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        info!(visualization_id = %id, "Visualization deleted");
        Ok(())
    }
}
