// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable engine runtime.
//!
//! [`EngineRuntime`] wires stores, the cluster client, the spec builder and
//! (in monitor mode) the workload monitor into the two use-case services.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use simforge_engine::{Config, EngineRuntime};
//! use simforge_engine::cluster::KubeCluster;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let cluster = Arc::new(KubeCluster::new(&config.kube)?);
//!
//!     let runtime = EngineRuntime::builder()
//!         .config(&config)
//!         .cluster(cluster)
//!         .build()?;
//!
//!     let sim = runtime.simulations().get("3f9a1c0b2d4e").await?;
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cluster::{ClusterClient, KubeCluster};
use crate::config::{Config, ConfigError, ReconcileMode};
use crate::error::Result;
use crate::monitor::{MonitorConfig, WorkloadMonitor};
use crate::results::ResultsVolume;
use crate::simulations::SimulationService;
use crate::spec::{BuilderConfig, SpecBuilder};
use crate::store::{MemoryStore, Store};
use crate::types::{Simulation, Visualization};
use crate::uploads::UploadStaging;
use crate::visualizations::VisualizationService;

/// Builder for creating an [`EngineRuntime`].
pub struct EngineRuntimeBuilder {
    cluster: Option<Arc<dyn ClusterClient>>,
    simulation_store: Option<Arc<dyn Store<Simulation>>>,
    visualization_store: Option<Arc<dyn Store<Visualization>>>,
    builder_config: BuilderConfig,
    storage_dir: PathBuf,
    results_dir: PathBuf,
    reconcile_mode: ReconcileMode,
    monitor: MonitorConfig,
    list_item_budget: Duration,
}

impl Default for EngineRuntimeBuilder {
    fn default() -> Self {
        Self {
            cluster: None,
            simulation_store: None,
            visualization_store: None,
            builder_config: BuilderConfig::default(),
            storage_dir: PathBuf::from("/pvc/simulations"),
            results_dir: PathBuf::from("/pvc/results"),
            reconcile_mode: ReconcileMode::OnRead,
            monitor: MonitorConfig::default(),
            list_item_budget: Duration::from_millis(500),
        }
    }
}

impl EngineRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every setting from a loaded [`Config`].
    pub fn config(mut self, config: &Config) -> Self {
        self.builder_config = config.builder.clone();
        self.storage_dir = config.storage_dir.clone();
        self.results_dir = config.results_dir.clone();
        self.reconcile_mode = config.reconcile_mode;
        self.monitor = config.monitor;
        self.list_item_budget = config.list_item_budget;
        self
    }

    /// Set the cluster client (required).
    pub fn cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Set the simulation store.
    ///
    /// Default: in-memory
    pub fn simulation_store(mut self, store: Arc<dyn Store<Simulation>>) -> Self {
        self.simulation_store = Some(store);
        self
    }

    /// Set the visualization store.
    ///
    /// Default: in-memory
    pub fn visualization_store(mut self, store: Arc<dyn Store<Visualization>>) -> Self {
        self.visualization_store = Some(store);
        self
    }

    /// Set images and resource profiles.
    pub fn builder_config(mut self, config: BuilderConfig) -> Self {
        self.builder_config = config;
        self
    }

    /// Set the upload staging root.
    ///
    /// Default: `/pvc/simulations`
    pub fn storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_dir = path.into();
        self
    }

    /// Set where the results volume is mounted.
    ///
    /// Default: `/pvc/results`
    pub fn results_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_dir = path.into();
        self
    }

    /// Choose which path writes status.
    ///
    /// Default: [`ReconcileMode::OnRead`]
    pub fn reconcile_mode(mut self, mode: ReconcileMode) -> Self {
        self.reconcile_mode = mode;
        self
    }

    /// Set the monitor poll interval and deadline.
    ///
    /// Default: 5 seconds / 30 minutes
    pub fn monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor = config;
        self
    }

    /// Set the per-item reconcile budget for listing.
    ///
    /// Default: 500 milliseconds
    pub fn list_item_budget(mut self, budget: Duration) -> Self {
        self.list_item_budget = budget;
        self
    }

    /// Validate the configuration and assemble the runtime.
    ///
    /// Fails if no cluster client was set or a resource profile is invalid.
    pub fn build(self) -> Result<EngineRuntime> {
        let cluster = self
            .cluster
            .ok_or(ConfigError::MissingComponent("cluster"))?;
        let simulation_store: Arc<dyn Store<Simulation>> = match self.simulation_store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let visualization_store: Arc<dyn Store<Visualization>> = match self.visualization_store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let builder = Arc::new(SpecBuilder::new(self.builder_config)?);

        let monitor = match self.reconcile_mode {
            ReconcileMode::Monitor => Some(Arc::new(WorkloadMonitor::new(
                simulation_store.clone(),
                cluster.clone(),
                self.monitor,
            ))),
            ReconcileMode::OnRead => None,
        };

        let simulations = Arc::new(SimulationService::new(
            simulation_store,
            cluster.clone(),
            builder.clone(),
            UploadStaging::new(self.storage_dir),
            ResultsVolume::new(self.results_dir),
            monitor.clone(),
            self.list_item_budget,
        ));
        let visualizations = Arc::new(VisualizationService::new(
            visualization_store,
            cluster.clone(),
            builder,
        ));

        info!(
            backend = cluster.backend(),
            reconcile_mode = ?self.reconcile_mode,
            "EngineRuntime ready"
        );

        Ok(EngineRuntime {
            simulations,
            visualizations,
            monitor,
        })
    }
}

/// A running engine that can be embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) to stop monitor tasks.
pub struct EngineRuntime {
    simulations: Arc<SimulationService>,
    visualizations: Arc<VisualizationService>,
    monitor: Option<Arc<WorkloadMonitor>>,
}

impl EngineRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> EngineRuntimeBuilder {
        EngineRuntimeBuilder::new()
    }

    /// Build a runtime talking to the Kubernetes cluster described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cluster = Arc::new(KubeCluster::new(&config.kube)?);
        Self::builder().config(config).cluster(cluster).build()
    }

    /// Simulation use cases.
    pub fn simulations(&self) -> &Arc<SimulationService> {
        &self.simulations
    }

    /// Visualization use cases.
    pub fn visualizations(&self) -> &Arc<VisualizationService> {
        &self.visualizations
    }

    /// The workload monitor, in monitor mode.
    pub fn monitor(&self) -> Option<&Arc<WorkloadMonitor>> {
        self.monitor.as_ref()
    }

    /// Stop all monitor tasks and wait for them to exit.
    pub async fn shutdown(self) {
        info!("EngineRuntime shutting down...");
        if let Some(monitor) = &self.monitor {
            monitor.shutdown().await;
        }
        info!("EngineRuntime shutdown complete");
    }
}
