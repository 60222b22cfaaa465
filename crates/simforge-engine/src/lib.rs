// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Simforge Engine - Workload Lifecycle Orchestration
//!
//! This crate turns CFD/FEA solver runs and result-visualization sessions
//! into Kubernetes Jobs and Pods, tracks their lifecycle, and reconciles the
//! cluster's view back into locally stored records.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        simforge-server (HTTP)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    simforge-engine (This Crate)                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │  Validator  │  │ Simulation  │  │Visualization│  │  Workload   │     │
//! │  │  + Uploads  │  │  Service    │  │  Service    │  │  Monitor    │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! │         │                │     Spec Builder │              │            │
//! │         ▼                ▼                  ▼              ▼            │
//! │  ┌─────────────┐  ┌─────────────────────────────────────────────┐       │
//! │  │ Input volume│  │     Store<T>           ClusterClient        │       │
//! │  └─────────────┘  └─────────────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                                  │ REST (Jobs, Pods)
//!                                                  ▼
//!                                   ┌───────────────────────────┐
//!                                   │    Kubernetes API server   │
//!                                   └───────────────────────────┘
//! ```
//!
//! # Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `create` / `create_with_upload` | Build a Job spec, submit it, persist a pending record |
//! | `get` | Load a simulation, reconcile with the Job's status |
//! | `list` | All simulations, reconciled concurrently under a per-item budget |
//! | `delete` | Delete the Job (background propagation), then the record; repeat deletes succeed |
//! | `results` | Stream the simulation's result directory as `.tar.gz` |
//! | `VisualizationService::create` | Start a ParaView web Pod over a result location |
//! | `VisualizationService::websocket_url` | Resolve `ws://<podIP>:9000/ws` once ready |
//! | `VisualizationService::list_by_simulation` | Sessions for a simulation (not reconciled) |
//!
//! # Status State Machines
//!
//! ```text
//!   Simulation                         Visualization
//!
//!   ┌─────────┐                        ┌─────────┐
//!   │ PENDING │──────────┐             │ PENDING │──────────┐
//!   └────┬────┘          │             └────┬────┘          │
//!        │ job active    │                  │ pod running   │
//!        ▼               │                  ▼               │
//!   ┌─────────┐          │             ┌─────────┐          │
//!   │ RUNNING │          │             │ RUNNING │──────┐   │
//!   └────┬────┘          │             └────┬────┘      │   │
//!        ├───────────────┤                  │ ready     │   │
//!        ▼               ▼                  ▼           ▼   ▼
//!  ┌───────────┐   ┌────────┐          ┌─────────┐  ┌────────┐
//!  │ COMPLETED │   │ FAILED │          │  READY  │  │ FAILED │
//!  └───────────┘   └────────┘          └─────────┘  └────────┘
//! ```
//!
//! Terminal states are absorbing; backwards observations are ignored.
//!
//! # Reconciliation
//!
//! Exactly one path writes simulation status per deployment:
//!
//! | Mode | Writer | Reads |
//! |------|--------|-------|
//! | `on_read` (default) | `get`/`list` | query the cluster and persist transitions |
//! | `monitor` | one [`monitor::WorkloadMonitor`] task per simulation | return stored records |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `SIMFORGE_KUBE_API_URL` | Yes* | from `KUBERNETES_SERVICE_HOST`/`_PORT` | API server URL |
//! | `SIMFORGE_NAMESPACE` | No | `default` | Namespace for Jobs and Pods |
//! | `SIMFORGE_KUBE_TOKEN` | No | service-account token | Bearer token |
//! | `SIMFORGE_KUBE_CA_PATH` | No | service-account `ca.crt` | Cluster CA |
//! | `SIMFORGE_SKIP_TLS_VERIFY` | No | `false` | Skip TLS verification |
//! | `SIMFORGE_STORAGE_DIR` | No | `/pvc/simulations` | Upload staging root |
//! | `SIMFORGE_RESULTS_DIR` | No | `/pvc/results` | Results volume mount |
//! | `SIMFORGE_RECONCILE_MODE` | No | `on_read` | `on_read` or `monitor` |
//! | `SIMFORGE_MONITOR_POLL_SECS` | No | `5` | Monitor poll interval |
//! | `SIMFORGE_MONITOR_DEADLINE_SECS` | No | `1800` | Monitor deadline |
//! | `SIMFORGE_LIST_ITEM_BUDGET_MS` | No | `500` | Per-item list reconcile budget |
//! | `SIMFORGE_{CFD,FEA,VIZ}_IMAGE` | No | per kind | Container image |
//! | `SIMFORGE_{CFD,FEA,VIZ}_{CPU,MEMORY}_{REQUEST,LIMIT}` | No | per kind | Resource bounds |
//!
//! # Modules
//!
//! - [`config`]: Engine configuration from environment variables
//! - [`error`]: Error types and stable error codes
//! - [`types`]: Simulation and visualization records, status transitions
//! - [`store`]: Record storage trait and in-memory backend
//! - [`spec`]: Job/Pod spec construction and resource profiles
//! - [`cluster`]: Cluster client trait, Kubernetes and mock backends
//! - [`validator`]: Structural checks on uploaded inputs
//! - [`uploads`]: Staging uploads on the shared input volume
//! - [`results`]: Result archives from the shared results volume
//! - [`simulations`]: Simulation use cases
//! - [`visualizations`]: Visualization use cases
//! - [`monitor`]: Per-simulation background polling
//! - [`runtime`]: Embeddable runtime wiring

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod monitor;
pub mod results;
pub mod runtime;
pub mod simulations;
pub mod spec;
pub mod store;
pub mod types;
pub mod uploads;
pub mod validator;
pub mod visualizations;

pub use config::{Config, ReconcileMode};
pub use error::{Error, ErrorCode, Result};
pub use runtime::EngineRuntime;
pub use types::{
    Simulation, SimulationStatus, SimulationType, Visualization, VisualizationStatus,
    WorkloadError,
};
