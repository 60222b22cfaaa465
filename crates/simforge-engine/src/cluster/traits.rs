// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster client trait and observation types.
//!
//! Clients return raw observations. Mapping an observation to a workload
//! status is a pure function here, so every path that writes status agrees
//! on what the cluster said.

use async_trait::async_trait;
use thiserror::Error;

use crate::spec::{ExecutionUnitSpec, UnitKind};
use crate::types::{SimulationStatus, VisualizationStatus};

/// Errors from cluster operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClusterError {
    /// The unit does not exist.
    #[error("Execution unit not found: {0}")]
    NotFound(String),

    /// A unit with the same name already exists.
    #[error("Execution unit already exists: {0}")]
    AlreadyExists(String),

    /// The pod has no network address yet.
    #[error("No network address assigned to {0}")]
    NotAssigned(String),

    /// The API server rejected the request.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the server's Status object.
        message: String,
    },

    /// The request never got an answer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The client could not be set up.
    #[error("Client setup failed: {0}")]
    Setup(String),
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// A status condition reported on a Job or Pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Condition type (`Complete`, `Failed`, `ContainersReady`, ...).
    pub kind: String,
    /// Whether the condition's status is `True`.
    pub status: bool,
}

impl Condition {
    /// A condition whose status is `True`.
    pub fn active(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            status: true,
        }
    }
}

fn has_condition(conditions: &[Condition], kind: &str) -> bool {
    conditions.iter().any(|c| c.status && c.kind == kind)
}

/// Observed state of a Job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobObservation {
    /// Reported conditions.
    pub conditions: Vec<Condition>,
    /// Pods currently running.
    pub active: i32,
    /// Pods that succeeded.
    pub succeeded: i32,
    /// Pods that failed.
    pub failed: i32,
}

impl JobObservation {
    /// Map to a simulation status.
    ///
    /// Terminal conditions win over counters; counters are consulted only
    /// when no terminal condition is present.
    pub fn status(&self) -> SimulationStatus {
        if has_condition(&self.conditions, "Complete") {
            SimulationStatus::Completed
        } else if has_condition(&self.conditions, "Failed") {
            SimulationStatus::Failed
        } else if self.succeeded > 0 {
            SimulationStatus::Completed
        } else if self.failed > 0 {
            SimulationStatus::Failed
        } else if self.active > 0 {
            SimulationStatus::Running
        } else {
            SimulationStatus::Pending
        }
    }
}

/// Observed state of a Pod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodObservation {
    /// Pod phase (`Pending`, `Running`, `Succeeded`, `Failed`, `Unknown`).
    pub phase: Option<String>,
    /// Reported conditions.
    pub conditions: Vec<Condition>,
    /// Pod IP, once scheduled.
    pub pod_ip: Option<String>,
    /// Cluster-assigned UID.
    pub uid: Option<String>,
}

impl PodObservation {
    /// Map to a visualization status.
    pub fn status(&self) -> VisualizationStatus {
        match self.phase.as_deref() {
            Some("Running") if has_condition(&self.conditions, "ContainersReady") => {
                VisualizationStatus::Ready
            }
            Some("Running") => VisualizationStatus::Running,
            Some("Failed") | Some("Succeeded") => VisualizationStatus::Failed,
            _ => VisualizationStatus::Pending,
        }
    }

    /// Pod IP, or `NotAssigned` if the pod has none yet.
    pub fn address(&self, name: &str) -> Result<&str> {
        match self.pod_ip.as_deref() {
            Some(ip) if !ip.is_empty() => Ok(ip),
            _ => Err(ClusterError::NotAssigned(name.to_string())),
        }
    }
}

/// Cluster orchestrator interface.
///
/// Implementations must be safe to share across tasks behind an `Arc`.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Backend name for logging.
    fn backend(&self) -> &'static str;

    /// Submit an execution unit.
    async fn create(&self, spec: &ExecutionUnitSpec) -> Result<()>;

    /// Observe a Job by name.
    async fn get_job(&self, name: &str) -> Result<JobObservation>;

    /// Observe a Pod by name.
    async fn get_pod(&self, name: &str) -> Result<PodObservation>;

    /// Delete a unit with background propagation.
    async fn delete(&self, kind: UnitKind, name: &str) -> Result<()>;
}
