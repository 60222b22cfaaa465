// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workload records and their status state machines.
//!
//! ```text
//! Simulation:     PENDING ──► RUNNING ──► COMPLETED
//!                    │           └──────► FAILED
//!                    └──────────────────► COMPLETED | FAILED
//!
//! Visualization:  PENDING ──► RUNNING ──► READY
//!                    └───────────┴──────► FAILED
//! ```
//!
//! Terminal states are absorbing. Observed statuses that would move a record
//! backwards are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorCode};
use crate::store::Entity;

/// Length of generated workload identifiers (hex characters).
const ID_LEN: usize = 12;

/// Generate a fresh opaque workload identifier.
pub fn new_workload_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ID_LEN);
    id
}

/// Whether `id` has the shape of a generated workload identifier.
pub fn is_workload_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Solver family a simulation runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationType {
    /// Computational fluid dynamics (OpenFOAM case archive).
    Cfd,
    /// Finite element analysis (CalculiX input deck).
    Fea,
}

impl SimulationType {
    /// Type name as used in requests and labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationType::Cfd => "cfd",
            SimulationType::Fea => "fea",
        }
    }
}

impl FromStr for SimulationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cfd" => Ok(SimulationType::Cfd),
            "fea" => Ok(SimulationType::Fea),
            other => Err(Error::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for SimulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    /// Submitted, not yet observed running.
    Pending,
    /// Solver pod is active.
    Running,
    /// Job finished successfully.
    Completed,
    /// Job failed, or was force-failed by the monitor.
    Failed,
}

impl SimulationStatus {
    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SimulationStatus::Pending => 0,
            SimulationStatus::Running => 1,
            SimulationStatus::Completed | SimulationStatus::Failed => 2,
        }
    }

    /// Get the status string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Pending => "pending",
            SimulationStatus::Running => "running",
            SimulationStatus::Completed => "completed",
            SimulationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visualization session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationStatus {
    /// Pod accepted, not yet running.
    Pending,
    /// Pod running but containers not ready.
    Running,
    /// Containers ready; websocket endpoint can be resolved.
    Ready,
    /// Pod failed or exited.
    Failed,
}

impl VisualizationStatus {
    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VisualizationStatus::Ready | VisualizationStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            VisualizationStatus::Pending => 0,
            VisualizationStatus::Running => 1,
            VisualizationStatus::Ready | VisualizationStatus::Failed => 2,
        }
    }

    /// Get the status string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationStatus::Pending => "pending",
            VisualizationStatus::Running => "running",
            VisualizationStatus::Ready => "ready",
            VisualizationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VisualizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a workload ended up failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable reason.
    pub message: String,
}

impl WorkloadError {
    /// Create a workload error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&Error> for WorkloadError {
    fn from(err: &Error) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// A CFD/FEA solver run tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    /// Opaque short identifier.
    pub id: String,
    /// Caller-supplied display name.
    pub name: String,
    /// Solver family.
    #[serde(rename = "type")]
    pub sim_type: SimulationType,
    /// Lifecycle status.
    pub status: SimulationStatus,
    /// Name of the cluster Job.
    pub pod_name: String,
    /// Input location inside the shared input volume.
    pub config_path: String,
    /// Result location inside the shared results volume.
    pub result_path: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// First observation of the running state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// First observation of a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason, when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkloadError>,
}

impl Simulation {
    /// Create a pending simulation record.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        sim_type: SimulationType,
        config_path: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            pod_name: simulation_unit_name(&id),
            result_path: id.clone(),
            id,
            name: name.into(),
            sim_type,
            status: SimulationStatus::Pending,
            config_path: config_path.into(),
            created_at,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Merge a cluster-observed status into the record.
    ///
    /// Returns true if the record changed. `started_at` is stamped on the first
    /// transition into running and `completed_at` on the first transition into
    /// a terminal state; neither is ever overwritten.
    pub fn observe(&mut self, observed: SimulationStatus, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || observed.rank() <= self.status.rank() {
            return false;
        }

        self.status = observed;
        if observed == SimulationStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if observed.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        if observed == SimulationStatus::Failed && self.error.is_none() {
            self.error = Some(WorkloadError::new(
                ErrorCode::ClusterError,
                format!("Job {} reported failed by the cluster", self.pod_name),
            ));
        }
        true
    }

    /// Force the record into `failed` with the given reason.
    ///
    /// No-op (returns false) if the record is already terminal.
    pub fn fail(&mut self, error: WorkloadError, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SimulationStatus::Failed;
        self.completed_at.get_or_insert(now);
        self.error = Some(error);
        true
    }
}

impl Entity for Simulation {
    const KIND: &'static str = "simulation";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A result-visualization session for a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    /// Opaque short identifier.
    pub id: String,
    /// Owning simulation (not enforced).
    pub simulation_id: String,
    /// Session status.
    pub status: VisualizationStatus,
    /// Name of the cluster Pod.
    pub pod_name: String,
    /// Websocket endpoint, resolved lazily once ready.
    #[serde(
        rename = "webSocketURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub websocket_url: Option<String>,
    /// Cluster UID of the pod the endpoint was resolved from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_uid: Option<String>,
    /// Result data mounted into the session.
    pub result_path: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Last status or endpoint mutation.
    pub updated_at: DateTime<Utc>,
    /// Failure reason, when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkloadError>,
}

impl Visualization {
    /// Create a pending visualization record.
    pub fn new(
        id: impl Into<String>,
        simulation_id: impl Into<String>,
        result_path: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            pod_name: visualization_unit_name(&id),
            id,
            simulation_id: simulation_id.into(),
            status: VisualizationStatus::Pending,
            websocket_url: None,
            pod_uid: None,
            result_path: result_path.into(),
            created_at,
            updated_at: created_at,
            error: None,
        }
    }

    /// Merge a cluster-observed status into the record.
    ///
    /// Returns true if the record changed; `updated_at` is touched on change.
    pub fn observe(&mut self, observed: VisualizationStatus, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || observed.rank() <= self.status.rank() {
            return false;
        }
        self.status = observed;
        if observed == VisualizationStatus::Failed && self.error.is_none() {
            self.error = Some(WorkloadError::new(
                ErrorCode::ClusterError,
                format!("Pod {} reported failed by the cluster", self.pod_name),
            ));
        }
        self.updated_at = now;
        true
    }

    /// Record a resolved websocket endpoint.
    pub fn set_endpoint(&mut self, url: String, pod_uid: Option<String>, now: DateTime<Utc>) {
        self.websocket_url = Some(url);
        self.pod_uid = pod_uid;
        self.updated_at = now;
    }
}

impl Entity for Visualization {
    const KIND: &'static str = "visualization";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Cluster Job name for a simulation.
pub fn simulation_unit_name(id: &str) -> String {
    format!("sim-{}", id)
}

/// Cluster Pod name for a visualization.
pub fn visualization_unit_name(id: &str) -> String {
    format!("viz-{}", id)
}
