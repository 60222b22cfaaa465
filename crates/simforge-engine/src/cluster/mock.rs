// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock cluster for testing.
//!
//! Records submitted specs and deletions, and replays scripted observation
//! sequences per unit. The last scripted observation repeats once the
//! sequence is exhausted. Units that were created but never scripted report
//! as freshly pending.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

use super::traits::*;
use crate::spec::{ExecutionUnitSpec, UnitKind};

/// Failure injected into a mock operation.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Respond as if the API server returned a 5xx.
    Api(String),
    /// Respond as if the connection failed.
    Transport(String),
    /// Respond with not-found.
    NotFound,
}

impl MockFailure {
    fn to_error(&self, name: &str) -> ClusterError {
        match self {
            MockFailure::Api(message) => ClusterError::Api {
                status: 500,
                message: message.clone(),
            },
            MockFailure::Transport(message) => ClusterError::Transport(message.clone()),
            MockFailure::NotFound => ClusterError::NotFound(name.to_string()),
        }
    }
}

#[derive(Default)]
struct MockState {
    existing: HashSet<String>,
    created: Vec<ExecutionUnitSpec>,
    deleted: Vec<(UnitKind, String)>,
    jobs: HashMap<String, VecDeque<JobObservation>>,
    pods: HashMap<String, VecDeque<PodObservation>>,
    queries: HashMap<String, usize>,
    fail_create: Option<MockFailure>,
    fail_query: Option<MockFailure>,
    fail_delete: Option<MockFailure>,
}

/// Mock cluster for testing.
pub struct MockCluster {
    state: Mutex<MockState>,
    /// Delay applied to every status query.
    pub query_delay: Duration,
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCluster {
    /// Create a mock cluster that accepts everything.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            query_delay: Duration::ZERO,
        }
    }

    /// Create a mock cluster that rejects every submission.
    pub fn failing() -> Self {
        let state = MockState {
            fail_create: Some(MockFailure::Transport("connection refused".to_string())),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            query_delay: Duration::ZERO,
        }
    }

    /// Create a mock cluster whose status queries take `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            query_delay: delay,
        }
    }

    /// Queue observations for a Job.
    pub async fn script_job(&self, name: &str, observations: Vec<JobObservation>) {
        let mut state = self.state.lock().await;
        state
            .jobs
            .entry(name.to_string())
            .or_default()
            .extend(observations);
    }

    /// Queue observations for a Pod.
    pub async fn script_pod(&self, name: &str, observations: Vec<PodObservation>) {
        let mut state = self.state.lock().await;
        state
            .pods
            .entry(name.to_string())
            .or_default()
            .extend(observations);
    }

    /// Make subsequent creates fail.
    pub async fn fail_creates(&self, failure: Option<MockFailure>) {
        self.state.lock().await.fail_create = failure;
    }

    /// Make subsequent status queries fail.
    pub async fn fail_queries(&self, failure: Option<MockFailure>) {
        self.state.lock().await.fail_query = failure;
    }

    /// Make subsequent deletes fail.
    pub async fn fail_deletes(&self, failure: Option<MockFailure>) {
        self.state.lock().await.fail_delete = failure;
    }

    /// Specs submitted so far, in order.
    pub async fn created(&self) -> Vec<ExecutionUnitSpec> {
        self.state.lock().await.created.clone()
    }

    /// Deletions performed so far, in order.
    pub async fn deleted(&self) -> Vec<(UnitKind, String)> {
        self.state.lock().await.deleted.clone()
    }

    /// Number of status queries made for a unit.
    pub async fn query_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .await
            .queries
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Whether a unit currently exists.
    pub async fn exists(&self, name: &str) -> bool {
        self.state.lock().await.existing.contains(name)
    }

    async fn begin_query(&self, name: &str) -> Result<()> {
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        let mut state = self.state.lock().await;
        *state.queries.entry(name.to_string()).or_default() += 1;
        if let Some(failure) = &state.fail_query {
            return Err(failure.to_error(name));
        }
        Ok(())
    }
}

fn next_scripted<T: Clone>(queue: Option<&mut VecDeque<T>>) -> Option<T> {
    let queue = queue?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn create(&self, spec: &ExecutionUnitSpec) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(failure) = &state.fail_create {
            return Err(failure.to_error(&spec.name));
        }
        if !state.existing.insert(spec.name.clone()) {
            return Err(ClusterError::AlreadyExists(spec.name.clone()));
        }
        state.created.push(spec.clone());
        Ok(())
    }

    async fn get_job(&self, name: &str) -> Result<JobObservation> {
        self.begin_query(name).await?;
        let mut state = self.state.lock().await;
        if !state.existing.contains(name) {
            return Err(ClusterError::NotFound(name.to_string()));
        }
        Ok(next_scripted(state.jobs.get_mut(name)).unwrap_or_default())
    }

    async fn get_pod(&self, name: &str) -> Result<PodObservation> {
        self.begin_query(name).await?;
        let mut state = self.state.lock().await;
        if !state.existing.contains(name) {
            return Err(ClusterError::NotFound(name.to_string()));
        }
        Ok(next_scripted(state.pods.get_mut(name)).unwrap_or_else(|| PodObservation {
            phase: Some("Pending".to_string()),
            ..Default::default()
        }))
    }

    async fn delete(&self, kind: UnitKind, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(failure) = &state.fail_delete {
            return Err(failure.to_error(name));
        }
        if !state.existing.remove(name) {
            return Err(ClusterError::NotFound(name.to_string()));
        }
        state.deleted.push((kind, name.to_string()));
        Ok(())
    }
}
