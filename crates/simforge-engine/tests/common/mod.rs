// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for simforge-engine integration tests.
//!
//! Provides an engine wired to a [`MockCluster`] and a temporary staging
//! directory, plus fixture builders for solver inputs and observations.

#![allow(dead_code)]

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use simforge_engine::cluster::{Condition, JobObservation, MockCluster, PodObservation};
use simforge_engine::monitor::MonitorConfig;
use simforge_engine::{EngineRuntime, ReconcileMode};

/// Files every OpenFOAM case archive must contain.
pub const CASE_FILES: [&str; 4] = [
    "cavity/system/controlDict",
    "cavity/system/fvSchemes",
    "cavity/system/fvSolution",
    "cavity/constant/transportProperties",
];

/// Mesh file that satisfies the `constant/polyMesh` marker.
pub const MESH_FILE: &str = "cavity/constant/polyMesh/blockMeshDict";

/// Engine under test with its mock cluster, staging and results directories.
pub struct TestEngine {
    pub runtime: EngineRuntime,
    pub cluster: Arc<MockCluster>,
    pub staging: TempDir,
    pub results: TempDir,
}

impl TestEngine {
    /// Engine that reconciles on read.
    pub fn new() -> Self {
        Self::with_cluster(MockCluster::new(), ReconcileMode::OnRead, MonitorConfig::default())
    }

    /// Engine whose simulations are owned by the background monitor.
    pub fn monitored(config: MonitorConfig) -> Self {
        Self::with_cluster(MockCluster::new(), ReconcileMode::Monitor, config)
    }

    /// Engine over a custom mock cluster.
    pub fn with_cluster(cluster: MockCluster, mode: ReconcileMode, monitor: MonitorConfig) -> Self {
        let cluster = Arc::new(cluster);
        let staging = TempDir::new().expect("Failed to create staging dir");
        let results = TempDir::new().expect("Failed to create results dir");
        let runtime = EngineRuntime::builder()
            .cluster(cluster.clone())
            .storage_dir(staging.path())
            .results_dir(results.path())
            .reconcile_mode(mode)
            .monitor_config(monitor)
            .list_item_budget(Duration::from_millis(200))
            .build()
            .expect("Failed to build engine runtime");
        Self {
            runtime,
            cluster,
            staging,
            results,
        }
    }
}

/// Build a `.tar.gz` whose entries are `paths`, each holding a small
/// OpenFOAM header.
pub fn case_archive(paths: &[&str]) -> Vec<u8> {
    archive_with_padding(paths, 0, Compression::default())
}

/// A complete, valid case archive.
pub fn valid_case_archive() -> Vec<u8> {
    let mut paths = CASE_FILES.to_vec();
    paths.push(MESH_FILE);
    case_archive(&paths)
}

/// A valid case archive of roughly `total` bytes, stored uncompressed.
pub fn large_case_archive(total: u64) -> Vec<u8> {
    let mut paths = CASE_FILES.to_vec();
    paths.push(MESH_FILE);
    archive_with_padding(&paths, total, Compression::none())
}

fn archive_with_padding(paths: &[&str], padding: u64, level: Compression) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), level));
    let body = b"FoamFile\n{\n    version 2.0;\n}\n";

    for path in paths {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, &body[..])
            .expect("Failed to append tar entry");
    }

    if padding > 0 {
        let mut header = tar::Header::new_gnu();
        header.set_size(padding);
        header.set_mode(0o644);
        builder
            .append_data(
                &mut header,
                "cavity/constant/polyMesh/points",
                std::io::repeat(0).take(padding),
            )
            .expect("Failed to append padding entry");
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("Failed to finish archive")
}

/// A minimal valid CalculiX deck.
pub fn fea_deck() -> Vec<u8> {
    b"** cantilever beam\n*NODE\n1, 0.0, 0.0, 0.0\n2, 1.0, 0.0, 0.0\n*ELEMENT, TYPE=B31\n1, 1, 2\n*STEP\n*STATIC\n*END STEP\n"
        .to_vec()
}

/// Job with running pods.
pub fn job_active() -> JobObservation {
    JobObservation {
        active: 1,
        ..Default::default()
    }
}

/// Job with a `Complete` condition.
pub fn job_complete() -> JobObservation {
    JobObservation {
        conditions: vec![Condition::active("Complete")],
        succeeded: 1,
        ..Default::default()
    }
}

/// Job with a `Failed` condition.
pub fn job_failed() -> JobObservation {
    JobObservation {
        conditions: vec![Condition::active("Failed")],
        failed: 1,
        ..Default::default()
    }
}

/// Job with no pods yet.
pub fn job_pending() -> JobObservation {
    JobObservation::default()
}

/// Pod in `phase` with no conditions.
pub fn pod_in(phase: &str) -> PodObservation {
    PodObservation {
        phase: Some(phase.to_string()),
        ..Default::default()
    }
}

/// Running pod with ready containers.
pub fn pod_ready(ip: &str, uid: &str) -> PodObservation {
    PodObservation {
        phase: Some("Running".to_string()),
        conditions: vec![Condition::active("ContainersReady")],
        pod_ip: Some(ip.to_string()),
        uid: Some(uid.to_string()),
    }
}
