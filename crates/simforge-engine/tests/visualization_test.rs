// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Visualization sessions: readiness, endpoint resolution and caching.

mod common;

use std::time::Duration;

use common::*;
use simforge_engine::cluster::MockFailure;
use simforge_engine::spec::UnitKind;
use simforge_engine::{Error, ErrorCode, VisualizationStatus};

#[tokio::test]
async fn test_create_defaults_result_location_to_simulation() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("3f9a1c0b2d4e", None).await.unwrap();
    assert_eq!(viz.status, VisualizationStatus::Pending);
    assert_eq!(viz.simulation_id, "3f9a1c0b2d4e");
    assert_eq!(viz.result_path, "3f9a1c0b2d4e");
    assert_eq!(viz.pod_name, format!("viz-{}", viz.id));
    assert!(viz.websocket_url.is_none());

    let created = engine.cluster.created().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].kind, UnitKind::Pod);
    let data = created[0]
        .container
        .mounts
        .iter()
        .find(|m| m.mount_path == "/data")
        .unwrap();
    assert_eq!(data.sub_path.as_deref(), Some("3f9a1c0b2d4e"));
}

#[tokio::test]
async fn test_create_with_explicit_result_location() {
    let engine = TestEngine::new();

    let viz = engine
        .runtime
        .visualizations()
        .create("3f9a1c0b2d4e", Some("3f9a1c0b2d4e/VTK"))
        .await
        .unwrap();
    assert_eq!(viz.result_path, "3f9a1c0b2d4e/VTK");
}

#[tokio::test]
async fn test_create_requires_simulation_id() {
    let engine = TestEngine::new();

    let err = engine
        .runtime
        .visualizations()
        .create("", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(engine.cluster.created().await.is_empty());
}

#[tokio::test]
async fn test_websocket_url_not_ready_until_pod_ready() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    engine
        .cluster
        .script_pod(
            &viz.pod_name,
            vec![pod_in("Pending"), pod_in("Running"), pod_in("Failed")],
        )
        .await;

    for expected in [
        VisualizationStatus::Pending,
        VisualizationStatus::Running,
        VisualizationStatus::Failed,
    ] {
        let err = vizs.websocket_url(&viz.id).await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)), "got {:?}", err);
        assert_eq!(err.code(), ErrorCode::NotReady);
        assert!(err.to_string().contains(expected.as_str()));
    }

    // Failed is terminal.
    let failed = vizs.get(&viz.id).await.unwrap();
    assert_eq!(failed.status, VisualizationStatus::Failed);
}

#[tokio::test]
async fn test_websocket_url_resolved_and_cached() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    engine
        .cluster
        .script_pod(&viz.pod_name, vec![pod_ready("10.1.2.3", "uid-1")])
        .await;

    let url = vizs.websocket_url(&viz.id).await.unwrap();
    assert_eq!(url, "ws://10.1.2.3:9000/ws");

    let stored = vizs.get(&viz.id).await.unwrap();
    assert_eq!(stored.status, VisualizationStatus::Ready);
    assert_eq!(stored.websocket_url.as_deref(), Some("ws://10.1.2.3:9000/ws"));
    assert_eq!(stored.pod_uid.as_deref(), Some("uid-1"));

    // Pod unreachable: the cached endpoint is still served.
    engine
        .cluster
        .fail_queries(Some(MockFailure::Transport("timeout".into())))
        .await;
    assert_eq!(vizs.websocket_url(&viz.id).await.unwrap(), url);
}

#[tokio::test]
async fn test_websocket_url_re_resolved_after_pod_recreation() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    engine
        .cluster
        .script_pod(
            &viz.pod_name,
            vec![
                pod_ready("10.1.2.3", "uid-1"),
                pod_ready("10.1.2.3", "uid-1"),
                pod_ready("10.1.9.9", "uid-2"),
            ],
        )
        .await;

    // One query for the status read, one for the address.
    let first = vizs.websocket_url(&viz.id).await.unwrap();
    assert_eq!(first, "ws://10.1.2.3:9000/ws");

    let second = vizs.websocket_url(&viz.id).await.unwrap();
    assert_eq!(second, "ws://10.1.9.9:9000/ws");

    let stored = vizs.get(&viz.id).await.unwrap();
    assert_eq!(stored.pod_uid.as_deref(), Some("uid-2"));
}

#[tokio::test]
async fn test_ready_pod_without_address_is_not_ready() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    let mut pod = pod_ready("10.1.2.3", "uid-1");
    pod.pod_ip = None;
    engine.cluster.script_pod(&viz.pod_name, vec![pod]).await;

    let err = vizs.websocket_url(&viz.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotReady);
}

#[tokio::test]
async fn test_websocket_url_unknown_is_not_found() {
    let engine = TestEngine::new();

    let err = engine
        .runtime
        .visualizations()
        .websocket_url("missing")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_list_by_simulation_oldest_first() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let a = vizs.create("sim1", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let _other = vizs.create("sim2", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let b = vizs.create("sim1", None).await.unwrap();

    let sessions = vizs.list_by_simulation("sim1").await.unwrap();
    let ids: Vec<_> = sessions.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);

    assert!(vizs.list_by_simulation("sim3").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_pod_then_record() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    vizs.delete(&viz.id).await.unwrap();

    assert_eq!(
        engine.cluster.deleted().await,
        vec![(UnitKind::Pod, viz.pod_name.clone())]
    );
    assert_eq!(
        vizs.get(&viz.id).await.unwrap_err().code(),
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    vizs.delete(&viz.id).await.unwrap();
    vizs.delete(&viz.id).await.unwrap();
    vizs.delete("missing").await.unwrap();

    assert_eq!(
        engine.cluster.deleted().await,
        vec![(UnitKind::Pod, viz.pod_name.clone())]
    );
}

#[tokio::test]
async fn test_delete_keeps_record_when_cluster_fails() {
    let engine = TestEngine::new();
    let vizs = engine.runtime.visualizations();

    let viz = vizs.create("sim1", None).await.unwrap();
    engine
        .cluster
        .fail_deletes(Some(MockFailure::Transport("connection refused".into())))
        .await;

    let err = vizs.delete(&viz.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ClusterError);
    assert!(vizs.get(&viz.id).await.is_ok());
}
