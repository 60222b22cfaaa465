// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for simforge-server integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use simforge_engine::EngineRuntime;
use simforge_engine::cluster::MockCluster;
use simforge_server::{AppState, app};

pub const BOUNDARY: &str = "simforge-test-boundary";

/// Router over an engine backed by a mock cluster.
pub struct TestApp {
    pub router: Router,
    pub cluster: Arc<MockCluster>,
    pub runtime: EngineRuntime,
    pub staging: TempDir,
    pub results: TempDir,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let cluster = Arc::new(MockCluster::new());
    let staging = TempDir::new().expect("Failed to create staging dir");
    let results = TempDir::new().expect("Failed to create results dir");
    let runtime = EngineRuntime::builder()
        .cluster(cluster.clone())
        .storage_dir(staging.path())
        .results_dir(results.path())
        .build()
        .expect("Failed to build engine runtime");
    let router = app(AppState::new(&runtime));
    TestApp {
        router,
        cluster,
        runtime,
        staging,
        results,
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// A form part: (field name, optional file name, content).
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

/// A plain text form field.
pub fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
    (name, None, value.as_bytes())
}

/// A file form field.
pub fn file<'a>(name: &'a str, filename: &'a str, content: &'a [u8]) -> Part<'a> {
    (name, Some(filename), content)
}

/// Encode parts as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn post_form(app: &TestApp, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// A minimal valid CalculiX deck.
pub fn fea_deck() -> &'static [u8] {
    b"*NODE\n1, 0.0, 0.0, 0.0\n2, 1.0, 0.0, 0.0\n*ELEMENT, TYPE=B31\n1, 1, 2\n"
}
