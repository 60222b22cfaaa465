// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes REST backend.
//!
//! Speaks the plain REST API (`batch/v1` Jobs, `v1` Pods) over HTTPS with a
//! bearer token, so no cluster SDK is needed. Error mapping:
//!
//! | Response            | Error                          |
//! |---------------------|--------------------------------|
//! | 404                 | [`ClusterError::NotFound`]     |
//! | 409                 | [`ClusterError::AlreadyExists`]|
//! | other non-2xx       | [`ClusterError::Api`]          |
//! | no response         | [`ClusterError::Transport`]    |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::traits::*;
use crate::config::KubeConfig;
use crate::spec::{ExecutionUnitSpec, UnitKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cluster client backed by the Kubernetes REST API.
pub struct KubeCluster {
    client: reqwest::Client,
    api_url: String,
    namespace: String,
    token: Option<String>,
}

impl KubeCluster {
    /// Build a client from API access settings.
    pub fn new(config: &KubeConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);

        if let Some(ca_path) = &config.ca_path {
            let pem = std::fs::read(ca_path).map_err(|e| {
                ClusterError::Setup(format!("Failed to read CA {}: {}", ca_path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClusterError::Setup(format!("Invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| ClusterError::Setup(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            api_url = %config.api_url,
            namespace = %config.namespace,
            "Kubernetes client configured"
        );

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token: config.token.clone(),
        })
    }

    fn collection_url(&self, kind: UnitKind) -> String {
        match kind {
            UnitKind::Job => format!(
                "{}/apis/batch/v1/namespaces/{}/jobs",
                self.api_url, self.namespace
            ),
            UnitKind::Pod => format!("{}/api/v1/namespaces/{}/pods", self.api_url, self.namespace),
        }
    }

    fn unit_url(&self, kind: UnitKind, name: &str) -> String {
        format!("{}/{}", self.collection_url(kind), name)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, name: &str) -> Result<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        check_status(response, name).await
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, kind: UnitKind, name: &str) -> Result<T> {
        let response = self
            .send(self.client.get(self.unit_url(kind, name)), name)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClusterError::Decode(format!("{} {}: {}", kind.as_str(), name, e)))
    }
}

async fn check_status(response: reqwest::Response, name: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StatusBody>(&body)
        .ok()
        .and_then(|s| s.message)
        .unwrap_or(body);

    Err(match status.as_u16() {
        404 => ClusterError::NotFound(name.to_string()),
        409 => ClusterError::AlreadyExists(name.to_string()),
        code => ClusterError::Api {
            status: code,
            message,
        },
    })
}

#[async_trait]
impl ClusterClient for KubeCluster {
    fn backend(&self) -> &'static str {
        "kubernetes"
    }

    async fn create(&self, spec: &ExecutionUnitSpec) -> Result<()> {
        let body = manifest(spec, &self.namespace);
        self.send(
            self.client.post(self.collection_url(spec.kind)).json(&body),
            &spec.name,
        )
        .await?;
        debug!(unit = %spec.name, kind = spec.kind.as_str(), "Execution unit created");
        Ok(())
    }

    async fn get_job(&self, name: &str) -> Result<JobObservation> {
        let job: JobResource = self.fetch(UnitKind::Job, name).await?;
        Ok(JobObservation {
            conditions: job.status.conditions.into_iter().map(Into::into).collect(),
            active: job.status.active,
            succeeded: job.status.succeeded,
            failed: job.status.failed,
        })
    }

    async fn get_pod(&self, name: &str) -> Result<PodObservation> {
        let pod: PodResource = self.fetch(UnitKind::Pod, name).await?;
        Ok(PodObservation {
            phase: pod.status.phase,
            conditions: pod.status.conditions.into_iter().map(Into::into).collect(),
            pod_ip: pod.status.pod_ip,
            uid: pod.metadata.uid,
        })
    }

    async fn delete(&self, kind: UnitKind, name: &str) -> Result<()> {
        let options = json!({
            "apiVersion": "v1",
            "kind": "DeleteOptions",
            "propagationPolicy": "Background",
        });
        self.send(
            self.client.delete(self.unit_url(kind, name)).json(&options),
            name,
        )
        .await?;
        debug!(unit = %name, kind = kind.as_str(), "Execution unit deleted");
        Ok(())
    }
}

/// Render a spec as a Job or Pod manifest.
fn manifest(spec: &ExecutionUnitSpec, namespace: &str) -> Value {
    let container_spec = &spec.container;
    let resources = &container_spec.resources;

    let mounts: Vec<Value> = container_spec
        .mounts
        .iter()
        .map(|m| {
            let mut mount = json!({ "name": m.volume, "mountPath": m.mount_path });
            if let Some(sub_path) = &m.sub_path {
                mount["subPath"] = json!(sub_path);
            }
            mount
        })
        .collect();

    let mut container = json!({
        "name": container_spec.name,
        "image": container_spec.image,
        "command": container_spec.command,
        "volumeMounts": mounts,
        "resources": {
            "requests": { "cpu": resources.cpu_request, "memory": resources.memory_request },
            "limits": { "cpu": resources.cpu_limit, "memory": resources.memory_limit },
        },
    });
    if let Some(dir) = &container_spec.working_dir {
        container["workingDir"] = json!(dir);
    }
    if !container_spec.ports.is_empty() {
        container["ports"] = container_spec
            .ports
            .iter()
            .map(|p| json!({ "name": p.name, "containerPort": p.container_port }))
            .collect();
    }

    let volumes: Vec<Value> = spec
        .volumes
        .iter()
        .map(|v| json!({ "name": v.name, "persistentVolumeClaim": { "claimName": v.claim_name } }))
        .collect();

    let mut pod_spec = json!({
        "restartPolicy": "Never",
        "containers": [container],
        "volumes": volumes,
    });
    if let Some(fs_group) = spec.fs_group {
        pod_spec["securityContext"] = json!({ "fsGroup": fs_group });
    }

    let metadata = json!({
        "name": spec.name,
        "namespace": namespace,
        "labels": spec.labels,
    });

    match spec.kind {
        UnitKind::Job => {
            let mut job_spec = json!({
                "template": {
                    "metadata": { "labels": spec.labels },
                    "spec": pod_spec,
                },
            });
            if let Some(backoff_limit) = spec.backoff_limit {
                job_spec["backoffLimit"] = json!(backoff_limit);
            }
            json!({
                "apiVersion": "batch/v1",
                "kind": "Job",
                "metadata": metadata,
                "spec": job_spec,
            })
        }
        UnitKind::Pod => json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": metadata,
            "spec": pod_spec,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionBody {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

impl From<ConditionBody> for Condition {
    fn from(body: ConditionBody) -> Self {
        Condition {
            kind: body.kind,
            status: body.status == "True",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobResource {
    status: JobStatusBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobStatusBody {
    conditions: Vec<ConditionBody>,
    active: i32,
    succeeded: i32,
    failed: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodResource {
    metadata: MetadataBody,
    status: PodStatusBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataBody {
    uid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodStatusBody {
    phase: Option<String>,
    conditions: Vec<ConditionBody>,
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
}
