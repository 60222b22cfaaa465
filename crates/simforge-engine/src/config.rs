// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for simforge-engine.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::monitor::MonitorConfig;
use crate::spec::{BuilderConfig, ResourceProfile};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Which path owns status writes for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Reads query the cluster and persist observed transitions.
    #[default]
    OnRead,
    /// A background monitor per simulation writes status; reads never do.
    Monitor,
}

impl ReconcileMode {
    /// Mode as written in `SIMFORGE_RECONCILE_MODE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileMode::OnRead => "on_read",
            ReconcileMode::Monitor => "monitor",
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_read" => Ok(ReconcileMode::OnRead),
            "monitor" => Ok(ReconcileMode::Monitor),
            _ => Err(()),
        }
    }
}

/// Kubernetes API access settings.
#[derive(Debug, Clone)]
pub struct KubeConfig {
    /// API server base URL.
    pub api_url: String,
    /// Namespace all execution units are created in.
    pub namespace: String,
    /// Bearer token, if any.
    pub token: Option<String>,
    /// PEM bundle of the cluster CA.
    pub ca_path: Option<PathBuf>,
    /// Skip TLS certificate verification (development only).
    pub skip_tls_verify: bool,
}

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cluster API access.
    pub kube: KubeConfig,
    /// Root directory uploads are staged under (the shared input volume).
    pub storage_dir: PathBuf,
    /// Where the results volume is mounted, for result downloads.
    pub results_dir: PathBuf,
    /// Status-writing authority.
    pub reconcile_mode: ReconcileMode,
    /// Monitor poll interval and deadline.
    pub monitor: MonitorConfig,
    /// Upper bound on reconciling a single item while listing.
    pub list_item_budget: Duration,
    /// Images and resource profiles per workload kind.
    pub builder: BuilderConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = match lookup("SIMFORGE_KUBE_API_URL") {
            Some(url) => url,
            None => match (
                lookup("KUBERNETES_SERVICE_HOST"),
                lookup("KUBERNETES_SERVICE_PORT"),
            ) {
                (Some(host), Some(port)) => format!("https://{}:{}", host, port),
                (Some(host), None) => format!("https://{}", host),
                _ => {
                    return Err(ConfigError::MissingEnvVar(
                        "SIMFORGE_KUBE_API_URL or KUBERNETES_SERVICE_HOST",
                    ));
                }
            },
        };

        let namespace = lookup("SIMFORGE_NAMESPACE").unwrap_or_else(|| "default".to_string());

        let sa_dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token = lookup("SIMFORGE_KUBE_TOKEN").or_else(|| {
            std::fs::read_to_string(sa_dir.join("token"))
                .ok()
                .map(|t| t.trim().to_string())
        });
        let ca_path = lookup("SIMFORGE_KUBE_CA_PATH")
            .map(PathBuf::from)
            .or_else(|| Some(sa_dir.join("ca.crt")).filter(|p| p.exists()));

        let skip_tls_verify = lookup("SIMFORGE_SKIP_TLS_VERIFY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let storage_dir = PathBuf::from(
            lookup("SIMFORGE_STORAGE_DIR").unwrap_or_else(|| "/pvc/simulations".to_string()),
        );

        let results_dir = PathBuf::from(
            lookup("SIMFORGE_RESULTS_DIR").unwrap_or_else(|| "/pvc/results".to_string()),
        );

        let reconcile_mode = match lookup("SIMFORGE_RECONCILE_MODE") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::invalid("SIMFORGE_RECONCILE_MODE", &value))?,
            None => ReconcileMode::default(),
        };

        let defaults = MonitorConfig::default();
        let monitor = MonitorConfig {
            poll_interval: secs(&lookup, "SIMFORGE_MONITOR_POLL_SECS")?
                .unwrap_or(defaults.poll_interval),
            deadline: secs(&lookup, "SIMFORGE_MONITOR_DEADLINE_SECS")?
                .unwrap_or(defaults.deadline),
        };

        let list_item_budget = match number(&lookup, "SIMFORGE_LIST_ITEM_BUDGET_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis(500),
        };

        let mut builder = BuilderConfig::default();
        apply_profile(&lookup, "SIMFORGE_CFD", &mut builder.cfd);
        apply_profile(&lookup, "SIMFORGE_FEA", &mut builder.fea);
        apply_profile(&lookup, "SIMFORGE_VIZ", &mut builder.visualization);

        Ok(Self {
            kube: KubeConfig {
                api_url,
                namespace,
                token,
                ca_path,
                skip_tls_verify,
            },
            storage_dir,
            results_dir,
            reconcile_mode,
            monitor,
            list_item_budget,
            builder,
        })
    }
}

fn number<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::invalid(var, &value)),
        },
        None => Ok(None),
    }
}

fn secs<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(number(lookup, var)?.map(Duration::from_secs))
}

// Quantities are validated later, when the spec builder is constructed.
fn apply_profile<F>(lookup: &F, prefix: &str, profile: &mut ResourceProfile)
where
    F: Fn(&str) -> Option<String>,
{
    let fields: [(&str, &mut String); 5] = [
        ("IMAGE", &mut profile.image),
        ("CPU_REQUEST", &mut profile.cpu_request),
        ("CPU_LIMIT", &mut profile.cpu_limit),
        ("MEMORY_REQUEST", &mut profile.memory_request),
        ("MEMORY_LIMIT", &mut profile.memory_limit),
    ];
    for (suffix, slot) in fields {
        if let Some(value) = lookup(&format!("{}_{}", prefix, suffix)) {
            *slot = value;
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// A runtime component was not supplied.
    #[error("Missing required component: {0}")]
    MissingComponent(&'static str),
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str) -> Self {
        ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }
    }
}
