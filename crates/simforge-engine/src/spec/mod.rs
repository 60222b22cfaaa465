// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Translation of workload requests into cluster execution-unit specs.
//!
//! Simulations become single-attempt Jobs; visualizations become bare Pods
//! serving ParaView web on a websocket port. Both mount the shared input and
//! results volumes:
//!
//! | Volume               | Claim                | Mount path          |
//! |----------------------|----------------------|---------------------|
//! | input (job)          | `simulation-configs` | `/pvc`              |
//! | results (job)        | `simulation-results` | `/results`          |
//! | results (viz)        | `simulation-results` | `/data` (`subPath`) |
//!
//! Resource profiles are validated once in [`SpecBuilder::new`], so a bad
//! quantity stops startup instead of failing individual submissions.

mod quantity;

use std::collections::BTreeMap;

use crate::types::{SimulationType, simulation_unit_name, visualization_unit_name};

/// Port the visualization server listens on.
pub const VISUALIZATION_PORT: u16 = 9000;

/// Mount point of the input volume in solver containers.
const INPUT_MOUNT: &str = "/pvc";
/// Directory inside the input volume that holds staged inputs.
const INPUT_ROOT: &str = "/pvc/simulations";
/// Mount point of the results volume in solver containers.
const RESULTS_MOUNT: &str = "/results";
/// Mount point of result data in visualization containers.
const VIZ_DATA_MOUNT: &str = "/data";
/// Pod security fsGroup so solvers can write to the shared volumes.
const FS_GROUP: i64 = 1000;

/// Spec construction errors.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// Input location is not a safe relative path.
    #[error("Invalid input location '{0}': expected a relative path of [A-Za-z0-9._/-] without '..'")]
    InvalidInputLocation(String),

    /// A profile field is empty.
    #[error("Missing {field} for {kind} workloads")]
    MissingResource {
        /// Workload kind.
        kind: &'static str,
        /// Profile field.
        field: &'static str,
    },

    /// A quantity could not be parsed.
    #[error("Invalid {field} quantity '{value}' for {kind} workloads")]
    InvalidQuantity {
        /// Workload kind.
        kind: &'static str,
        /// Profile field.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// A quantity is zero.
    #[error("{field} for {kind} workloads must be greater than zero")]
    ZeroQuantity {
        /// Workload kind.
        kind: &'static str,
        /// Profile field.
        field: &'static str,
    },

    /// A limit is smaller than its request.
    #[error("{resource} limit is below its request for {kind} workloads")]
    LimitBelowRequest {
        /// Workload kind.
        kind: &'static str,
        /// `cpu` or `memory`.
        resource: &'static str,
    },
}

/// Image and resource bounds for one workload kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceProfile {
    /// Container image.
    pub image: String,
    /// CPU request (e.g. `500m`).
    pub cpu_request: String,
    /// CPU limit (e.g. `2`).
    pub cpu_limit: String,
    /// Memory request (e.g. `1Gi`).
    pub memory_request: String,
    /// Memory limit (e.g. `4Gi`).
    pub memory_limit: String,
}

impl ResourceProfile {
    fn new(image: &str, cpu: (&str, &str), memory: (&str, &str)) -> Self {
        Self {
            image: image.to_string(),
            cpu_request: cpu.0.to_string(),
            cpu_limit: cpu.1.to_string(),
            memory_request: memory.0.to_string(),
            memory_limit: memory.1.to_string(),
        }
    }

    fn validate(&self, kind: &'static str) -> Result<(), SpecError> {
        if self.image.trim().is_empty() {
            return Err(SpecError::MissingResource {
                kind,
                field: "image",
            });
        }
        let cpu_request = bound(kind, "cpu request", &self.cpu_request, quantity::parse_cpu)?;
        let cpu_limit = bound(kind, "cpu limit", &self.cpu_limit, quantity::parse_cpu)?;
        let memory_request = bound(
            kind,
            "memory request",
            &self.memory_request,
            quantity::parse_memory,
        )?;
        let memory_limit = bound(
            kind,
            "memory limit",
            &self.memory_limit,
            quantity::parse_memory,
        )?;

        if cpu_limit < cpu_request {
            return Err(SpecError::LimitBelowRequest {
                kind,
                resource: "cpu",
            });
        }
        if memory_limit < memory_request {
            return Err(SpecError::LimitBelowRequest {
                kind,
                resource: "memory",
            });
        }
        Ok(())
    }

    fn requirements(&self) -> ResourceRequirements {
        ResourceRequirements {
            cpu_request: self.cpu_request.trim().to_string(),
            cpu_limit: self.cpu_limit.trim().to_string(),
            memory_request: self.memory_request.trim().to_string(),
            memory_limit: self.memory_limit.trim().to_string(),
        }
    }
}

fn bound(
    kind: &'static str,
    field: &'static str,
    value: &str,
    parse: fn(&str) -> Option<u64>,
) -> Result<u64, SpecError> {
    if value.trim().is_empty() {
        return Err(SpecError::MissingResource { kind, field });
    }
    match parse(value) {
        Some(0) => Err(SpecError::ZeroQuantity { kind, field }),
        Some(n) => Ok(n),
        None => Err(SpecError::InvalidQuantity {
            kind,
            field,
            value: value.to_string(),
        }),
    }
}

/// Profiles and volume claims the builder works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// OpenFOAM solver profile.
    pub cfd: ResourceProfile,
    /// CalculiX solver profile.
    pub fea: ResourceProfile,
    /// ParaView web profile.
    pub visualization: ResourceProfile,
    /// Claim holding staged inputs.
    pub input_claim: String,
    /// Claim holding solver results.
    pub results_claim: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            cfd: ResourceProfile::new(
                "openfoam/openfoam10-paraview56",
                ("500m", "2"),
                ("1Gi", "4Gi"),
            ),
            fea: ResourceProfile::new("calculix/ccx:latest", ("500m", "1"), ("512Mi", "1Gi")),
            visualization: ResourceProfile::new(
                "kitware/paraview:pvw-v5.7.1-osmesa-py2",
                ("1", "2"),
                ("2Gi", "4Gi"),
            ),
            input_claim: "simulation-configs".to_string(),
            results_claim: "simulation-results".to_string(),
        }
    }
}

/// Kind of cluster execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Batch Job (simulations).
    Job,
    /// Bare Pod (visualizations).
    Pod,
}

impl UnitKind {
    /// Kind name as the cluster spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Job => "Job",
            UnitKind::Pod => "Pod",
        }
    }
}

/// CPU/memory requests and limits, in cluster quantity notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequirements {
    /// CPU request.
    pub cpu_request: String,
    /// CPU limit.
    pub cpu_limit: String,
    /// Memory request.
    pub memory_request: String,
    /// Memory limit.
    pub memory_limit: String,
}

/// A volume mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Volume name.
    pub volume: String,
    /// Path inside the container.
    pub mount_path: String,
    /// Sub-path within the volume.
    pub sub_path: Option<String>,
}

/// A persistent volume claim attached to the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Volume name referenced by mounts.
    pub name: String,
    /// Claim name.
    pub claim_name: String,
}

/// A named container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// Port name.
    pub name: String,
    /// Port number.
    pub container_port: u16,
}

/// The single container of an execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Entrypoint and arguments.
    pub command: Vec<String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Volume mounts.
    pub mounts: Vec<MountSpec>,
    /// Exposed ports.
    pub ports: Vec<PortSpec>,
    /// Resource bounds.
    pub resources: ResourceRequirements,
}

/// Cluster-native description of a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnitSpec {
    /// Unit name (`sim-<id>` or `viz-<id>`).
    pub name: String,
    /// Job or Pod.
    pub kind: UnitKind,
    /// Metadata labels.
    pub labels: BTreeMap<String, String>,
    /// The workload container.
    pub container: ContainerSpec,
    /// Claims attached to the pod.
    pub volumes: Vec<VolumeSpec>,
    /// Retries allowed for a Job (`None` for Pods).
    pub backoff_limit: Option<i32>,
    /// Pod security fsGroup.
    pub fs_group: Option<i64>,
}

/// Builds execution-unit specs from validated resource profiles.
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    config: BuilderConfig,
}

impl SpecBuilder {
    /// Validate the profiles and create a builder.
    pub fn new(config: BuilderConfig) -> Result<Self, SpecError> {
        config.cfd.validate("cfd")?;
        config.fea.validate("fea")?;
        config.visualization.validate("visualization")?;
        for (field, claim) in [
            ("input claim", &config.input_claim),
            ("results claim", &config.results_claim),
        ] {
            if claim.trim().is_empty() {
                return Err(SpecError::MissingResource {
                    kind: "volume",
                    field,
                });
            }
        }
        Ok(Self { config })
    }

    /// Build the Job for a simulation whose input is staged at
    /// `input_location` (relative to the input root). Results land under
    /// the results volume at `<id>`.
    pub fn build_simulation(
        &self,
        id: &str,
        sim_type: SimulationType,
        input_location: &str,
    ) -> Result<ExecutionUnitSpec, SpecError> {
        check_location(input_location)?;

        let input_dir = format!("{}/{}", INPUT_ROOT, input_location);
        let results_dir = format!("{}/{}", RESULTS_MOUNT, id);
        let (profile, script) = match sim_type {
            SimulationType::Cfd => (
                &self.config.cfd,
                format!(
                    "cd {input} && tar -xzf *.tar.gz && ./Allrun && mkdir -p {results} && cp -r . {results}/",
                    input = input_dir,
                    results = results_dir
                ),
            ),
            SimulationType::Fea => (
                &self.config.fea,
                format!(
                    "mkdir -p {results} && cp {input}/input.inp /tmp/ && cd /tmp && ccx input && cp *.frd *.dat {results}/",
                    input = input_dir,
                    results = results_dir
                ),
            ),
        };

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "simulation".to_string());
        labels.insert("type".to_string(), sim_type.as_str().to_string());
        labels.insert("id".to_string(), id.to_string());

        Ok(ExecutionUnitSpec {
            name: simulation_unit_name(id),
            kind: UnitKind::Job,
            labels,
            container: ContainerSpec {
                name: "solver".to_string(),
                image: profile.image.clone(),
                command: vec!["/bin/bash".to_string(), "-c".to_string(), script],
                working_dir: Some(input_dir),
                mounts: vec![
                    MountSpec {
                        volume: "input".to_string(),
                        mount_path: INPUT_MOUNT.to_string(),
                        sub_path: None,
                    },
                    MountSpec {
                        volume: "results".to_string(),
                        mount_path: RESULTS_MOUNT.to_string(),
                        sub_path: None,
                    },
                ],
                ports: Vec::new(),
                resources: profile.requirements(),
            },
            volumes: vec![
                VolumeSpec {
                    name: "input".to_string(),
                    claim_name: self.config.input_claim.clone(),
                },
                VolumeSpec {
                    name: "results".to_string(),
                    claim_name: self.config.results_claim.clone(),
                },
            ],
            backoff_limit: Some(0),
            fs_group: Some(FS_GROUP),
        })
    }

    /// Build the Pod for a visualization session over `result_location`.
    pub fn build_visualization(
        &self,
        id: &str,
        result_location: &str,
    ) -> Result<ExecutionUnitSpec, SpecError> {
        check_location(result_location)?;
        let profile = &self.config.visualization;

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "paraview-viz".to_string());
        labels.insert("id".to_string(), id.to_string());

        Ok(ExecutionUnitSpec {
            name: visualization_unit_name(id),
            kind: UnitKind::Pod,
            labels,
            container: ContainerSpec {
                name: "paraview".to_string(),
                image: profile.image.clone(),
                command: vec![
                    "/bin/bash".to_string(),
                    "-c".to_string(),
                    format!(
                        "cd /pvw && python -m light_viz.server --port {} --data {}",
                        VISUALIZATION_PORT, VIZ_DATA_MOUNT
                    ),
                ],
                working_dir: None,
                mounts: vec![MountSpec {
                    volume: "results".to_string(),
                    mount_path: VIZ_DATA_MOUNT.to_string(),
                    sub_path: Some(result_location.to_string()),
                }],
                ports: vec![PortSpec {
                    name: "ws".to_string(),
                    container_port: VISUALIZATION_PORT,
                }],
                resources: profile.requirements(),
            },
            volumes: vec![VolumeSpec {
                name: "results".to_string(),
                claim_name: self.config.results_claim.clone(),
            }],
            backoff_limit: None,
            fs_group: None,
        })
    }
}

/// Reject locations that could escape the volume or break the shell command.
fn check_location(location: &str) -> Result<(), SpecError> {
    let safe_chars = location
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'));
    let escapes = location.split('/').any(|segment| segment == "..");
    if location.is_empty() || location.starts_with('/') || !safe_chars || escapes {
        return Err(SpecError::InvalidInputLocation(location.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SpecBuilder {
        SpecBuilder::new(BuilderConfig::default()).unwrap()
    }

    #[test]
    fn test_cfd_job() {
        let spec = builder()
            .build_simulation("a1b2c3", SimulationType::Cfd, "a1b2c3")
            .unwrap();
        assert_eq!(spec.name, "sim-a1b2c3");
        assert_eq!(spec.kind, UnitKind::Job);
        assert_eq!(spec.backoff_limit, Some(0));
        assert_eq!(spec.fs_group, Some(1000));
        assert_eq!(spec.labels["type"], "cfd");
        assert!(spec.container.image.contains("openfoam"));
        assert!(spec.container.command[2].contains("./Allrun"));
        assert!(spec.container.command[2].contains("/pvc/simulations/a1b2c3"));
        assert_eq!(
            spec.container.working_dir.as_deref(),
            Some("/pvc/simulations/a1b2c3")
        );
        assert_eq!(spec.volumes.len(), 2);
    }

    #[test]
    fn test_fea_job() {
        let spec = builder()
            .build_simulation("f00d", SimulationType::Fea, "f00d")
            .unwrap();
        assert_eq!(spec.container.image, "calculix/ccx:latest");
        assert!(spec.container.command[2].contains("ccx input"));
        assert!(spec.container.command[2].contains("/results/f00d"));
        assert_eq!(spec.container.resources.memory_limit, "1Gi");
    }

    #[test]
    fn test_visualization_pod() {
        let spec = builder().build_visualization("v1", "a1b2c3").unwrap();
        assert_eq!(spec.name, "viz-v1");
        assert_eq!(spec.kind, UnitKind::Pod);
        assert_eq!(spec.container.ports[0].name, "ws");
        assert_eq!(spec.container.ports[0].container_port, 9000);
        assert_eq!(spec.container.mounts[0].mount_path, "/data");
        assert_eq!(spec.container.mounts[0].sub_path.as_deref(), Some("a1b2c3"));
        assert_eq!(spec.backoff_limit, None);
    }

    #[test]
    fn test_unsafe_locations_rejected() {
        let b = builder();
        for location in ["", "/etc", "../x", "a/../../b", "a;rm -rf /", "a b", "$(id)"] {
            let err = b
                .build_simulation("x", SimulationType::Cfd, location)
                .unwrap_err();
            assert!(
                matches!(err, SpecError::InvalidInputLocation(_)),
                "{}",
                location
            );
        }
        assert!(b.build_simulation("x", SimulationType::Cfd, "x/case.v2").is_ok());
    }

    #[test]
    fn test_missing_bound_fails_fast() {
        let mut config = BuilderConfig::default();
        config.fea.memory_limit = String::new();
        assert!(matches!(
            SpecBuilder::new(config),
            Err(SpecError::MissingResource { kind: "fea", .. })
        ));
    }

    #[test]
    fn test_zero_and_garbage_quantities_rejected() {
        let mut config = BuilderConfig::default();
        config.cfd.cpu_request = "0m".to_string();
        assert!(matches!(
            SpecBuilder::new(config),
            Err(SpecError::ZeroQuantity { kind: "cfd", .. })
        ));

        let mut config = BuilderConfig::default();
        config.visualization.memory_request = "plenty".to_string();
        assert!(matches!(
            SpecBuilder::new(config),
            Err(SpecError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_limit_below_request_rejected() {
        let mut config = BuilderConfig::default();
        config.cfd.memory_limit = "512Mi".to_string();
        assert!(matches!(
            SpecBuilder::new(config),
            Err(SpecError::LimitBelowRequest {
                kind: "cfd",
                resource: "memory"
            })
        ));
    }
}
