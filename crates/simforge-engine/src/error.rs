// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for simforge-engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::cluster::ClusterError;
use crate::config::ConfigError;
use crate::spec::SpecError;
use crate::validator::ValidationError;

/// Engine errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Entity is not present in the store.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`simulation`, `visualization`).
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// Entity with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// The duplicate identifier.
        id: String,
    },

    /// Workload type is not one of the supported solver types.
    #[error("Invalid workload type: '{0}' (expected 'cfd' or 'fea')")]
    InvalidType(String),

    /// Uploaded input failed structural validation.
    #[error("Invalid format: {0}")]
    InvalidFormat(#[from] ValidationError),

    /// Execution unit spec could not be built.
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Visualization address requested before the session is ready.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Cluster orchestrator call failed.
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Execution unit was submitted but the store write failed afterwards.
    #[error(
        "Cluster error: execution unit {unit} was submitted but its record could not be saved ({reason}); manual cluster cleanup may be required"
    )]
    Unrecorded {
        /// Name of the orphaned execution unit.
        unit: String,
        /// Why the store write failed.
        reason: String,
    },

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type using engine Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::Conflict { .. } => ErrorCode::Conflict,
            Error::InvalidType(_) => ErrorCode::InvalidType,
            Error::InvalidFormat(_) => ErrorCode::InvalidFormat,
            Error::Spec(SpecError::InvalidInputLocation(_)) => ErrorCode::InvalidRequest,
            Error::Spec(_) => ErrorCode::ConfigError,
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::NotReady(_) => ErrorCode::NotReady,
            Error::Cluster(ClusterError::NotFound(_)) => ErrorCode::NotFound,
            Error::Cluster(ClusterError::AlreadyExists(_)) => ErrorCode::Conflict,
            Error::Cluster(_) | Error::Unrecorded { .. } => ErrorCode::ClusterError,
            Error::Config(_) => ErrorCode::ConfigError,
            Error::Io(_) => ErrorCode::InternalError,
        }
    }
}

/// Stable, caller-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Entity or cluster resource absent.
    NotFound,
    /// Duplicate create.
    Conflict,
    /// Unsupported workload type.
    InvalidType,
    /// Structural file validation failure.
    InvalidFormat,
    /// Malformed request (empty name, unsafe path).
    InvalidRequest,
    /// Address requested before the session is ready.
    NotReady,
    /// Orchestrator call failure.
    ClusterError,
    /// Monitor deadline exceeded. Only ever recorded on a simulation's
    /// `error`, never returned from an operation.
    Timeout,
    /// Invalid engine configuration.
    ConfigError,
    /// Anything else.
    InternalError,
}

impl ErrorCode {
    /// Code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::NotReady => "NOT_READY",
            ErrorCode::ClusterError => "CLUSTER_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
