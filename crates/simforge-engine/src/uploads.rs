// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Staging of validated uploads on the shared input volume.
//!
//! Each workload gets `<root>/<id>/`. Files are written to a `.partial`
//! sibling and renamed into place, so a solver never sees a truncated input.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::SimulationType;

/// Name FEA decks are stored under; the solver command expects it.
pub const FEA_INPUT_NAME: &str = "input.inp";

/// Writes uploads into per-workload directories under a root.
#[derive(Debug, Clone)]
pub struct UploadStaging {
    root: PathBuf,
}

impl UploadStaging {
    /// Create a staging area rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a workload's input.
    pub fn dir_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Write an upload for workload `id` and return the staged file path.
    pub async fn stage(
        &self,
        id: &str,
        sim_type: SimulationType,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf> {
        let name = match sim_type {
            SimulationType::Fea => FEA_INPUT_NAME.to_string(),
            SimulationType::Cfd => Path::new(filename)
                .file_name()
                .and_then(|n| n.to_str())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::InvalidRequest(format!("Invalid upload file name: '{}'", filename))
                })?,
        };

        let dir = self.dir_for(id);
        tokio::fs::create_dir_all(&dir).await?;

        let target = dir.join(&name);
        let partial = dir.join(format!("{}.partial", name));

        if let Err(e) = write_then_rename(&partial, &target, content).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial upload");
            }
            return Err(e.into());
        }

        debug!(
            simulation_id = %id,
            path = %target.display(),
            bytes = content.len(),
            "Upload staged"
        );
        Ok(target)
    }

    /// Remove a workload's staged directory. Missing directories are ignored.
    pub async fn discard(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_dir_all(self.dir_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_then_rename(partial: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(partial, content).await?;
    tokio::fs::rename(partial, target).await
}
