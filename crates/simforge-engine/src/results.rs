// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Result archives read from the shared results volume.
//!
//! A solver Job copies its output to `/results/<id>` on the results claim.
//! The same claim is mounted here at the results root, and a simulation's
//! directory is streamed back as a `.tar.gz` built on a blocking thread.

use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::DuplexStream;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Buffer between the archiving thread and the reader.
const PIPE_CAPACITY: usize = 64 * 1024;

/// A result directory being archived.
///
/// The archive is produced while it is read; dropping the reader stops it.
pub struct ResultArchive {
    /// Suggested download name, `<id>-results.tar.gz`.
    pub file_name: String,
    reader: DuplexStream,
}

impl ResultArchive {
    /// Gzip-compressed tar bytes.
    pub fn into_reader(self) -> DuplexStream {
        self.reader
    }
}

/// Read access to the results volume.
#[derive(Debug, Clone)]
pub struct ResultsVolume {
    root: PathBuf,
}

impl ResultsVolume {
    /// Results volume mounted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start archiving `<root>/<result_path>` for simulation `id`.
    ///
    /// Entries are stored under `<id>/`. Symlinks are archived as links and
    /// never followed.
    pub async fn archive(&self, id: &str, result_path: &str) -> Result<ResultArchive> {
        let relative = Path::new(result_path);
        if result_path.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidRequest(format!(
                "Invalid result location: '{}'",
                result_path
            )));
        }

        let dir = self.root.join(relative);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Error::not_found("results", id)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found("results", id));
            }
            Err(e) => return Err(e.into()),
        }

        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let bridge = SyncIoBridge::new(writer);
        let prefix = id.to_string();

        debug!(simulation_id = %id, path = %dir.display(), "Archiving results");
        tokio::task::spawn_blocking(move || {
            if let Err(e) = write_archive(bridge, &prefix, &dir) {
                warn!(simulation_id = %prefix, error = %e, "Result archive aborted");
            }
        });

        Ok(ResultArchive {
            file_name: format!("{}-results.tar.gz", id),
            reader,
        })
    }
}

fn write_archive(
    out: SyncIoBridge<DuplexStream>,
    prefix: &str,
    dir: &Path,
) -> std::io::Result<()> {
    let mut tar = tar::Builder::new(GzEncoder::new(out, Compression::default()));
    tar.follow_symlinks(false);
    tar.append_dir_all(prefix, dir)?;
    let mut out = tar.into_inner()?.finish()?;
    out.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn read_entries(archive: ResultArchive) -> Vec<String> {
        let mut bytes = Vec::new();
        archive
            .into_reader()
            .read_to_end(&mut bytes)
            .await
            .unwrap();

        let mut tar = tar::Archive::new(GzDecoder::new(&bytes[..]));
        let mut names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_archives_directory_under_id() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("abc");
        std::fs::create_dir_all(dir.join("0.5")).unwrap();
        std::fs::write(dir.join("input.frd"), b"frd").unwrap();
        std::fs::write(dir.join("0.5").join("U"), b"field").unwrap();

        let volume = ResultsVolume::new(temp.path());
        let archive = volume.archive("abc", "abc").await.unwrap();
        assert_eq!(archive.file_name, "abc-results.tar.gz");

        let names = read_entries(archive).await;
        assert!(names.contains(&"abc/input.frd".to_string()), "{:?}", names);
        assert!(names.contains(&"abc/0.5/U".to_string()), "{:?}", names);
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let volume = ResultsVolume::new(temp.path());

        let err = volume.archive("abc", "abc").await.err().unwrap();
        assert!(matches!(err, Error::NotFound { entity: "results", .. }));
    }

    #[tokio::test]
    async fn test_rejects_escaping_location() {
        let temp = TempDir::new().unwrap();
        let volume = ResultsVolume::new(temp.path());

        for location in ["../etc", "/etc", ""] {
            let err = volume.archive("abc", location).await.err().unwrap();
            assert!(matches!(err, Error::InvalidRequest(_)), "{}", location);
        }
    }
}
