// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structural checks on uploaded solver inputs.
//!
//! | Type | Suffix    | Max size | Content check                                  |
//! |------|-----------|----------|------------------------------------------------|
//! | cfd  | `.tar.gz` | 100 MiB  | OpenFOAM case files and `constant/polyMesh`    |
//! | fea  | `.inp`    | 50 MiB   | `*NODE` and `*ELEMENT` in the first 1024 bytes |
//!
//! Checks only look at structure; nothing is executed or extracted to disk.

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::types::SimulationType;

/// Largest accepted CFD archive.
pub const MAX_CFD_ARCHIVE_BYTES: u64 = 100 * 1024 * 1024;
/// Largest accepted FEA input deck.
pub const MAX_FEA_INPUT_BYTES: u64 = 50 * 1024 * 1024;

/// Bytes of an FEA deck scanned for keywords.
const FEA_SCAN_BYTES: usize = 1024;

const REQUIRED_CASE_FILES: [&str; 4] = [
    "system/controlDict",
    "system/fvSchemes",
    "system/fvSolution",
    "constant/transportProperties",
];
const MESH_DIR: &str = "constant/polyMesh";
const FEA_KEYWORDS: [&str; 2] = ["*NODE", "*ELEMENT"];

/// Validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// File name does not carry the expected suffix.
    #[error("{sim_type} simulation requires a {expected} file, got: {filename}")]
    WrongExtension {
        /// Workload type.
        sim_type: SimulationType,
        /// Required suffix.
        expected: &'static str,
        /// Name as uploaded.
        filename: String,
    },

    /// File exceeds the size limit.
    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge {
        /// Declared size.
        size: u64,
        /// Limit for the workload type.
        max: u64,
    },

    /// Archive could not be decompressed or read.
    #[error("unreadable archive: {0}")]
    Corrupt(String),

    /// OpenFOAM case entries are absent.
    #[error("missing required OpenFOAM case entries: {}", .0.join(", "))]
    MissingCaseEntries(Vec<&'static str>),

    /// CalculiX keywords are absent.
    #[error("invalid CalculiX input: missing keywords {}", .0.join(", "))]
    MissingKeywords(Vec<&'static str>),
}

/// Check an upload against the rules for its workload type.
///
/// `size` is the declared upload size and is checked before any content is
/// read.
pub fn validate(
    sim_type: SimulationType,
    filename: &str,
    size: u64,
    content: &[u8],
) -> Result<(), ValidationError> {
    match sim_type {
        SimulationType::Cfd => validate_case_archive(filename, size, content),
        SimulationType::Fea => validate_input_deck(filename, size, content),
    }
}

fn check_envelope(
    sim_type: SimulationType,
    filename: &str,
    expected: &'static str,
    size: u64,
    max: u64,
) -> Result<(), ValidationError> {
    if !filename.ends_with(expected) {
        return Err(ValidationError::WrongExtension {
            sim_type,
            expected,
            filename: filename.to_string(),
        });
    }
    if size > max {
        return Err(ValidationError::TooLarge { size, max });
    }
    Ok(())
}

fn validate_case_archive(filename: &str, size: u64, content: &[u8]) -> Result<(), ValidationError> {
    check_envelope(
        SimulationType::Cfd,
        filename,
        ".tar.gz",
        size,
        MAX_CFD_ARCHIVE_BYTES,
    )?;

    let mut found = [false; REQUIRED_CASE_FILES.len()];
    let mut has_mesh = false;

    let mut archive = tar::Archive::new(GzDecoder::new(content));
    let entries = archive
        .entries()
        .map_err(|e| ValidationError::Corrupt(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| ValidationError::Corrupt(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| ValidationError::Corrupt(e.to_string()))?;
        let path = path.to_string_lossy();
        let path = path.strip_prefix("./").unwrap_or(&*path);
        let path = path.trim_end_matches('/');

        for (slot, required) in found.iter_mut().zip(REQUIRED_CASE_FILES) {
            if path.ends_with(required) {
                *slot = true;
            }
        }
        if path.contains(MESH_DIR) {
            has_mesh = true;
        }
    }

    let mut missing: Vec<&'static str> = REQUIRED_CASE_FILES
        .iter()
        .zip(found)
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if !has_mesh {
        missing.push(MESH_DIR);
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingCaseEntries(missing))
    }
}

fn validate_input_deck(filename: &str, size: u64, content: &[u8]) -> Result<(), ValidationError> {
    check_envelope(
        SimulationType::Fea,
        filename,
        ".inp",
        size,
        MAX_FEA_INPUT_BYTES,
    )?;

    let head = &content[..content.len().min(FEA_SCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_uppercase();

    let missing: Vec<&'static str> = FEA_KEYWORDS
        .into_iter()
        .filter(|keyword| !head.contains(keyword))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingKeywords(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_extension() {
        let err = validate(SimulationType::Cfd, "case.zip", 10, b"").unwrap_err();
        assert!(matches!(err, ValidationError::WrongExtension { expected: ".tar.gz", .. }));

        let err = validate(SimulationType::Fea, "beam.INP", 10, b"*NODE\n*ELEMENT").unwrap_err();
        assert!(matches!(err, ValidationError::WrongExtension { expected: ".inp", .. }));
    }

    #[test]
    fn test_size_checked_before_content() {
        // Content would pass, declared size does not.
        let err = validate(
            SimulationType::Fea,
            "beam.inp",
            MAX_FEA_INPUT_BYTES + 1,
            b"*NODE\n*ELEMENT\n",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));

        // Content is garbage, size error still wins.
        let err = validate(
            SimulationType::Cfd,
            "case.tar.gz",
            MAX_CFD_ARCHIVE_BYTES + 1,
            b"not gzip",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));
    }

    #[test]
    fn test_fea_keywords_case_insensitive() {
        let deck = b"** beam\n*node\n1, 0, 0, 0\n*Element, type=C3D8\n";
        assert!(validate(SimulationType::Fea, "beam.inp", deck.len() as u64, deck).is_ok());
    }

    #[test]
    fn test_fea_names_only_missing_keyword() {
        let deck = b"*NODE\n1, 0, 0, 0\n";
        let err = validate(SimulationType::Fea, "beam.inp", deck.len() as u64, deck).unwrap_err();
        assert_eq!(err, ValidationError::MissingKeywords(vec!["*ELEMENT"]));
        assert!(err.to_string().contains("*ELEMENT"));
        assert!(!err.to_string().contains("*NODE"));
    }

    #[test]
    fn test_fea_keywords_past_scan_window_ignored() {
        let mut deck = b"*NODE\n".to_vec();
        deck.resize(FEA_SCAN_BYTES + 10, b' ');
        deck.extend_from_slice(b"*ELEMENT\n");
        let err = validate(SimulationType::Fea, "beam.inp", deck.len() as u64, &deck).unwrap_err();
        assert_eq!(err, ValidationError::MissingKeywords(vec!["*ELEMENT"]));
    }

    #[test]
    fn test_corrupt_archive() {
        let err = validate(SimulationType::Cfd, "case.tar.gz", 8, b"not gzip").unwrap_err();
        assert!(matches!(err, ValidationError::Corrupt(_)));
    }
}
