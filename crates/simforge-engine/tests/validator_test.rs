// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Upload validation against real archive and deck fixtures.

mod common;

use common::*;
use simforge_engine::SimulationType;
use simforge_engine::validator::{
    MAX_CFD_ARCHIVE_BYTES, MAX_FEA_INPUT_BYTES, ValidationError, validate,
};

fn check_cfd(filename: &str, content: &[u8]) -> Result<(), ValidationError> {
    validate(SimulationType::Cfd, filename, content.len() as u64, content)
}

fn check_fea(filename: &str, content: &[u8]) -> Result<(), ValidationError> {
    validate(SimulationType::Fea, filename, content.len() as u64, content)
}

#[test]
fn test_complete_case_accepted() {
    assert_eq!(check_cfd("run.tar.gz", &valid_case_archive()), Ok(()));
}

#[test]
fn test_case_with_dot_slash_prefix_accepted() {
    let archive = case_archive(&[
        "./system/controlDict",
        "./system/fvSchemes",
        "./system/fvSolution",
        "./constant/transportProperties",
        "./constant/polyMesh/boundary",
    ]);
    assert_eq!(check_cfd("case.tar.gz", &archive), Ok(()));
}

#[test]
fn test_missing_mesh_reported_even_when_files_present() {
    let err = check_cfd("run.tar.gz", &case_archive(&CASE_FILES)).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingCaseEntries(vec!["constant/polyMesh"])
    );
}

#[test]
fn test_missing_entries_listed_in_order() {
    let archive = case_archive(&["cavity/system/fvSchemes", MESH_FILE]);
    let err = check_cfd("run.tar.gz", &archive).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingCaseEntries(vec![
            "system/controlDict",
            "system/fvSolution",
            "constant/transportProperties",
        ])
    );
    assert!(err.to_string().contains("system/controlDict, system/fvSolution"));
}

#[test]
fn test_not_an_archive_is_corrupt() {
    let err = check_cfd("run.tar.gz", b"definitely not gzip").unwrap_err();
    assert!(matches!(err, ValidationError::Corrupt(_)));
}

#[test]
fn test_cfd_rejects_deck_extension() {
    let err = check_cfd("cavity.inp", &fea_deck()).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::WrongExtension { expected: ".tar.gz", .. }
    ));
    assert!(err.to_string().contains("cavity.inp"));
}

#[test]
fn test_oversized_archive_rejected_by_declared_size() {
    let err = validate(
        SimulationType::Cfd,
        "run.tar.gz",
        MAX_CFD_ARCHIVE_BYTES + 1,
        &valid_case_archive(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ValidationError::TooLarge {
            size: MAX_CFD_ARCHIVE_BYTES + 1,
            max: MAX_CFD_ARCHIVE_BYTES,
        }
    );
}

#[test]
fn test_deck_accepted() {
    assert_eq!(check_fea("beam.inp", &fea_deck()), Ok(()));
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert_eq!(check_fea("beam.inp", b"*node\n1,0,0,0\n*element, type=c3d8\n"), Ok(()));
}

#[test]
fn test_deck_missing_element_keyword() {
    let mut deck = b"*HEADING\nbracket\n*NODE\n".to_vec();
    while deck.len() < 10 * 1024 {
        deck.extend_from_slice(b"1, 0.0, 0.0, 0.0\n");
    }
    let err = check_fea("bracket.inp", &deck).unwrap_err();
    assert_eq!(err, ValidationError::MissingKeywords(vec!["*ELEMENT"]));
}

#[test]
fn test_keyword_beyond_scan_window_not_seen() {
    let mut deck = b"*NODE\n".to_vec();
    deck.resize(2048, b' ');
    deck.extend_from_slice(b"*ELEMENT, TYPE=C3D8\n");
    let err = check_fea("late.inp", &deck).unwrap_err();
    assert_eq!(err, ValidationError::MissingKeywords(vec!["*ELEMENT"]));
}

#[test]
fn test_oversized_deck_rejected() {
    let err = validate(
        SimulationType::Fea,
        "beam.inp",
        MAX_FEA_INPUT_BYTES + 1,
        &fea_deck(),
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::TooLarge { .. }));
}
