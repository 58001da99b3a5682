// crates/report-registry-core/tests/canonical_string.rs
// ============================================================================
// Module: Canonical String Tests
// Description: Input-order independence of the signed byte layout.
// Purpose: Pin that file order never changes what a signature covers.
// ============================================================================

//! ## Overview
//! The canonical string sorts files by name before writing them, so any
//! permutation of the same file set must yield identical bytes.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use report_registry_core::ParamBounds;
use report_registry_core::ParamDefinition;
use report_registry_core::ParamType;
use report_registry_core::SignedFile;
use report_registry_core::canonical_string;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn signed(name: &str, contents: &[u8]) -> SignedFile {
    SignedFile {
        name: name.to_string(),
        contents: contents.to_vec(),
    }
}

fn rows_param() -> ParamDefinition {
    ParamDefinition {
        name: "Rows".to_string(),
        param_type: ParamType::Integer,
        value: "5".to_string(),
        fallback: "3".to_string(),
        bounds: ParamBounds::new(Some(0), Some(10)).expect("bounds"),
        options: Vec::new(),
    }
}

fn canonical(files: &[SignedFile]) -> Vec<u8> {
    canonical_string("a3810a62-1f62-11e1-9fc4-406186ea4fc5", "csv", "text/csv", false, files, &[rows_param()])
}

// ============================================================================
// SECTION: File Order
// ============================================================================

#[test]
fn reversed_file_order_yields_identical_bytes() {
    let files = vec![signed("generate", b"#!/bin/sh\n"), signed("B.xsl", b"<xsl/>"), signed("a.txt", b"a")];
    let mut reversed = files.clone();
    reversed.reverse();
    assert_eq!(canonical(&files), canonical(&reversed));
}

#[test]
fn names_sort_by_bytes_not_case_folded() {
    let upper_first = canonical(&[signed("Zed", b"1"), signed("alpha", b"2")]);
    let lower_first = canonical(&[signed("alpha", b"2"), signed("Zed", b"1")]);
    assert_eq!(upper_first, lower_first);
    let text = String::from_utf8(upper_first).expect("utf8");
    assert!(text.find("Zed1").expect("Zed") < text.find("alpha2").expect("alpha"));
}

proptest! {
    #[test]
    fn any_permutation_yields_identical_bytes(
        (original, shuffled) in prop::collection::btree_map("[A-Za-z0-9_.]{1,12}", prop::collection::vec(any::<u8>(), 0..32), 0..8)
            .prop_flat_map(|files| {
                let files: Vec<(String, Vec<u8>)> = files.into_iter().collect();
                (Just(files.clone()), Just(files).prop_shuffle())
            })
    ) {
        let to_signed = |files: &[(String, Vec<u8>)]| {
            files.iter().map(|(name, contents)| signed(name, contents)).collect::<Vec<_>>()
        };
        prop_assert_eq!(canonical(&to_signed(&original)), canonical(&to_signed(&shuffled)));
    }
}
