// crates/report-registry-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing, bounded reads, and wiring.
// Purpose: Ensure CLI inputs fail closed and commands reach the registry.
// Dependencies: report-registry-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Validates `read_bytes_with_limit`, `NAME=VALUE` parsing, user resolution,
//! and that `App` dispatches user commands against a temporary state dir.
//!
//! Security posture: CLI inputs are untrusted; size limits must fail closed.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use clap::Parser;
use report_registry_config::RegistryConfig;
use report_registry_core::RequestContext;
use tempfile::TempDir;

use super::App;
use super::Cli;
use super::Commands;
use super::ReadLimitError;
use super::checked_uuid;
use super::parse_param_assignment;
use super::read_bytes_with_limit;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn app(dir: &TempDir) -> App {
    let toml = format!("state_dir = \"{}\"\n", dir.path().join("state").display());
    let config = RegistryConfig::from_toml(&toml).expect("config");
    App::open(config).expect("open")
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

#[test]
fn read_bytes_with_limit_accepts_small_files() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("small.asc");
    fs::write(&path, b"abc").expect("write");
    assert_eq!(read_bytes_with_limit(&path, 3).expect("read"), b"abc");
}

#[test]
fn read_bytes_with_limit_rejects_oversized_files() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("large.asc");
    fs::write(&path, vec![b'x'; 16]).expect("write");
    match read_bytes_with_limit(&path, 8) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 16);
            assert_eq!(limit, 8);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[test]
fn read_bytes_with_limit_reports_missing_files() {
    let dir = TempDir::new().expect("tempdir");
    assert!(matches!(read_bytes_with_limit(&dir.path().join("absent"), 8), Err(ReadLimitError::Io(_))));
}

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn param_assignments_split_on_the_first_equals() {
    let update = parse_param_assignment("Filter=a=b").expect("parse");
    assert_eq!(update.name, "Filter");
    assert_eq!(update.value, "a=b");
    assert_eq!(parse_param_assignment("Rows=").expect("empty value").value, "");
    assert!(parse_param_assignment("Rows").is_err());
    assert!(parse_param_assignment("=3").is_err());
}

#[test]
fn modify_arguments_parse_into_a_request() {
    let cli = Cli::try_parse_from([
        "report-registry",
        "--user",
        "admin",
        "modify",
        "a3810a62-1f62-11e1-9fc4-406186ea4fc5",
        "--active",
        "false",
        "--param",
        "Rows=5",
    ])
    .expect("parse");
    assert_eq!(cli.user.as_deref(), Some("admin"));
    let Commands::Modify(command) = cli.command else {
        panic!("expected modify");
    };
    assert_eq!(command.active, Some(false));
    assert_eq!(command.name, None);
    assert_eq!(command.param.expect("param").value, "5");
}

#[test]
fn supplied_uuids_must_be_well_formed() {
    assert!(checked_uuid(Some("not-a-uuid".to_string())).is_err());
    let uuid = checked_uuid(Some("7a8cb5b4-b74d-11e2-8187-406186ea4fc5".to_string())).expect("uuid");
    assert_eq!(uuid.as_str(), "7a8cb5b4-b74d-11e2-8187-406186ea4fc5");
    assert!(checked_uuid(None).is_ok());
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

#[test]
fn users_resolve_by_uuid_or_name() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(&dir);
    app.add_user("admin", Some("0f000000-0000-4000-8000-000000000001".to_string())).expect("add user");

    let by_name = app.resolve_user(Some("admin")).expect("by name");
    let by_uuid = app.resolve_user(Some("0f000000-0000-4000-8000-000000000001")).expect("by uuid");
    assert_eq!(by_name, by_uuid);
    assert!(app.resolve_user(Some("nobody")).is_err());
    assert!(app.resolve_user(None).is_err());
}

#[test]
fn list_runs_against_an_empty_registry() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(&dir);
    app.add_user("admin", None).expect("add user");
    let user = app.resolve_user(Some("admin")).expect("user");
    let ctx = RequestContext::new(&user, app.authorizer.as_ref());
    app.run_as_user(
        &ctx,
        Commands::List {
            trash: false,
        },
    )
    .expect("list");
    let err = app
        .run_as_user(
            &ctx,
            Commands::Verify {
                uuid: "a3810a62-1f62-11e1-9fc4-406186ea4fc5".to_string(),
            },
        )
        .expect_err("missing");
    assert!(err.to_string().starts_with("not_found"));
}

#[test]
fn sync_feed_requires_a_feed_section() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(&dir);
    assert!(app.sync_feed(false, false).is_err());
}
