// crates/report-registry-engine/tests/feed_sync.rs
// ============================================================================
// Module: Feed Synchronization Tests
// Description: Feed passes over a temporary feed directory.
// Purpose: Ensure feed passes create, update, skip, and prune deterministically.
// Dependencies: report-registry-engine, report-registry-store-sqlite, tempfile
// ============================================================================

//! Feed synchronization tests over a temporary feed directory.

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

mod common;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use common::FailOn;
use common::Harness;
use common::abort_writes_to;
use common::encode;
use common::fail_commit_after_write_to;
use common::sample_request;
use report_registry_core::RegistryError;
use report_registry_core::ReportFormat;
use report_registry_core::Trust;
use report_registry_engine::FeedConfig;
use report_registry_engine::FeedSyncReport;
use report_registry_engine::FeedSynchronizer;
use report_registry_store_sqlite::Location;

const FEED_FORMAT: &str = "a3810a62-1f62-11e1-9fc4-406186ea4fc5";
const IMPORT_ROLE: &str = "7a8cb5b4-b74d-11e2-8187-406186ea4fc5";

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct Feed {
    harness: Harness,
    config: FeedConfig,
}

impl Feed {
    fn new() -> Self {
        let harness = Harness::new();
        {
            let tx = harness.registry.store().begin().expect("begin");
            tx.insert_role(IMPORT_ROLE, "Observer").expect("role");
            tx.commit().expect("commit");
        }
        let dir = harness.dir.path().join("feed");
        fs::create_dir_all(dir.join("report_formats")).expect("feed dir");
        let config = FeedConfig {
            dir,
            owner_uuid: Some(harness.owner.uuid.clone()),
            import_roles: vec![IMPORT_ROLE.to_string()],
        };
        Self {
            harness,
            config,
        }
    }

    fn document_path(&self, uuid: &str) -> PathBuf {
        self.config.dir.join("report_formats").join(format!("report-format-{uuid}.xml"))
    }

    /// Writes a feed document with the given modification time offset.
    fn write(&self, uuid: &str, document: &str, age: Offset) {
        let path = self.document_path(uuid);
        fs::write(&path, document).expect("document");
        let time = match age {
            Offset::Past(secs) => SystemTime::now() - Duration::from_secs(secs),
            Offset::Future(secs) => SystemTime::now() + Duration::from_secs(secs),
        };
        fs::File::options().write(true).open(&path).expect("open").set_modified(time).expect("mtime");
    }

    fn sync(&self, rebuild: bool) -> FeedSyncReport {
        FeedSynchronizer::new(&self.harness.registry, self.config.clone()).sync(rebuild).expect("sync")
    }
}

#[derive(Clone, Copy)]
enum Offset {
    Past(u64),
    Future(u64),
}

fn document(summary: &str, script: &str, with_mode: bool) -> String {
    let mode = if with_mode {
        "<param><name>Mode</name><type>selection</type><default>brief</default>\
         <options><option>brief</option><option>full</option></options></param>"
    } else {
        ""
    };
    format!(
        "<report_format id=\"{FEED_FORMAT}\">\
         <name>CSV Results</name><extension>csv</extension><content_type>text/csv</content_type>\
         <summary>{summary}</summary><description>Results as CSV.</description>\
         <file name=\"generate\">{script}</file>\
         <param><name>Rows</name><type>integer<min>0</min><max>100</max></type><default>10</default></param>\
         {mode}\
         </report_format>",
        script = encode(script.as_bytes()),
    )
}

// ============================================================================
// SECTION: Preconditions
// ============================================================================

#[test]
fn sync_requires_feed_dir_and_owner() {
    let feed = Feed::new();
    let mut missing_dir = feed.config.clone();
    missing_dir.dir = feed.harness.dir.path().join("nowhere");
    let err = FeedSynchronizer::new(&feed.harness.registry, missing_dir).sync(false).expect_err("no dir");
    assert!(matches!(err, RegistryError::NoFeedDir(_)));

    let mut no_owner = feed.config.clone();
    no_owner.owner_uuid = None;
    let err = FeedSynchronizer::new(&feed.harness.registry, no_owner).sync(false).expect_err("no owner");
    assert_eq!(err, RegistryError::NoFeedOwner);

    let mut unknown_owner = feed.config.clone();
    unknown_owner.owner_uuid = Some("00000000-0000-4000-8000-00000000dead".to_string());
    let err = FeedSynchronizer::new(&feed.harness.registry, unknown_owner).sync(false).expect_err("unknown");
    assert_eq!(err, RegistryError::NoFeedOwner);
}

// ============================================================================
// SECTION: Passes
// ============================================================================

#[test]
fn first_pass_creates_trusted_predefined_formats() {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    let report = feed.sync(false);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);

    let format = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert!(format.predefined);
    assert_eq!(format.trust, Trust::Yes);
    assert_eq!(format.owner.as_ref().map(|owner| owner.id), Some(feed.harness.owner.id));
    assert_eq!(format.params.len(), 2);
    assert!(feed.harness.verifier.calls().is_empty());

    let tx = feed.harness.registry.store().begin_read().expect("begin");
    let role = tx.find_role(IMPORT_ROLE).expect("role").expect("role exists");
    let permissions = tx.list_permissions(Location::Active, format.id).expect("permissions");
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].name, "get_report_formats");
    assert_eq!(permissions[0].subject_type, "role");
    assert_eq!(permissions[0].subject, role);
}

#[test]
fn unchanged_documents_cause_no_writes() {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    feed.sync(false);
    let before = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");

    let report = feed.sync(false);
    assert_eq!(
        report,
        FeedSyncReport {
            skipped: 1,
            ..FeedSyncReport::default()
        }
    );
    let after = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert_eq!(after, before);
}

#[test]
fn newer_documents_update_in_place_and_prune_params() {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    feed.sync(false);
    let before = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");

    feed.write(FEED_FORMAT, &document("CSV v2", "#!/bin/sh\necho v2\n", false), Offset::Future(3600));
    let report = feed.sync(false);
    assert_eq!(report.updated, 1);
    assert_eq!(report.removed_params, 1);

    let after = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert_eq!(after.id, before.id);
    assert_eq!(after.summary, "CSV v2");
    assert!(after.modification_time > before.modification_time);
    assert_eq!(after.params.iter().map(|param| param.name.as_str()).collect::<Vec<_>>(), ["Rows"]);
    let dir = feed.harness.active_dir(FEED_FORMAT);
    assert_eq!(fs::read(dir.join("generate")).expect("script"), b"#!/bin/sh\necho v2\n");
    let parent = feed.harness.registry.layout().active_parent(Some(&feed.harness.owner.uuid));
    assert_eq!(fs::read_dir(parent).expect("parent").count(), 1);

    assert_eq!(feed.sync(false).skipped, 1);
}

#[test]
fn rebuild_rewrites_every_known_document() {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    feed.sync(false);
    let report = feed.sync(true);
    assert_eq!(report.updated, 1);
    assert_eq!(report.removed_params, 0);
    assert_eq!(feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get").params.len(), 2);
}

#[test]
fn trashed_feed_formats_are_not_recreated() {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    feed.sync(false);
    feed.harness.registry.delete(&feed.harness.ctx(), FEED_FORMAT, false).expect("trash");

    let report = feed.sync(false);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 0);
    assert!(feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).is_err());
    assert!(feed.harness.registry.get_trashed(&feed.harness.ctx(), FEED_FORMAT).is_ok());
}

#[test]
fn user_formats_holding_a_feed_uuid_are_left_alone() {
    let feed = Feed::new();
    feed.harness
        .registry
        .create(&feed.harness.ctx(), &sample_request(Some(FEED_FORMAT), "Mine"))
        .expect("user import");
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Future(60));

    let report = feed.sync(false);
    assert_eq!(report.failed, 1);
    let format = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert_eq!(format.name, "Mine");
    assert!(!format.predefined);
}

#[test]
fn bad_documents_fail_alone_and_hidden_files_are_ignored() {
    let feed = Feed::new();
    let broken = "0c4f4d58-2b4d-4d9e-9a55-16b3a8f0c001";
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    fs::write(feed.document_path(broken), "<report_format>").expect("broken");
    fs::write(feed.config.dir.join("report_formats").join(format!(".{broken}.xml")), "<x/>").expect("hidden");
    fs::write(feed.config.dir.join("report_formats").join("README"), "notes").expect("readme");

    let report = feed.sync(false);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
}

#[test]
fn unknown_import_roles_are_skipped() {
    let mut feed = Feed::new();
    feed.config.import_roles = vec!["11111111-2222-4333-8444-555555555555".to_string()];
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    assert_eq!(feed.sync(false).created, 1);

    let format = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    let tx = feed.harness.registry.store().begin_read().expect("begin");
    assert!(tx.list_permissions(Location::Active, format.id).expect("permissions").is_empty());
}

#[test]
fn feed_updates_keep_names_unique_per_owner() {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    feed.sync(false);
    feed.harness
        .side_connection()
        .execute("UPDATE report_formats SET name = 'Old Name' WHERE uuid = ?1", [FEED_FORMAT])
        .expect("rename");
    feed.harness.registry.create(&feed.harness.ctx(), &sample_request(None, "CSV Results")).expect("take name");

    feed.write(FEED_FORMAT, &document("CSV v2", "#!/bin/sh\n", true), Offset::Future(3600));
    assert_eq!(feed.sync(false).updated, 1);
    let updated = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert_eq!(updated.name, "CSV Results 1");

    assert_eq!(feed.sync(true).updated, 1);
    let rebuilt = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert_eq!(rebuilt.name, "CSV Results 1");
}

// ============================================================================
// SECTION: Update Faults
// ============================================================================

/// Syncs one document, then writes a newer revision that drops `Mode`.
fn feed_with_pending_update() -> (Feed, ReportFormat) {
    let feed = Feed::new();
    feed.write(FEED_FORMAT, &document("CSV", "#!/bin/sh\n", true), Offset::Past(3600));
    assert_eq!(feed.sync(false).created, 1);
    let before = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    feed.write(FEED_FORMAT, &document("CSV v2", "#!/bin/sh\necho v2\n", false), Offset::Future(3600));
    (feed, before)
}

/// Runs a failing pass and checks rows, params, and files are as before.
fn assert_update_undone(feed: &Feed, before: &ReportFormat) {
    let report = feed.sync(false);
    assert_eq!(report.failed, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.removed_params, 0);

    let after = feed.harness.registry.get(&feed.harness.ctx(), FEED_FORMAT).expect("get");
    assert_eq!(&after, before);
    assert_eq!(after.params.len(), 2);
    let dir = feed.harness.active_dir(FEED_FORMAT);
    assert_eq!(fs::read(dir.join("generate")).expect("script"), b"#!/bin/sh\n");

    let parent = feed.harness.registry.layout().active_parent(Some(&feed.harness.owner.uuid));
    let names: Vec<String> = fs::read_dir(parent)
        .expect("parent")
        .map(|entry| entry.expect("entry").file_name().into_string().expect("utf8"))
        .collect();
    assert_eq!(names, [FEED_FORMAT]);
}

#[test]
fn failed_feed_row_write_discards_the_staged_files() {
    let (feed, before) = feed_with_pending_update();
    abort_writes_to(&feed.harness, "UPDATE", "report_formats");
    assert_update_undone(&feed, &before);
}

#[test]
fn failed_retire_of_live_files_keeps_the_old_revision() {
    let (feed, before) = feed_with_pending_update();
    feed.harness.assets.fail_on(FailOn::Move);
    assert_update_undone(&feed, &before);

    feed.harness.assets.fail_on(FailOn::Nothing);
    assert_eq!(feed.sync(false).updated, 1);
    let dir = feed.harness.active_dir(FEED_FORMAT);
    assert_eq!(fs::read(dir.join("generate")).expect("script"), b"#!/bin/sh\necho v2\n");
}

#[test]
fn failed_swap_of_staged_files_moves_the_old_revision_back() {
    let (feed, before) = feed_with_pending_update();
    feed.harness.assets.fail_on(FailOn::NthMove(2));
    assert_update_undone(&feed, &before);
}

#[test]
fn failed_feed_update_commit_restores_rows_and_files() {
    let (feed, before) = feed_with_pending_update();
    fail_commit_after_write_to(&feed.harness, "UPDATE", "report_formats");
    assert_update_undone(&feed, &before);
}
