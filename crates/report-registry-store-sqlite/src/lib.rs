// crates/report-registry-store-sqlite/src/lib.rs
// ============================================================================
// Module: Report Registry SQLite Store Library
// Description: Transactional active/trash resource store backed by SQLite.
// Purpose: Persist report formats, params, options, and their references.
// Dependencies: report-registry-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! `report-registry-store-sqlite` owns the relational half of the report
//! format registry. All mutations run inside a [`StoreTx`] opened with
//! `BEGIN IMMEDIATE`, so a lifecycle transition is atomic with respect to
//! other transactions. Filesystem state is outside this boundary; ordering
//! between the two is the lifecycle engine's responsibility.
//!
//! Security posture: database contents are untrusted on load; unknown labels
//! fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access;
pub mod feed_check;
pub mod report_formats;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::PermissionRow;
pub use access::SubjectType;
pub use access::TagRow;
pub use report_formats::Location;
pub use report_formats::ReportFormatUpdate;
pub use store::SqliteResourceStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::StoreTx;
