// crates/report-registry-store-sqlite/src/feed_check.rs
// ============================================================================
// Module: Feed Check Tables
// Description: Temporary bookkeeping for one feed synchronization pass.
// Purpose: Find params the feed no longer declares without scanning twice.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! A feed pass seeds two temporary tables with every predefined report
//! format and its params. Each format the pass sees is confirmed (removed
//! from the format check table); each param the feed still declares is
//! confirmed likewise. At the end, params still listed for a confirmed
//! format are stale and get deleted. Formats the pass never saw keep their
//! params untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::params;

use crate::store::SqliteStoreError;
use crate::store::StoreTx;
use crate::store::db_error;

// ============================================================================
// SECTION: Check Tables
// ============================================================================

impl StoreTx<'_> {
    /// Creates and seeds the check tables from predefined report formats.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a statement fails.
    pub fn create_feed_check_tables(&self) -> Result<(), SqliteStoreError> {
        self.conn
            .execute_batch(
                "CREATE TEMP TABLE IF NOT EXISTS report_formats_check \
                     (id INTEGER PRIMARY KEY, uuid TEXT NOT NULL);
                 CREATE TEMP TABLE IF NOT EXISTS report_format_params_check \
                     (id INTEGER PRIMARY KEY, report_format INTEGER NOT NULL, name TEXT NOT NULL);
                 DELETE FROM temp.report_formats_check;
                 DELETE FROM temp.report_format_params_check;
                 INSERT INTO temp.report_formats_check (id, uuid)
                     SELECT id, uuid FROM report_formats WHERE predefined = 1;
                 INSERT INTO temp.report_format_params_check (id, report_format, name)
                     SELECT p.id, p.report_format, p.name FROM report_format_params p
                     JOIN report_formats f ON f.id = p.report_format WHERE f.predefined = 1;",
            )
            .map_err(db_error)
    }

    /// Marks a report format as seen by this pass.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the delete fails.
    pub fn confirm_feed_format(&self, format_id: i64) -> Result<(), SqliteStoreError> {
        self.conn
            .execute("DELETE FROM temp.report_formats_check WHERE id = ?1", params![format_id])
            .map_err(db_error)?;
        Ok(())
    }

    /// Marks one param as still declared.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the delete fails.
    pub fn confirm_feed_param(&self, param_id: i64) -> Result<(), SqliteStoreError> {
        self.conn
            .execute("DELETE FROM temp.report_format_params_check WHERE id = ?1", params![param_id])
            .map_err(db_error)?;
        Ok(())
    }

    /// Deletes params left unconfirmed on report formats this pass saw.
    /// Returns the number of params removed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a delete fails.
    pub fn remove_unconfirmed_feed_params(&self) -> Result<usize, SqliteStoreError> {
        const STALE: &str = "SELECT id FROM temp.report_format_params_check \
                             WHERE report_format NOT IN (SELECT id FROM temp.report_formats_check)";
        self.conn
            .execute(
                &format!("DELETE FROM report_format_param_options WHERE report_format_param IN ({STALE})"),
                params![],
            )
            .map_err(db_error)?;
        self.conn
            .execute(&format!("DELETE FROM report_format_params WHERE id IN ({STALE})"), params![])
            .map_err(db_error)
    }

    /// Drops the check tables.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a drop fails.
    pub fn drop_feed_check_tables(&self) -> Result<(), SqliteStoreError> {
        self.conn
            .execute_batch(
                "DROP TABLE IF EXISTS temp.report_formats_check;
                 DROP TABLE IF EXISTS temp.report_format_params_check;",
            )
            .map_err(db_error)
    }
}
