// crates/report-registry-store-sqlite/src/report_formats.rs
// ============================================================================
// Module: Report Format Tables
// Description: Active/trash report format rows, params, and options.
// Purpose: Implement the relational steps of every lifecycle transition.
// Dependencies: report-registry-core, rusqlite
// ============================================================================

//! ## Overview
//! Report formats live in two parallel table families. Moving a record
//! between them copies the row, its params, and their options, relocates
//! permissions and tags, and then deletes the source rows. Params are read
//! back in insertion (`id`) order and options likewise, since both feed the
//! canonical signing string.
//!
//! Security posture: stored labels are parsed strictly; an unknown param
//! type is reported as corruption rather than guessed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use report_registry_core::ParamBounds;
use report_registry_core::ParamDefinition;
use report_registry_core::ParamType;
use report_registry_core::ReportFormat;
use report_registry_core::ResourceUuid;
use report_registry_core::TrashedReportFormat;
use report_registry_core::Trust;
use report_registry_core::UserRef;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use crate::store::SqliteStoreError;
use crate::store::StoreTx;
use crate::store::db_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Columns shared by both report format tables, joined with the owner.
const FORMAT_COLUMNS: &str = "rf.id, rf.uuid, rf.owner, u.uuid, u.name, rf.name, rf.extension, \
                              rf.content_type, rf.summary, rf.description, rf.signature, \
                              rf.trust, rf.trust_time, rf.flags, rf.predefined, \
                              rf.creation_time, rf.modification_time";

/// Plain column list used when copying rows between tables.
const COPY_COLUMNS: &str = "owner, name, extension, content_type, summary, description, \
                            signature, trust, trust_time, flags, predefined, creation_time, \
                            modification_time";

/// Plain param column list used when copying params between tables.
const PARAM_COPY_COLUMNS: &str = "name, type, value, type_min, type_max, type_regex, fallback";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Table family holding a report format.
///
/// # Invariants
/// - Labels map 1:1 to the `resource_location` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Active tables.
    Active,
    /// Trash tables.
    Trash,
}

impl Location {
    /// Returns the stored location label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trash => "trash",
        }
    }

    /// Report format table name.
    pub(crate) const fn formats_table(self) -> &'static str {
        match self {
            Self::Active => "report_formats",
            Self::Trash => "report_formats_trash",
        }
    }

    /// Param table name.
    pub(crate) const fn params_table(self) -> &'static str {
        match self {
            Self::Active => "report_format_params",
            Self::Trash => "report_format_params_trash",
        }
    }

    /// Param option table name.
    pub(crate) const fn options_table(self) -> &'static str {
        match self {
            Self::Active => "report_format_param_options",
            Self::Trash => "report_format_param_options_trash",
        }
    }
}

/// Metadata edits applied by a modify request.
///
/// # Invariants
/// - `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFormatUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New summary.
    pub summary: Option<String>,
    /// New active flag.
    pub active: Option<bool>,
}

impl ReportFormatUpdate {
    /// Returns true when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.summary.is_none() && self.active.is_none()
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

impl StoreTx<'_> {
    /// Returns true when `uuid` names an active report format or the original
    /// identity of a non-predefined trashed one.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn uuid_taken(&self, uuid: &str) -> Result<bool, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM report_formats WHERE uuid = ?1)
                     OR EXISTS (SELECT 1 FROM report_formats_trash
                                WHERE original_uuid = ?1 AND predefined = 0)",
                params![uuid],
                |row| row.get(0),
            )
            .map_err(db_error)
    }

    /// Returns true when an active report format has `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn active_uuid_exists(&self, uuid: &str) -> Result<bool, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM report_formats WHERE uuid = ?1)",
                params![uuid],
                |row| row.get(0),
            )
            .map_err(db_error)
    }

    /// Returns true when `uuid` is the original identity of any trashed row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn trash_holds_original(&self, uuid: &str) -> Result<bool, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM report_formats_trash WHERE original_uuid = ?1)",
                params![uuid],
                |row| row.get(0),
            )
            .map_err(db_error)
    }

    /// Returns true when an active report format with `name` exists for the
    /// owner (`None` matches global rows).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn name_taken(&self, name: &str, owner: Option<i64>) -> Result<bool, SqliteStoreError> {
        self.name_taken_except(name, owner, None)
    }

    /// Returns `base` or the first `"<base> <n>"` not yet used by the owner.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a lookup fails.
    pub fn unique_name(&self, base: &str, owner: Option<i64>) -> Result<String, SqliteStoreError> {
        self.unique_name_except(base, owner, None)
    }

    /// Name check that ignores the row `except`.
    fn name_taken_except(
        &self,
        name: &str,
        owner: Option<i64>,
        except: Option<i64>,
    ) -> Result<bool, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM report_formats \
                 WHERE name = ?1 AND owner IS ?2 AND id IS NOT ?3)",
                params![name, owner, except],
                |row| row.get(0),
            )
            .map_err(db_error)
    }

    /// Name de-duplication that ignores the row `except`, so a row keeps
    /// its own name when rewritten.
    fn unique_name_except(
        &self,
        base: &str,
        owner: Option<i64>,
        except: Option<i64>,
    ) -> Result<String, SqliteStoreError> {
        if !self.name_taken_except(base, owner, except)? {
            return Ok(base.to_string());
        }
        let mut suffix: u64 = 1;
        loop {
            let candidate = format!("{base} {suffix}");
            if !self.name_taken_except(&candidate, owner, except)? {
                return Ok(candidate);
            }
            suffix = suffix.saturating_add(1);
        }
    }

    /// Loads an active report format by uuid, including params.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or data is corrupt.
    pub fn find_report_format(&self, uuid: &str) -> Result<Option<ReportFormat>, SqliteStoreError> {
        let sql = format!(
            "SELECT {FORMAT_COLUMNS} FROM report_formats rf LEFT JOIN users u ON u.id = rf.owner \
             WHERE rf.uuid = ?1"
        );
        let row = self
            .conn
            .query_row(&sql, params![uuid], read_format_row)
            .optional()
            .map_err(db_error)?;
        row.map(|raw| self.finish_format(raw, Location::Active)).transpose()
    }

    /// Loads a trashed report format by its trash uuid, including params.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or data is corrupt.
    pub fn find_trashed_report_format(
        &self,
        uuid: &str,
    ) -> Result<Option<TrashedReportFormat>, SqliteStoreError> {
        let sql = format!(
            "SELECT {FORMAT_COLUMNS}, rf.original_uuid FROM report_formats_trash rf \
             LEFT JOIN users u ON u.id = rf.owner WHERE rf.uuid = ?1"
        );
        let row = self
            .conn
            .query_row(&sql, params![uuid], |row| {
                Ok((read_format_row(row)?, row.get::<_, String>(17)?))
            })
            .optional()
            .map_err(db_error)?;
        match row {
            None => Ok(None),
            Some((raw, original_uuid)) => Ok(Some(TrashedReportFormat {
                format: self.finish_format(raw, Location::Trash)?,
                original_uuid: ResourceUuid::new(original_uuid),
            })),
        }
    }

    /// Lists active report formats ordered by name, then uuid.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or data is corrupt.
    pub fn list_report_formats(&self) -> Result<Vec<ReportFormat>, SqliteStoreError> {
        let sql = format!(
            "SELECT {FORMAT_COLUMNS} FROM report_formats rf LEFT JOIN users u ON u.id = rf.owner \
             ORDER BY rf.name, rf.uuid"
        );
        let raws = {
            let mut stmt = self.conn.prepare(&sql).map_err(db_error)?;
            let rows = stmt.query_map(params![], read_format_row).map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        raws.into_iter().map(|raw| self.finish_format(raw, Location::Active)).collect()
    }

    /// Lists trashed report formats, optionally restricted to one owner.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or data is corrupt.
    pub fn list_trashed_report_formats(
        &self,
        owner: Option<i64>,
    ) -> Result<Vec<TrashedReportFormat>, SqliteStoreError> {
        let sql = format!(
            "SELECT {FORMAT_COLUMNS}, rf.original_uuid FROM report_formats_trash rf \
             LEFT JOIN users u ON u.id = rf.owner \
             WHERE ?1 IS NULL OR rf.owner = ?1 ORDER BY rf.id"
        );
        let raws = {
            let mut stmt = self.conn.prepare(&sql).map_err(db_error)?;
            let rows = stmt
                .query_map(params![owner], |row| {
                    Ok((read_format_row(row)?, row.get::<_, String>(17)?))
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        raws.into_iter()
            .map(|(raw, original_uuid)| {
                Ok(TrashedReportFormat {
                    format: self.finish_format(raw, Location::Trash)?,
                    original_uuid: ResourceUuid::new(original_uuid),
                })
            })
            .collect()
    }

    /// Lists params of a report format in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or data is corrupt.
    pub fn list_params(
        &self,
        location: Location,
        format_id: i64,
    ) -> Result<Vec<ParamDefinition>, SqliteStoreError> {
        Ok(self.list_param_rows(location, format_id)?.into_iter().map(|(_, param)| param).collect())
    }

    /// Lists params with their row ids in insertion order.
    pub(crate) fn list_param_rows(
        &self,
        location: Location,
        format_id: i64,
    ) -> Result<Vec<(i64, ParamDefinition)>, SqliteStoreError> {
        let sql = format!(
            "SELECT id, name, type, value, type_min, type_max, fallback FROM {} \
             WHERE report_format = ?1 ORDER BY id",
            location.params_table()
        );
        let raws = {
            let mut stmt = self.conn.prepare(&sql).map_err(db_error)?;
            let rows = stmt
                .query_map(params![format_id], |row| {
                    Ok(RawParam {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        type_label: row.get(2)?,
                        value: row.get(3)?,
                        min: row.get(4)?,
                        max: row.get(5)?,
                        fallback: row.get(6)?,
                    })
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        let mut params = Vec::with_capacity(raws.len());
        for raw in raws {
            let param_type = ParamType::parse(&raw.type_label).ok_or_else(|| {
                SqliteStoreError::Corrupt(format!("unknown param type: {}", raw.type_label))
            })?;
            let bounds = ParamBounds::new(raw.min, raw.max)
                .map_err(|_| SqliteStoreError::Corrupt("stored param bound is a sentinel".into()))?;
            let options = self.list_options(location, raw.id)?;
            params.push((
                raw.id,
                ParamDefinition {
                    name: raw.name,
                    param_type,
                    value: raw.value,
                    fallback: raw.fallback,
                    bounds,
                    options,
                },
            ));
        }
        Ok(params)
    }

    /// Lists the options of one param in insertion order.
    fn list_options(&self, location: Location, param_id: i64) -> Result<Vec<String>, SqliteStoreError> {
        let sql = format!(
            "SELECT value FROM {} WHERE report_format_param = ?1 ORDER BY id",
            location.options_table()
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt.query_map(params![param_id], |row| row.get(0)).map_err(db_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(db_error)
    }

    /// Completes a raw row with its owner and params.
    fn finish_format(&self, raw: RawFormat, location: Location) -> Result<ReportFormat, SqliteStoreError> {
        let params = self.list_params(location, raw.id)?;
        let owner = match (raw.owner_id, raw.owner_uuid, raw.owner_name) {
            (Some(id), Some(uuid), Some(name)) => Some(UserRef {
                id,
                uuid,
                name,
            }),
            (None, _, _) => None,
            _ => {
                return Err(SqliteStoreError::Corrupt(
                    "report format references a missing user".to_string(),
                ));
            }
        };
        Ok(ReportFormat {
            id: raw.id,
            uuid: ResourceUuid::new(raw.uuid),
            owner,
            name: raw.name,
            extension: raw.extension,
            content_type: raw.content_type,
            summary: raw.summary,
            description: raw.description,
            signature: raw.signature,
            trust: Trust::parse(&raw.trust).unwrap_or(Trust::Unknown),
            trust_time: raw.trust_time,
            flags: raw.flags,
            predefined: raw.predefined,
            creation_time: raw.creation_time,
            modification_time: raw.modification_time,
            params,
        })
    }
}

// ============================================================================
// SECTION: Mutations
// ============================================================================

impl StoreTx<'_> {
    /// Inserts an active report format with its params and options.
    ///
    /// `format.id` is ignored; the new row id is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when an insert fails.
    pub fn insert_report_format(&self, format: &ReportFormat) -> Result<i64, SqliteStoreError> {
        self.conn
            .execute(
                "INSERT INTO report_formats (uuid, owner, name, extension, content_type, summary, \
                 description, signature, trust, trust_time, flags, predefined, creation_time, \
                 modification_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    format.uuid.as_str(),
                    format.owner.as_ref().map(|owner| owner.id),
                    format.name,
                    format.extension,
                    format.content_type,
                    format.summary,
                    format.description,
                    format.signature,
                    format.trust.as_str(),
                    format.trust_time,
                    format.flags,
                    format.predefined,
                    format.creation_time,
                    format.modification_time,
                ],
            )
            .map_err(db_error)?;
        let format_id = self.last_id();
        for param in &format.params {
            self.insert_param(format_id, param)?;
        }
        Ok(format_id)
    }

    /// Inserts one active param with its options, returning the param id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when an insert fails.
    pub fn insert_param(&self, format_id: i64, param: &ParamDefinition) -> Result<i64, SqliteStoreError> {
        self.conn
            .execute(
                "INSERT INTO report_format_params (report_format, name, type, value, type_min, \
                 type_max, fallback) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    format_id,
                    param.name,
                    param.param_type.as_str(),
                    param.value,
                    param.bounds.min(),
                    param.bounds.max(),
                    param.fallback,
                ],
            )
            .map_err(db_error)?;
        let param_id = self.last_id();
        self.insert_options(param_id, &param.options)?;
        Ok(param_id)
    }

    /// Inserts active options for a param in order.
    fn insert_options(&self, param_id: i64, options: &[String]) -> Result<(), SqliteStoreError> {
        for option in options {
            self.conn
                .execute(
                    "INSERT INTO report_format_param_options (report_format_param, value) \
                     VALUES (?1, ?2)",
                    params![param_id, option],
                )
                .map_err(db_error)?;
        }
        Ok(())
    }

    /// Applies metadata edits to an active report format.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when an update fails.
    pub fn update_report_format(
        &self,
        format_id: i64,
        update: &ReportFormatUpdate,
        now: i64,
    ) -> Result<(), SqliteStoreError> {
        if let Some(name) = &update.name {
            self.conn
                .execute("UPDATE report_formats SET name = ?1 WHERE id = ?2", params![name, format_id])
                .map_err(db_error)?;
        }
        if let Some(summary) = &update.summary {
            self.conn
                .execute(
                    "UPDATE report_formats SET summary = ?1 WHERE id = ?2",
                    params![summary, format_id],
                )
                .map_err(db_error)?;
        }
        if let Some(active) = update.active {
            let sql = if active {
                "UPDATE report_formats SET flags = flags | 1 WHERE id = ?1"
            } else {
                "UPDATE report_formats SET flags = flags & ~1 WHERE id = ?1"
            };
            self.conn.execute(sql, params![format_id]).map_err(db_error)?;
        }
        self.touch(format_id, now)
    }

    /// Sets the value of a named param. Returns false when no such param.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the update fails.
    pub fn set_param_value(
        &self,
        format_id: i64,
        name: &str,
        value: &str,
        now: i64,
    ) -> Result<bool, SqliteStoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE report_format_params SET value = ?1 WHERE report_format = ?2 AND name = ?3",
                params![value, format_id, name],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Ok(false);
        }
        self.touch(format_id, now)?;
        Ok(true)
    }

    /// Records a trust verdict for an active report format.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the update fails.
    pub fn set_trust(&self, format_id: i64, trust: Trust, now: i64) -> Result<(), SqliteStoreError> {
        self.conn
            .execute(
                "UPDATE report_formats SET trust = ?1, trust_time = ?2 WHERE id = ?3",
                params![trust.as_str(), now, format_id],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Rewrites the metadata of a predefined report format from the feed.
    ///
    /// Owner, flags, and creation time are kept. The name is de-duplicated
    /// against the owner's other report formats.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the update fails.
    pub fn update_from_feed(&self, format_id: i64, source: &ReportFormat) -> Result<(), SqliteStoreError> {
        let owner = source.owner.as_ref().map(|owner| owner.id);
        let name = self.unique_name_except(&source.name, owner, Some(format_id))?;
        self.conn
            .execute(
                "UPDATE report_formats SET name = ?1, extension = ?2, content_type = ?3, \
                 summary = ?4, description = ?5, signature = ?6, trust = ?7, trust_time = ?8, \
                 predefined = 1, modification_time = ?9 WHERE id = ?10",
                params![
                    name,
                    source.extension,
                    source.content_type,
                    source.summary,
                    source.description,
                    source.signature,
                    source.trust.as_str(),
                    source.trust_time,
                    source.modification_time,
                    format_id,
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Inserts or rewrites a param by name, replacing its options.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a statement fails.
    pub fn upsert_param(&self, format_id: i64, param: &ParamDefinition) -> Result<i64, SqliteStoreError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM report_format_params WHERE report_format = ?1 AND name = ?2",
                params![format_id, param.name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        let Some(param_id) = existing else {
            return self.insert_param(format_id, param);
        };
        self.conn
            .execute(
                "UPDATE report_format_params SET type = ?1, value = ?2, type_min = ?3, \
                 type_max = ?4, fallback = ?5 WHERE id = ?6",
                params![
                    param.param_type.as_str(),
                    param.value,
                    param.bounds.min(),
                    param.bounds.max(),
                    param.fallback,
                    param_id,
                ],
            )
            .map_err(db_error)?;
        self.conn
            .execute(
                "DELETE FROM report_format_param_options WHERE report_format_param = ?1",
                params![param_id],
            )
            .map_err(db_error)?;
        self.insert_options(param_id, &param.options)?;
        Ok(param_id)
    }

    /// Moves an active report format into the trash under `trash_uuid`.
    ///
    /// Params, options, permissions, and tags follow the record. Returns the
    /// trash row id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when any step fails.
    pub fn move_to_trash(&self, format: &ReportFormat, trash_uuid: &str) -> Result<i64, SqliteStoreError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO report_formats_trash (uuid, {COPY_COLUMNS}, original_uuid) \
                     SELECT ?1, {COPY_COLUMNS}, uuid FROM report_formats WHERE id = ?2"
                ),
                params![trash_uuid, format.id],
            )
            .map_err(db_error)?;
        let trash_id = self.last_id();
        self.copy_params(Location::Active, format.id, trash_id)?;
        self.relocate_references(Location::Active, format.id, trash_id, trash_uuid)?;
        self.delete_rows(Location::Active, format.id)?;
        Ok(trash_id)
    }

    /// Moves a trashed report format back to the active table under its
    /// original uuid, returning the new active row id.
    ///
    /// Trashed alerts that referenced the trash identity are re-pointed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when any step fails.
    pub fn restore_from_trash(&self, trashed: &TrashedReportFormat) -> Result<i64, SqliteStoreError> {
        let trash_id = trashed.format.id;
        let original = trashed.original_uuid.as_str();
        self.conn
            .execute(
                &format!(
                    "INSERT INTO report_formats (uuid, {COPY_COLUMNS}) \
                     SELECT ?1, {COPY_COLUMNS} FROM report_formats_trash WHERE id = ?2"
                ),
                params![original, trash_id],
            )
            .map_err(db_error)?;
        let active_id = self.last_id();
        self.copy_params(Location::Trash, trash_id, active_id)?;
        self.relocate_references(Location::Trash, trash_id, active_id, original)?;
        self.conn
            .execute(
                "UPDATE alerts_trash SET report_format_uuid = ?1 WHERE report_format_uuid = ?2",
                params![original, trashed.format.uuid.as_str()],
            )
            .map_err(db_error)?;
        self.delete_rows(Location::Trash, trash_id)?;
        Ok(active_id)
    }

    /// Deletes a report format row with its params, options, permissions,
    /// and tags.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a delete fails.
    pub fn delete_report_format(&self, location: Location, format_id: i64) -> Result<(), SqliteStoreError> {
        for table in ["permissions", "tags"] {
            self.conn
                .execute(
                    &format!(
                        "DELETE FROM {table} WHERE resource_type = 'report_format' \
                         AND resource_location = ?1 AND resource = ?2"
                    ),
                    params![location.as_str(), format_id],
                )
                .map_err(db_error)?;
        }
        self.delete_rows(location, format_id)
    }

    /// Deletes a row with its params and options.
    fn delete_rows(&self, location: Location, format_id: i64) -> Result<(), SqliteStoreError> {
        self.conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE report_format_param IN \
                     (SELECT id FROM {} WHERE report_format = ?1)",
                    location.options_table(),
                    location.params_table()
                ),
                params![format_id],
            )
            .map_err(db_error)?;
        self.conn
            .execute(
                &format!("DELETE FROM {} WHERE report_format = ?1", location.params_table()),
                params![format_id],
            )
            .map_err(db_error)?;
        self.conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", location.formats_table()),
                params![format_id],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Copies params and options between table families, keeping order.
    fn copy_params(&self, from: Location, from_id: i64, to_id: i64) -> Result<(), SqliteStoreError> {
        let to = match from {
            Location::Active => Location::Trash,
            Location::Trash => Location::Active,
        };
        let param_ids: Vec<i64> = {
            let mut stmt = self
                .conn
                .prepare(&format!(
                    "SELECT id FROM {} WHERE report_format = ?1 ORDER BY id",
                    from.params_table()
                ))
                .map_err(db_error)?;
            let rows = stmt.query_map(params![from_id], |row| row.get(0)).map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        for param_id in param_ids {
            self.conn
                .execute(
                    &format!(
                        "INSERT INTO {} (report_format, {PARAM_COPY_COLUMNS}) \
                         SELECT ?1, {PARAM_COPY_COLUMNS} FROM {} WHERE id = ?2",
                        to.params_table(),
                        from.params_table()
                    ),
                    params![to_id, param_id],
                )
                .map_err(db_error)?;
            let new_param_id = self.last_id();
            self.conn
                .execute(
                    &format!(
                        "INSERT INTO {} (report_format_param, value) \
                         SELECT ?1, value FROM {} WHERE report_format_param = ?2 ORDER BY id",
                        to.options_table(),
                        from.options_table()
                    ),
                    params![new_param_id, param_id],
                )
                .map_err(db_error)?;
        }
        Ok(())
    }

    /// Re-points permissions and tags at the row's new location.
    fn relocate_references(
        &self,
        from: Location,
        from_id: i64,
        to_id: i64,
        to_uuid: &str,
    ) -> Result<(), SqliteStoreError> {
        let to = match from {
            Location::Active => Location::Trash,
            Location::Trash => Location::Active,
        };
        for table in ["permissions", "tags"] {
            self.conn
                .execute(
                    &format!(
                        "UPDATE {table} SET resource = ?1, resource_uuid = ?2, \
                         resource_location = ?3 WHERE resource_type = 'report_format' \
                         AND resource_location = ?4 AND resource = ?5"
                    ),
                    params![to_id, to_uuid, to.as_str(), from.as_str(), from_id],
                )
                .map_err(db_error)?;
        }
        Ok(())
    }

    /// Bumps the modification time of an active report format.
    fn touch(&self, format_id: i64, now: i64) -> Result<(), SqliteStoreError> {
        self.conn
            .execute(
                "UPDATE report_formats SET modification_time = ?1 WHERE id = ?2",
                params![now, format_id],
            )
            .map_err(db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Report format row before params are attached.
struct RawFormat {
    /// Row id.
    id: i64,
    /// Uuid.
    uuid: String,
    /// Owner id.
    owner_id: Option<i64>,
    /// Owner uuid from the join.
    owner_uuid: Option<String>,
    /// Owner name from the join.
    owner_name: Option<String>,
    /// Name.
    name: String,
    /// Extension.
    extension: String,
    /// Content type.
    content_type: String,
    /// Summary.
    summary: String,
    /// Description.
    description: String,
    /// Signature.
    signature: String,
    /// Trust label.
    trust: String,
    /// Trust time.
    trust_time: i64,
    /// Flags.
    flags: i64,
    /// Predefined marker.
    predefined: bool,
    /// Creation time.
    creation_time: i64,
    /// Modification time.
    modification_time: i64,
}

/// Param row before options are attached.
struct RawParam {
    /// Row id.
    id: i64,
    /// Name.
    name: String,
    /// Type label.
    type_label: String,
    /// Current value.
    value: String,
    /// Lower bound.
    min: Option<i64>,
    /// Upper bound.
    max: Option<i64>,
    /// Default.
    fallback: String,
}

/// Reads the shared report format columns.
fn read_format_row(row: &Row<'_>) -> rusqlite::Result<RawFormat> {
    Ok(RawFormat {
        id: row.get(0)?,
        uuid: row.get(1)?,
        owner_id: row.get(2)?,
        owner_uuid: row.get(3)?,
        owner_name: row.get(4)?,
        name: row.get(5)?,
        extension: row.get(6)?,
        content_type: row.get(7)?,
        summary: row.get(8)?,
        description: row.get(9)?,
        signature: row.get(10)?,
        trust: row.get(11)?,
        trust_time: row.get(12)?,
        flags: row.get(13)?,
        predefined: row.get(14)?,
        creation_time: row.get(15)?,
        modification_time: row.get(16)?,
    })
}
