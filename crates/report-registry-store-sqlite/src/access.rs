// crates/report-registry-store-sqlite/src/access.rs
// ============================================================================
// Module: Users, Permissions, Tags, and Alerts
// Description: Rows that reference report formats from the outside.
// Purpose: Resolve owners, grant feed permissions, and answer in-use checks.
// Dependencies: report-registry-core, rusqlite
// ============================================================================

//! ## Overview
//! Report formats are owned by users and referenced by permissions, tags,
//! and alerts. Permissions and tags follow a record between the active and
//! trash tables (see [`crate::report_formats`]); alerts reference report
//! formats by uuid and block deletion while they exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use report_registry_core::ResourceUuid;
use report_registry_core::UserRef;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::report_formats::Location;
use crate::store::SqliteStoreError;
use crate::store::StoreTx;
use crate::store::db_error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Subject a permission is granted to.
///
/// # Invariants
/// - Labels map 1:1 to the `subject_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectType {
    /// A single user.
    User,
    /// Every member of a role.
    Role,
}

impl SubjectType {
    /// Returns the stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
        }
    }
}

/// Permission row attached to a report format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRow {
    /// Permission name (e.g. `get_report_formats`).
    pub name: String,
    /// Resource row id.
    pub resource: i64,
    /// Resource uuid at its current location.
    pub resource_uuid: String,
    /// `active` or `trash`.
    pub resource_location: String,
    /// `user` or `role`.
    pub subject_type: String,
    /// Subject row id.
    pub subject: i64,
}

/// Tag row attached to a report format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    /// Tag name.
    pub name: String,
    /// Tag value.
    pub value: String,
    /// Resource uuid at its current location.
    pub resource_uuid: String,
}

// ============================================================================
// SECTION: Users and Roles
// ============================================================================

impl StoreTx<'_> {
    /// Inserts a user and returns its reference.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails (e.g. duplicate uuid).
    pub fn insert_user(&self, uuid: &str, name: &str) -> Result<UserRef, SqliteStoreError> {
        self.conn
            .execute("INSERT INTO users (uuid, name) VALUES (?1, ?2)", params![uuid, name])
            .map_err(db_error)?;
        Ok(UserRef {
            id: self.last_id(),
            uuid: uuid.to_string(),
            name: name.to_string(),
        })
    }

    /// Looks a user up by uuid.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn find_user(&self, uuid: &str) -> Result<Option<UserRef>, SqliteStoreError> {
        self.conn
            .query_row("SELECT id, uuid, name FROM users WHERE uuid = ?1", params![uuid], |row| {
                Ok(UserRef {
                    id: row.get(0)?,
                    uuid: row.get(1)?,
                    name: row.get(2)?,
                })
            })
            .optional()
            .map_err(db_error)
    }

    /// Looks a user up by name.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn find_user_by_name(&self, name: &str) -> Result<Option<UserRef>, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT id, uuid, name FROM users WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                |row| {
                    Ok(UserRef {
                        id: row.get(0)?,
                        uuid: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(db_error)
    }

    /// Inserts a role and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn insert_role(&self, uuid: &str, name: &str) -> Result<i64, SqliteStoreError> {
        self.conn
            .execute("INSERT INTO roles (uuid, name) VALUES (?1, ?2)", params![uuid, name])
            .map_err(db_error)?;
        Ok(self.last_id())
    }

    /// Looks a role id up by uuid.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn find_role(&self, uuid: &str) -> Result<Option<i64>, SqliteStoreError> {
        self.conn
            .query_row("SELECT id FROM roles WHERE uuid = ?1", params![uuid], |row| row.get(0))
            .optional()
            .map_err(db_error)
    }
}

// ============================================================================
// SECTION: Permissions and Tags
// ============================================================================

impl StoreTx<'_> {
    /// Grants a permission on an active report format.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn grant_permission(
        &self,
        name: &str,
        format_id: i64,
        format_uuid: &ResourceUuid,
        subject_type: SubjectType,
        subject: i64,
    ) -> Result<(), SqliteStoreError> {
        self.conn
            .execute(
                "INSERT INTO permissions (name, resource_type, resource, resource_uuid, \
                 resource_location, subject_type, subject) \
                 VALUES (?1, 'report_format', ?2, ?3, 'active', ?4, ?5)",
                params![name, format_id, format_uuid.as_str(), subject_type.as_str(), subject],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Lists permissions attached to a report format row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn list_permissions(
        &self,
        location: Location,
        format_id: i64,
    ) -> Result<Vec<PermissionRow>, SqliteStoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, resource, resource_uuid, resource_location, subject_type, subject \
                 FROM permissions WHERE resource_type = 'report_format' \
                 AND resource_location = ?1 AND resource = ?2 ORDER BY id",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![location.as_str(), format_id], |row| {
                Ok(PermissionRow {
                    name: row.get(0)?,
                    resource: row.get(1)?,
                    resource_uuid: row.get(2)?,
                    resource_location: row.get(3)?,
                    subject_type: row.get(4)?,
                    subject: row.get(5)?,
                })
            })
            .map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
    }

    /// Attaches a tag to an active report format.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn insert_tag(
        &self,
        name: &str,
        value: &str,
        format_id: i64,
        format_uuid: &ResourceUuid,
    ) -> Result<(), SqliteStoreError> {
        self.conn
            .execute(
                "INSERT INTO tags (name, value, resource_type, resource, resource_uuid, \
                 resource_location) VALUES (?1, ?2, 'report_format', ?3, ?4, 'active')",
                params![name, value, format_id, format_uuid.as_str()],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Lists tags attached to a report format row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn list_tags(&self, location: Location, format_id: i64) -> Result<Vec<TagRow>, SqliteStoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, value, resource_uuid FROM tags WHERE resource_type = 'report_format' \
                 AND resource_location = ?1 AND resource = ?2 ORDER BY id",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![location.as_str(), format_id], |row| {
                Ok(TagRow {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    resource_uuid: row.get(2)?,
                })
            })
            .map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
    }
}

// ============================================================================
// SECTION: Alerts
// ============================================================================

impl StoreTx<'_> {
    /// Inserts an alert referencing a report format uuid; returns the alert uuid.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert fails.
    pub fn insert_alert(
        &self,
        location: Location,
        name: &str,
        owner: Option<i64>,
        report_format_uuid: &str,
    ) -> Result<ResourceUuid, SqliteStoreError> {
        let uuid = ResourceUuid::generate();
        let table = match location {
            Location::Active => "alerts",
            Location::Trash => "alerts_trash",
        };
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {table} (uuid, owner, name, report_format_uuid) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![uuid.as_str(), owner, name, report_format_uuid],
            )
            .map_err(db_error)?;
        Ok(uuid)
    }

    /// Returns true when any alert, active or trashed, references the active
    /// report format `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn report_format_in_use(&self, uuid: &str) -> Result<bool, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM alerts WHERE report_format_uuid = ?1)
                     OR EXISTS (SELECT 1 FROM alerts_trash WHERE report_format_uuid = ?1)",
                params![uuid],
                |row| row.get(0),
            )
            .map_err(db_error)
    }

    /// Returns true when a trashed alert references the trash identity `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn trash_report_format_in_use(&self, uuid: &str) -> Result<bool, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM alerts_trash WHERE report_format_uuid = ?1)",
                params![uuid],
                |row| row.get(0),
            )
            .map_err(db_error)
    }

    /// Returns the report format uuid referenced by a trashed alert.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn trash_alert_report_format(&self, alert_uuid: &ResourceUuid) -> Result<Option<String>, SqliteStoreError> {
        self.conn
            .query_row(
                "SELECT report_format_uuid FROM alerts_trash WHERE uuid = ?1",
                params![alert_uuid.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)
            .map(Option::flatten)
    }
}
