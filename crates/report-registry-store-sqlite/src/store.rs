// crates/report-registry-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Resource Store
// Description: Connection management, schema, and explicit transactions.
// Purpose: Provide begin/commit/rollback over a single serialized connection.
// Dependencies: report-registry-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The store holds one `SQLite` connection behind a mutex. A [`StoreTx`]
//! keeps the mutex guard for its whole lifetime, issues `BEGIN IMMEDIATE`
//! on creation, and rolls back on drop unless [`StoreTx::commit`] succeeded.
//! A failed `COMMIT` leaves the transaction open, so the drop rollback also
//! covers commit-time failures such as deferred constraint violations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use report_registry_core::RegistryError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` resource store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a configuration with defaults for the given database path.
    #[must_use]
    pub const fn for_path(path: PathBuf) -> Self {
        Self {
            path,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding file contents.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data could not be interpreted.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or arguments.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for RegistryError {
    fn from(_error: SqliteStoreError) -> Self {
        Self::Internal("resource store failure".to_string())
    }
}

/// Maps a `rusqlite` error into a store error.
pub(crate) fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed resource store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - At most one [`StoreTx`] is open at a time.
pub struct SqliteResourceStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Mutex<Connection>,
}

impl SqliteResourceStore {
    /// Opens an `SQLite`-backed resource store, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Mutex::new(connection),
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Opens a write transaction with `BEGIN IMMEDIATE`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the lock is poisoned or begin fails.
    pub fn begin(&self) -> Result<StoreTx<'_>, SqliteStoreError> {
        StoreTx::begin(self.lock()?, "BEGIN IMMEDIATE")
    }

    /// Opens a read transaction with `BEGIN DEFERRED`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the lock is poisoned or begin fails.
    pub fn begin_read(&self) -> Result<StoreTx<'_>, SqliteStoreError> {
        StoreTx::begin(self.lock()?, "BEGIN DEFERRED")
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Transactions
// ============================================================================

/// Explicit store transaction.
///
/// # Invariants
/// - Holds the connection lock until dropped.
/// - Rolls back on drop unless a commit succeeded.
pub struct StoreTx<'a> {
    /// Locked connection.
    pub(crate) conn: MutexGuard<'a, Connection>,
    /// True while the transaction is open.
    open: bool,
}

impl<'a> StoreTx<'a> {
    /// Starts a transaction with the given begin statement.
    fn begin(conn: MutexGuard<'a, Connection>, statement: &str) -> Result<Self, SqliteStoreError> {
        conn.execute_batch(statement).map_err(db_error)?;
        Ok(Self {
            conn,
            open: true,
        })
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when `COMMIT` fails; the transaction is
    /// then rolled back on drop.
    pub fn commit(mut self) -> Result<(), SqliteStoreError> {
        self.conn.execute_batch("COMMIT").map_err(db_error)?;
        self.open = false;
        Ok(())
    }

    /// Rolls the transaction back explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when `ROLLBACK` fails.
    pub fn rollback(mut self) -> Result<(), SqliteStoreError> {
        self.open = false;
        self.conn.execute_batch("ROLLBACK").map_err(db_error)
    }

    /// Returns the id of the last inserted row.
    pub(crate) fn last_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }
}

impl Drop for StoreTx<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(SCHEMA_SQL).map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Schema for a fresh store.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS report_formats (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    owner INTEGER REFERENCES users (id) ON DELETE RESTRICT,
    name TEXT NOT NULL,
    extension TEXT NOT NULL,
    content_type TEXT NOT NULL,
    summary TEXT NOT NULL,
    description TEXT NOT NULL,
    signature TEXT NOT NULL,
    trust TEXT NOT NULL,
    trust_time INTEGER NOT NULL,
    flags INTEGER NOT NULL,
    predefined INTEGER NOT NULL,
    creation_time INTEGER NOT NULL,
    modification_time INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS report_formats_trash (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    owner INTEGER REFERENCES users (id) ON DELETE RESTRICT,
    name TEXT NOT NULL,
    extension TEXT NOT NULL,
    content_type TEXT NOT NULL,
    summary TEXT NOT NULL,
    description TEXT NOT NULL,
    signature TEXT NOT NULL,
    trust TEXT NOT NULL,
    trust_time INTEGER NOT NULL,
    flags INTEGER NOT NULL,
    predefined INTEGER NOT NULL,
    creation_time INTEGER NOT NULL,
    modification_time INTEGER NOT NULL,
    original_uuid TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_report_formats_trash_original
    ON report_formats_trash (original_uuid);
CREATE TABLE IF NOT EXISTS report_format_params (
    id INTEGER PRIMARY KEY,
    report_format INTEGER NOT NULL REFERENCES report_formats (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    value TEXT NOT NULL,
    type_min INTEGER,
    type_max INTEGER,
    type_regex TEXT NOT NULL DEFAULT '',
    fallback TEXT NOT NULL,
    UNIQUE (report_format, name)
);
CREATE TABLE IF NOT EXISTS report_format_params_trash (
    id INTEGER PRIMARY KEY,
    report_format INTEGER NOT NULL REFERENCES report_formats_trash (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    value TEXT NOT NULL,
    type_min INTEGER,
    type_max INTEGER,
    type_regex TEXT NOT NULL DEFAULT '',
    fallback TEXT NOT NULL,
    UNIQUE (report_format, name)
);
CREATE TABLE IF NOT EXISTS report_format_param_options (
    id INTEGER PRIMARY KEY,
    report_format_param INTEGER NOT NULL
        REFERENCES report_format_params (id) ON DELETE CASCADE,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS report_format_param_options_trash (
    id INTEGER PRIMARY KEY,
    report_format_param INTEGER NOT NULL
        REFERENCES report_format_params_trash (id) ON DELETE CASCADE,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS permissions (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource INTEGER NOT NULL,
    resource_uuid TEXT NOT NULL,
    resource_location TEXT NOT NULL,
    subject_type TEXT NOT NULL,
    subject INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_permissions_resource
    ON permissions (resource_type, resource_location, resource);
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource INTEGER NOT NULL,
    resource_uuid TEXT NOT NULL,
    resource_location TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tags_resource
    ON tags (resource_type, resource_location, resource);
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    owner INTEGER REFERENCES users (id),
    name TEXT NOT NULL,
    report_format_uuid TEXT
);
CREATE TABLE IF NOT EXISTS alerts_trash (
    id INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    owner INTEGER REFERENCES users (id),
    name TEXT NOT NULL,
    report_format_uuid TEXT
);
";
