// crates/report-registry-config/src/config.rs
// ============================================================================
// Module: Report Registry Configuration
// Description: Configuration loading and validation for the report registry.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: report-registry-core, report-registry-store-sqlite, serde, toml,
//               thiserror
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys are rejected and every section is validated after parsing;
//! missing or invalid configuration fails closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use report_registry_core::ResourceUuid;
use report_registry_store_sqlite::SqliteStoreConfig;
use report_registry_store_sqlite::SqliteStoreMode;
use report_registry_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

use crate::authorization::AuthorizationConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "report-registry.toml";
/// Environment variable used to override the config path.
const CONFIG_ENV_VAR: &str = "REPORT_REGISTRY_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default database file name inside the state directory.
const DEFAULT_DATABASE_NAME: &str = "registry.db";
/// Default store busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum store busy timeout in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Default feed sync interval in seconds.
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 600;
/// Maximum number of feed import roles.
const MAX_IMPORT_ROLES: usize = 64;
/// Default signature verifier program.
const DEFAULT_VERIFIER_PROGRAM: &str = "gpgv";
/// Default keyring file name inside the state directory.
const DEFAULT_KEYRING_NAME: &str = "keyring.gpg";
/// Default log filter.
const DEFAULT_LOG_FILTER: &str = "report_registry=info";

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Report registry configuration.
///
/// # Invariants
/// - `validate` has succeeded for every value returned by [`Self::load`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Root of the asset tree and the default database location.
    pub state_dir: PathBuf,
    /// Resource store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Feed settings; the feed is disabled when absent.
    #[serde(default)]
    pub feed: Option<FeedSection>,
    /// Signature verification settings.
    #[serde(default)]
    pub signatures: SignaturesConfig,
    /// Report rendering settings.
    #[serde(default)]
    pub render: RenderConfig,
    /// Authorization oracle settings.
    #[serde(default)]
    pub authorization: AuthorizationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RegistryConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// `path`, then `REPORT_REGISTRY_CONFIG`, then `report-registry.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("state_dir", &self.state_dir.to_string_lossy())?;
        self.store.validate()?;
        if let Some(feed) = &self.feed {
            feed.validate()?;
        }
        self.signatures.validate()?;
        self.render.validate()?;
        self.authorization.validate()?;
        self.logging.validate()
    }

    /// Returns the database path, defaulting to `<state_dir>/registry.db`.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(|| self.state_dir.join(DEFAULT_DATABASE_NAME))
    }

    /// Returns the resource store configuration.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.database_path(),
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
        }
    }

    /// Returns the trusted keyring, defaulting to `<state_dir>/keyring.gpg`.
    #[must_use]
    pub fn keyring_path(&self) -> PathBuf {
        self.signatures.keyring.clone().unwrap_or_else(|| self.state_dir.join(DEFAULT_KEYRING_NAME))
    }
}

/// Resource store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// `SQLite` database path; defaults inside `state_dir`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("store.path", &path.to_string_lossy())?;
        }
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Feed configuration.
///
/// # Invariants
/// - `owner_uuid` and every `import_roles` entry are well-formed uuids.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedSection {
    /// Feed root containing `report_formats/`.
    pub dir: PathBuf,
    /// User owning feed-created report formats.
    #[serde(default)]
    pub owner_uuid: Option<String>,
    /// Roles granted read permission on feed-created report formats.
    #[serde(default)]
    pub import_roles: Vec<String>,
    /// Detached signatures shipped with the feed; defaults to
    /// `<dir>/signatures/report_formats`.
    #[serde(default)]
    pub signatures_dir: Option<PathBuf>,
    /// Seconds between periodic syncs.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

impl FeedSection {
    /// Validates feed configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("feed.dir", &self.dir.to_string_lossy())?;
        if let Some(dir) = &self.signatures_dir {
            validate_path_string("feed.signatures_dir", &dir.to_string_lossy())?;
        }
        if let Some(owner) = &self.owner_uuid
            && !ResourceUuid::is_well_formed(owner)
        {
            return Err(ConfigError::Invalid("feed.owner_uuid must be a uuid".to_string()));
        }
        if self.import_roles.len() > MAX_IMPORT_ROLES {
            return Err(ConfigError::Invalid(format!(
                "feed.import_roles exceeds {MAX_IMPORT_ROLES} entries"
            )));
        }
        for (idx, role) in self.import_roles.iter().enumerate() {
            if !ResourceUuid::is_well_formed(role) {
                return Err(ConfigError::Invalid(format!("feed.import_roles[{idx}] must be a uuid")));
            }
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::Invalid("feed.sync_interval_secs must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Returns the feed signature directory.
    #[must_use]
    pub fn signatures_dir(&self) -> PathBuf {
        self.signatures_dir.clone().unwrap_or_else(|| self.dir.join("signatures").join("report_formats"))
    }
}

/// Signature verification configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignaturesConfig {
    /// Verifier program invoked as `program --keyring K --quiet SIG DATA`.
    #[serde(default = "default_verifier_program")]
    pub verifier_program: PathBuf,
    /// Trusted keyring; defaults to `<state_dir>/keyring.gpg`.
    #[serde(default)]
    pub keyring: Option<PathBuf>,
}

impl Default for SignaturesConfig {
    fn default() -> Self {
        Self {
            verifier_program: default_verifier_program(),
            keyring: None,
        }
    }
}

impl SignaturesConfig {
    /// Validates signature configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("signatures.verifier_program", &self.verifier_program.to_string_lossy())?;
        if let Some(keyring) = &self.keyring {
            validate_path_string("signatures.keyring", &keyring.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Report rendering configuration.
///
/// # Invariants
/// - `run_as_uid` and `run_as_gid` are set together or not at all.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// User id the `generate` script runs as.
    #[serde(default)]
    pub run_as_uid: Option<u32>,
    /// Group id the `generate` script runs as.
    #[serde(default)]
    pub run_as_gid: Option<u32>,
}

impl RenderConfig {
    /// Validates render configuration.
    fn validate(self) -> Result<(), ConfigError> {
        if self.run_as_uid.is_some() != self.run_as_gid.is_some() {
            return Err(ConfigError::Invalid(
                "render.run_as_uid and render.run_as_gid must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the `(uid, gid)` pair when a privilege drop is configured.
    #[must_use]
    pub const fn run_as(self) -> Option<(u32, u32)> {
        match (self.run_as_uid, self.run_as_gid) {
            (Some(uid), Some(gid)) => Some((uid, gid)),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Messages name the offending field, never secret values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default feed sync interval.
const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

/// Default verifier program.
fn default_verifier_program() -> PathBuf {
    PathBuf::from(DEFAULT_VERIFIER_PROGRAM)
}

/// Default log filter.
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
