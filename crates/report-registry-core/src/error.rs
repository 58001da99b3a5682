// crates/report-registry-core/src/error.rs
// ============================================================================
// Module: Report Registry Errors
// Description: Outcome taxonomy surfaced by lifecycle and feed operations.
// Purpose: Give protocol layers a small, stable error enum with codes.
// Dependencies: crate::params, thiserror
// ============================================================================

//! ## Overview
//! Every operation returns a [`RegistryError`] on failure. Variants group
//! into authorization, not-found, conflict, validation, integrity, and
//! internal failures. [`RegistryError::code`] yields a stable label the
//! protocol layer maps to wire-level responses; internal messages never carry
//! store-level failure text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::params::ParamError;
use crate::params::ValidationFailed;
use crate::params::ValidationTarget;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Report registry operation failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages avoid raw file contents and store error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The authorization oracle refused the request.
    #[error("permission denied: {0}")]
    NotAuthorized(String),
    /// A resource, param, or user was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing entity.
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// A report format with the requested uuid already exists.
    #[error("report format exists already")]
    Exists,
    /// The report format is referenced by an alert.
    #[error("report format is in use")]
    InUse,
    /// Restore refused: an active report format has the same name and owner.
    #[error("a report format with this name exists already")]
    NameCollision,
    /// Restore refused: an active report format has the original uuid.
    #[error("a report format with this uuid exists already")]
    UuidCollision,
    /// A file in the request had an empty name.
    #[error("file name must not be empty")]
    EmptyFileName,
    /// A param value failed its type rules.
    #[error("param value validation failed: {0}")]
    ParamValueInvalid(String),
    /// A param default failed its type rules.
    #[error("param default validation failed: {0}")]
    ParamDefaultInvalid(String),
    /// A param was given without a default.
    #[error("param default missing")]
    ParamDefaultMissing,
    /// A param bound was malformed or equal to the reserved sentinel.
    #[error("param bound out of range")]
    ParamBoundOutOfRange,
    /// A param was given without a type.
    #[error("param type missing")]
    ParamTypeMissing,
    /// Two params share a name.
    #[error("duplicate param name: {0}")]
    DuplicateParamName(String),
    /// A param type label is not recognized.
    #[error("bogus param type: {0}")]
    BogusParamType(String),
    /// The named param does not exist on the report format.
    #[error("param not found: {0}")]
    ParamNotFound(String),
    /// The report format is not active.
    #[error("report format is not active")]
    Inactive,
    /// The feed directory is missing.
    #[error("feed directory missing: {0}")]
    NoFeedDir(String),
    /// The feed owner is not configured or does not exist.
    #[error("feed owner missing")]
    NoFeedOwner,
    /// Filesystem or external process failure.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// Programming invariant violated or store failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Returns the stable outcome label for protocol mapping.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "not_authorized",
            Self::NotFound {
                ..
            } => "not_found",
            Self::Exists => "exists",
            Self::InUse => "in_use",
            Self::NameCollision => "name_collision",
            Self::UuidCollision => "uuid_collision",
            Self::EmptyFileName => "empty_file_name",
            Self::ParamValueInvalid(_) => "param_validation",
            Self::ParamDefaultInvalid(_) => "param_default_validation",
            Self::ParamDefaultMissing => "param_default_missing",
            Self::ParamBoundOutOfRange => "param_bound_out_of_range",
            Self::ParamTypeMissing => "param_type_missing",
            Self::DuplicateParamName(_) => "duplicate_param_name",
            Self::BogusParamType(_) => "bogus_param_type",
            Self::ParamNotFound(_) => "param_not_found",
            Self::Inactive => "inactive",
            Self::NoFeedDir(_) => "no_feed_dir",
            Self::NoFeedOwner => "no_feed_owner",
            Self::Integrity(_) => "integrity",
            Self::Internal(_) => "internal",
        }
    }

    /// Builds a not-found error for a report format uuid.
    #[must_use]
    pub fn report_format_not_found(uuid: &str) -> Self {
        Self::NotFound {
            kind: "report_format",
            id: uuid.to_string(),
        }
    }
}

impl From<ParamError> for RegistryError {
    fn from(error: ParamError) -> Self {
        match error {
            ParamError::TypeMissing => Self::ParamTypeMissing,
            ParamError::BogusType(label) => Self::BogusParamType(label),
            ParamError::DefaultMissing => Self::ParamDefaultMissing,
            ParamError::BoundOutOfRange => Self::ParamBoundOutOfRange,
            ParamError::DuplicateName(name) => Self::DuplicateParamName(name),
            ParamError::Validation(failed) => match failed.target {
                ValidationTarget::Value => Self::ParamValueInvalid(failed.param),
                ValidationTarget::Fallback => Self::ParamDefaultInvalid(failed.param),
            },
        }
    }
}

impl From<ValidationFailed> for RegistryError {
    fn from(failed: ValidationFailed) -> Self {
        Self::from(ParamError::Validation(failed))
    }
}
