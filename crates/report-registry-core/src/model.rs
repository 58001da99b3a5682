// crates/report-registry-core/src/model.rs
// ============================================================================
// Module: Report Format Model
// Description: Report format records, trust verdicts, and creation requests.
// Purpose: Provide strongly typed resource records with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! A report format lives either in the active table or in the trash table.
//! Both carry the same metadata; trashed records additionally remember the
//! uuid they had while active so a restore can recover it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::params::ParamDefinition;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Flag bit marking a report format as active (usable for rendering).
pub const REPORT_FORMAT_FLAG_ACTIVE: i64 = 1;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Stable external identity of a report format.
///
/// # Invariants
/// - Opaque UTF-8 string; generated values are lowercase RFC 4122 v4 uuids.
/// - Not globally unique across active and trash rows (see the store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUuid(String);

impl ResourceUuid {
    /// Creates a uuid wrapper from an existing value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random uuid.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the uuid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the value has the canonical 8-4-4-4-12 hex layout.
    #[must_use]
    pub fn is_well_formed(value: &str) -> bool {
        value.len() == 36
            && value.char_indices().all(|(idx, ch)| match idx {
                8 | 13 | 18 | 23 => ch == '-',
                _ => ch.is_ascii_hexdigit(),
            })
    }
}

impl fmt::Display for ResourceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ResourceUuid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceUuid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identity of the user a request runs as.
///
/// # Invariants
/// - `id` is the store surrogate key; `uuid` names the owner directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Store surrogate key.
    pub id: i64,
    /// External user uuid.
    pub uuid: String,
    /// Display name.
    pub name: String,
}

// ============================================================================
// SECTION: Trust
// ============================================================================

/// Signature verification verdict.
///
/// # Invariants
/// - Labels map 1:1 to the stored `trust` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trust {
    /// Signature verified against the trusted keyring.
    Yes,
    /// Signature checked and rejected.
    No,
    /// No signature, or verification could not run.
    #[default]
    Unknown,
}

impl Trust {
    /// Returns the stable label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a stored label. Unrecognized labels are `None`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Maps the exit status of an external signature checker to a verdict.
    ///
    /// `None` means the process did not exit normally (spawn failure or
    /// signal termination).
    #[must_use]
    pub const fn from_verifier_exit(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Yes,
            Some(1) => Self::No,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Trust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Report format record as stored in the active or trash table.
///
/// # Invariants
/// - `flags` bit 0 is [`REPORT_FORMAT_FLAG_ACTIVE`].
/// - `owner` is `None` only for legacy global rows.
/// - Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFormat {
    /// Store surrogate key.
    pub id: i64,
    /// External identity.
    pub uuid: ResourceUuid,
    /// Owning user.
    pub owner: Option<UserRef>,
    /// Display name.
    pub name: String,
    /// Output file extension.
    pub extension: String,
    /// Output content type.
    pub content_type: String,
    /// One-line summary.
    pub summary: String,
    /// Long description.
    pub description: String,
    /// Raw detached signature text (may be empty).
    pub signature: String,
    /// Signature verdict.
    pub trust: Trust,
    /// Time of the last trust verdict.
    pub trust_time: i64,
    /// Flag bits.
    pub flags: i64,
    /// Whether the record was sourced from the feed.
    pub predefined: bool,
    /// Creation time.
    pub creation_time: i64,
    /// Last modification time.
    pub modification_time: i64,
    /// Parameters in stable iteration order.
    pub params: Vec<ParamDefinition>,
}

impl ReportFormat {
    /// Returns true when the active flag bit is set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags & REPORT_FORMAT_FLAG_ACTIVE != 0
    }

    /// Returns the owner uuid when the record is owned.
    #[must_use]
    pub fn owner_uuid(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.uuid.as_str())
    }
}

/// Report format record held in the trash.
///
/// # Invariants
/// - `format.uuid` is the trash identity; `original_uuid` is the active one.
/// - Predefined records keep `format.uuid == original_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashedReportFormat {
    /// Trashed record (uuid is the trash identity).
    pub format: ReportFormat,
    /// Uuid the record had before trashing.
    pub original_uuid: ResourceUuid,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// File carried by a create request.
///
/// # Invariants
/// - `content_base64` is decoded by the asset store; names are flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    /// File name inside the asset directory.
    pub name: String,
    /// Base64-encoded file contents.
    pub content_base64: String,
}

/// Unvalidated parameter carried by a create or feed request.
///
/// # Invariants
/// - Fields are raw wire text; see [`crate::params::ParamDefinition::from_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParam {
    /// Parameter name.
    pub name: String,
    /// Type name (`integer`, `selection`, ...).
    pub type_name: Option<String>,
    /// Current value (defaults to the fallback).
    pub value: Option<String>,
    /// Default value.
    pub fallback: Option<String>,
    /// Lower bound text.
    pub min: Option<String>,
    /// Upper bound text.
    pub max: Option<String>,
    /// Selectable options for `selection` params.
    pub options: Vec<String>,
}

/// Create request for a report format.
///
/// # Invariants
/// - Values are untrusted; the lifecycle engine validates them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReportFormat {
    /// Requested uuid (generated when absent).
    pub uuid: Option<String>,
    /// Display name.
    pub name: String,
    /// Output content type.
    pub content_type: String,
    /// Output file extension.
    pub extension: String,
    /// One-line summary.
    pub summary: String,
    /// Long description.
    pub description: String,
    /// Files written into the asset directory.
    pub files: Vec<AssetFile>,
    /// Parameters in declaration order.
    pub params: Vec<NewParam>,
    /// Inline detached signature.
    pub signature: Option<String>,
}
