// crates/report-registry-core/src/interfaces.rs
// ============================================================================
// Module: Report Registry Interfaces
// Description: Capability seams for authorization, verification, rendering.
// Purpose: Keep external oracles and processes out of the lifecycle logic.
// Dependencies: crate::model, thiserror
// ============================================================================

//! ## Overview
//! The lifecycle engine never consults ambient state. Each call receives a
//! [`RequestContext`] naming the acting user and the authorization oracle,
//! and the engine is constructed with a [`SignatureVerifier`] and a
//! [`ReportRenderer`] so tests can substitute fakes for the external
//! processes.
//!
//! Security posture: authorization decisions must fail closed; verifiers must
//! never turn an unverifiable signature into a hard error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

use crate::model::ResourceUuid;
use crate::model::Trust;
use crate::model::UserRef;

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Action checked against the authorization oracle.
///
/// # Invariants
/// - Labels are stable permission names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create or import a report format.
    CreateReportFormat,
    /// Read a report format (also required for copy and apply).
    GetReportFormats,
    /// Modify a report format.
    ModifyReportFormat,
    /// Move a report format to the trash or delete it ultimately.
    DeleteReportFormat,
    /// Restore a trashed report format.
    RestoreReportFormat,
    /// Re-verify a report format signature.
    VerifyReportFormat,
    /// Empty the caller's trash.
    EmptyTrashcan,
}

impl Action {
    /// Returns the permission name for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateReportFormat => "create_report_format",
            Self::GetReportFormats => "get_report_formats",
            Self::ModifyReportFormat => "modify_report_format",
            Self::DeleteReportFormat => "delete_report_format",
            Self::RestoreReportFormat => "restore",
            Self::VerifyReportFormat => "verify_report_format",
            Self::EmptyTrashcan => "empty_trashcan",
        }
    }

    /// Parses a permission name.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "create_report_format" => Some(Self::CreateReportFormat),
            "get_report_formats" => Some(Self::GetReportFormats),
            "modify_report_format" => Some(Self::ModifyReportFormat),
            "delete_report_format" => Some(Self::DeleteReportFormat),
            "restore" => Some(Self::RestoreReportFormat),
            "verify_report_format" => Some(Self::VerifyReportFormat),
            "empty_trashcan" => Some(Self::EmptyTrashcan),
            _ => None,
        }
    }
}

/// Yes/no authorization oracle.
pub trait Authorizer: Send + Sync {
    /// Returns true when `user` may perform `action`, optionally on `resource`.
    fn user_may(&self, user: &UserRef, action: Action, resource: Option<&ResourceUuid>) -> bool;
}

/// Oracle that allows everything.
///
/// # Invariants
/// - Always returns true.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl Authorizer for PermitAll {
    fn user_may(&self, _user: &UserRef, _action: Action, _resource: Option<&ResourceUuid>) -> bool {
        true
    }
}

/// Oracle that refuses everything.
///
/// # Invariants
/// - Always returns false.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn user_may(&self, _user: &UserRef, _action: Action, _resource: Option<&ResourceUuid>) -> bool {
        false
    }
}

/// Request-scoped context threaded through every lifecycle call.
///
/// # Invariants
/// - `user` owns everything created through this context.
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    /// Acting user.
    pub user: &'a UserRef,
    /// Authorization oracle for this request.
    pub authorizer: &'a dyn Authorizer,
}

impl<'a> RequestContext<'a> {
    /// Builds a context for `user` checked by `authorizer`.
    #[must_use]
    pub fn new(user: &'a UserRef, authorizer: &'a dyn Authorizer) -> Self {
        Self {
            user,
            authorizer,
        }
    }

    /// Asks the oracle whether the acting user may perform `action`.
    #[must_use]
    pub fn may(&self, action: Action, resource: Option<&ResourceUuid>) -> bool {
        self.authorizer.user_may(self.user, action, resource)
    }
}

// ============================================================================
// SECTION: Signature Verification
// ============================================================================

/// Detached signature checker.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `content`.
    ///
    /// Failures to run the check yield [`Trust::Unknown`], never an error.
    fn verify(&self, content: &[u8], signature: &[u8]) -> Trust;
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Request to run a report format's `generate` script.
///
/// # Invariants
/// - `script` lives inside `working_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Executable to run.
    pub script: PathBuf,
    /// Directory the script runs in (the asset directory).
    pub working_dir: PathBuf,
    /// Report XML passed as the first argument.
    pub report_path: PathBuf,
    /// File receiving the script's standard output.
    pub output_path: PathBuf,
}

/// Rendering errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The script could not be started.
    #[error("render spawn failed: {0}")]
    Spawn(String),
    /// Waiting for the script failed.
    #[error("render wait failed: {0}")]
    Wait(String),
    /// The script exited unsuccessfully.
    #[error("render script failed: {0}")]
    Failed(String),
    /// Output handling failed.
    #[error("render io error: {0}")]
    Io(String),
}

/// Report generation capability.
pub trait ReportRenderer: Send + Sync {
    /// Runs the script and returns the path of the generated output.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the script cannot run or fails.
    fn render(&self, request: &RenderRequest) -> Result<PathBuf, RenderError>;
}
