// crates/report-registry-core/src/lib.rs
// ============================================================================
// Module: Report Registry Core Library
// Description: Data model, param type system, and trust primitives.
// Purpose: Backend-agnostic contracts shared by the store, engine, and CLI.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! `report-registry-core` defines the report format data model, the
//! parameter type system with its validation rules, the canonical string used
//! for signature verification, and the capability interfaces (authorization,
//! signature verification, report rendering) the lifecycle engine consumes.
//! Nothing in this crate performs I/O.
//!
//! Security posture: imported report formats are untrusted until a signature
//! verdict says otherwise; all validation here fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod interfaces;
pub mod model;
pub mod params;
pub mod signature;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::RegistryError;
pub use error::RegistryResult;
pub use interfaces::Action;
pub use interfaces::Authorizer;
pub use interfaces::DenyAll;
pub use interfaces::PermitAll;
pub use interfaces::RenderError;
pub use interfaces::RenderRequest;
pub use interfaces::ReportRenderer;
pub use interfaces::RequestContext;
pub use interfaces::SignatureVerifier;
pub use model::AssetFile;
pub use model::NewParam;
pub use model::NewReportFormat;
pub use model::REPORT_FORMAT_FLAG_ACTIVE;
pub use model::ReportFormat;
pub use model::ResourceUuid;
pub use model::TrashedReportFormat;
pub use model::Trust;
pub use model::UserRef;
pub use params::ParamBounds;
pub use params::ParamDefinition;
pub use params::ParamError;
pub use params::ParamType;
pub use params::ValidationFailed;
pub use params::ValidationTarget;
pub use signature::SignedFile;
pub use signature::canonical_string;
