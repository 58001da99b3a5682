// crates/report-registry-engine/src/lib.rs
// ============================================================================
// Module: Report Registry Engine Library
// Description: Lifecycle engine over the relational store and asset tree.
// Purpose: Keep rows and asset directories consistent across transitions.
// Dependencies: report-registry-core, report-registry-store-sqlite, base64,
//               roxmltree, tempfile, tracing
// ============================================================================

//! ## Overview
//! The engine owns every side effect of the report format registry:
//! - [`assets`]: per-resource asset directories on disk
//! - [`signatures`]: shared detached-signature files and duplicate links
//! - [`verifier`] and [`renderer`]: external process capabilities
//! - [`lifecycle`]: create, copy, modify, delete, restore, verify, apply
//! - [`import`] and [`feed`]: the report format document format and the
//!   feed synchronizer
//!
//! Security posture: request payloads and feed documents are untrusted; the
//! asset tree is private to this crate and the rendering script.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assets;
pub mod feed;
pub mod import;
pub mod lifecycle;
pub mod renderer;
pub mod signatures;
pub mod verifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assets::AssetError;
pub use assets::AssetLayout;
pub use assets::AssetStore;
pub use assets::FsAssetStore;
pub use feed::FeedConfig;
pub use feed::FeedSyncReport;
pub use feed::FeedSynchronizer;
pub use import::parse_report_format_document;
pub use import::read_report_format_document;
pub use lifecycle::ModifyRequest;
pub use lifecycle::ParamUpdate;
pub use lifecycle::ReportFormatRegistry;
pub use renderer::ScriptRenderer;
pub use signatures::SignatureDirectory;
pub use signatures::SignatureLocation;
pub use verifier::ProcessSignatureVerifier;
