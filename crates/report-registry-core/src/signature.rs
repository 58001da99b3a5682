// crates/report-registry-core/src/signature.rs
// ============================================================================
// Module: Report Format Canonical String
// Description: Deterministic serialization of report format content.
// Purpose: Produce the exact byte string a detached signature covers.
// Dependencies: crate::params
// ============================================================================

//! ## Overview
//! The canonical string is the concatenation of the identity uuid, the
//! extension, the content type, and the predefined flag (`0`/`1`), followed
//! by each file name and its decoded contents (files sorted by name in byte
//! order), then each param's name, type, bounds (only when set), default, and
//! options, terminated by a newline. There are no separators; the layout
//! must stay byte-identical to what feed publishers sign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::params::ParamDefinition;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Decoded file content participating in the canonical string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFile {
    /// File name inside the asset directory.
    pub name: String,
    /// Decoded file contents.
    pub contents: Vec<u8>,
}

// ============================================================================
// SECTION: Canonical String
// ============================================================================

/// Builds the canonical string for signature verification.
///
/// Files are sorted by name in byte order regardless of input order; params
/// are consumed in the order given.
#[must_use]
pub fn canonical_string(
    identity_uuid: &str,
    extension: &str,
    content_type: &str,
    predefined: bool,
    files: &[SignedFile],
    params: &[ParamDefinition],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(identity_uuid.as_bytes());
    out.extend_from_slice(extension.as_bytes());
    out.extend_from_slice(content_type.as_bytes());
    out.push(if predefined { b'1' } else { b'0' });

    let mut sorted: Vec<&SignedFile> = files.iter().collect();
    sorted.sort_by(|left, right| left.name.as_bytes().cmp(right.name.as_bytes()));
    for file in sorted {
        out.extend_from_slice(file.name.as_bytes());
        out.extend_from_slice(&file.contents);
    }

    for param in params {
        out.extend_from_slice(param.name.as_bytes());
        out.extend_from_slice(param.param_type.as_str().as_bytes());
        if let Some(min) = param.bounds.min() {
            out.extend_from_slice(min.to_string().as_bytes());
        }
        if let Some(max) = param.bounds.max() {
            out.extend_from_slice(max.to_string().as_bytes());
        }
        out.extend_from_slice(param.fallback.as_bytes());
        for option in &param.options {
            out.extend_from_slice(option.as_bytes());
        }
    }
    out.push(b'\n');
    out
}
