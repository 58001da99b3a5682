// crates/report-registry-engine/src/signatures.rs
// ============================================================================
// Module: Signature Directory
// Description: Detached signature lookup and duplicate-uuid links.
// Purpose: Resolve the signature covering a report format and its identity.
// Dependencies: std, tracing
// ============================================================================

//! ## Overview
//! Signatures are detached `<uuid>.asc` files. Lookup tries the feed's
//! signature directory first and the private shared directory second. When a
//! re-import rewrites a uuid, the private directory receives a symlink named
//! after the new uuid pointing at the original's signature; the link target's
//! file stem then names the identity the signature was made over.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::path::PathBuf;

use report_registry_core::RegistryError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Extension of detached signature files.
const SIGNATURE_EXTENSION: &str = "asc";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Resolved signature file.
///
/// # Invariants
/// - `identity_uuid` is the uuid the signature was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureLocation {
    /// Path that was found (possibly a symlink).
    pub path: PathBuf,
    /// Uuid the signature covers.
    pub identity_uuid: String,
    /// Raw signature bytes.
    pub bytes: Vec<u8>,
}

/// Feed and private signature directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDirectory {
    /// Regular signature directory provided by the feed.
    feed_dir: Option<PathBuf>,
    /// Private directory holding shared signatures and duplicate links.
    private_dir: PathBuf,
}

impl SignatureDirectory {
    /// Builds a directory pair.
    #[must_use]
    pub const fn new(feed_dir: Option<PathBuf>, private_dir: PathBuf) -> Self {
        Self {
            feed_dir,
            private_dir,
        }
    }

    /// Returns the private directory.
    #[must_use]
    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// Finds the signature for `uuid`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Integrity`] when a present file cannot be read.
    pub fn find(&self, uuid: &str) -> Result<Option<SignatureLocation>, RegistryError> {
        let file_name = signature_file_name(uuid);
        if let Some(feed_dir) = &self.feed_dir {
            let path = feed_dir.join(&file_name);
            if path.is_file() {
                let bytes = read_signature(&path)?;
                return Ok(Some(SignatureLocation {
                    path,
                    identity_uuid: uuid.to_string(),
                    bytes,
                }));
            }
        }
        let path = self.private_dir.join(&file_name);
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RegistryError::Integrity(err.to_string())),
        };
        let identity_uuid = if metadata.file_type().is_symlink() {
            let target = fs::read_link(&path).map_err(|err| RegistryError::Integrity(err.to_string()))?;
            match target.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) => stem.to_string(),
                None => return Ok(None),
            }
        } else {
            uuid.to_string()
        };
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "dangling signature link");
            return Ok(None);
        }
        let bytes = read_signature(&path)?;
        Ok(Some(SignatureLocation {
            path,
            identity_uuid,
            bytes,
        }))
    }

    /// Links `new_uuid` to the signature of the report format it duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Integrity`] when the link cannot be created.
    pub fn link_duplicate(&self, new_uuid: &str, original: &SignatureLocation) -> Result<PathBuf, RegistryError> {
        fs::create_dir_all(&self.private_dir).map_err(|err| RegistryError::Integrity(err.to_string()))?;
        let link = self.private_dir.join(signature_file_name(new_uuid));
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link).map_err(|err| RegistryError::Integrity(err.to_string()))?;
        }
        let target = if original.path.is_absolute() {
            original.path.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| RegistryError::Integrity(err.to_string()))?
                .join(&original.path)
        };
        let target = resolve_identity_path(&target, &original.identity_uuid);
        symlink(&target, &link).map_err(|err| RegistryError::Integrity(err.to_string()))?;
        Ok(link)
    }

    /// Removes the duplicate link for `uuid`; regular files are left alone.
    pub fn remove_link(&self, uuid: &str) {
        let link = self.private_dir.join(signature_file_name(uuid));
        let is_link = fs::symlink_metadata(&link).is_ok_and(|metadata| metadata.file_type().is_symlink());
        if is_link && let Err(err) = fs::remove_file(&link) {
            tracing::warn!(path = %link.display(), error = %err, "failed to remove signature link");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns `<uuid>.asc`.
fn signature_file_name(uuid: &str) -> String {
    format!("{uuid}.{SIGNATURE_EXTENSION}")
}

/// Reads a signature file.
fn read_signature(path: &Path) -> Result<Vec<u8>, RegistryError> {
    fs::read(path).map_err(|err| RegistryError::Integrity(err.to_string()))
}

/// Follows a link chain so the new link points at the identity's own file.
fn resolve_identity_path(path: &Path, identity_uuid: &str) -> PathBuf {
    match fs::read_link(path) {
        Ok(target) if target.file_stem().and_then(|stem| stem.to_str()) == Some(identity_uuid) => {
            if target.is_absolute() {
                target
            } else {
                path.parent().map_or(target.clone(), |parent| parent.join(&target))
            }
        }
        _ => path.to_path_buf(),
    }
}
