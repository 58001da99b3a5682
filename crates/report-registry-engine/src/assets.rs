// crates/report-registry-engine/src/assets.rs
// ============================================================================
// Module: Filesystem Asset Store
// Description: Per-owner, per-uuid directories holding report format files.
// Purpose: Create, copy, move, and remove flat asset directories.
// Dependencies: base64, report-registry-core, thiserror, tracing
// ============================================================================

//! ## Overview
//! Asset directories are flat: each holds named files, one of which may be
//! the executable `generate` script. Directories are created owner-only,
//! filled, and then widened to `0755`; `generate` gets `0755` and every
//! other file `0444`. A failed fill removes the whole directory.
//!
//! Moves try an atomic rename first and fall back to copy-then-delete across
//! devices. The final delete of that fallback is best effort.
//!
//! Security posture: file names come from requests and feed documents; names
//! containing path separators or dot segments are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use report_registry_core::AssetFile;
use report_registry_core::RegistryError;
use report_registry_core::SignedFile;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the executable rendering script.
pub const GENERATE_SCRIPT: &str = "generate";
/// Directory mode while being filled.
const FILLING_DIR_MODE: u32 = 0o700;
/// Directory mode once complete.
const DIR_MODE: u32 = 0o755;
/// Mode of the `generate` script.
const SCRIPT_MODE: u32 = 0o755;
/// Mode of every other asset file.
const FILE_MODE: u32 = 0o444;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Asset store errors.
///
/// # Invariants
/// - Messages name paths, never file contents.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A file in the request had an empty name.
    #[error("asset file name must not be empty")]
    EmptyFileName,
    /// A file name would escape the asset directory.
    #[error("asset file name is not a plain name: {0}")]
    InvalidFileName(String),
    /// File contents were not valid base64.
    #[error("asset file {0} is not valid base64")]
    Decode(String),
    /// The source directory of a copy or move is missing.
    #[error("asset directory missing: {0}")]
    MissingSource(String),
    /// Filesystem failure.
    #[error("asset io error at {path}: {message}")]
    Io {
        /// Path the operation touched.
        path: String,
        /// Underlying error text.
        message: String,
    },
}

impl AssetError {
    /// Builds an I/O error for `path`.
    fn io(path: &Path, err: &io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<AssetError> for RegistryError {
    fn from(error: AssetError) -> Self {
        match error {
            AssetError::EmptyFileName => Self::EmptyFileName,
            other => {
                tracing::error!(error = %other, "asset store failure");
                Self::Integrity(other.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Directory layout under the state directory.
///
/// # Invariants
/// - Active: `<state>/report_formats/<owner-uuid|global>/<uuid>`.
/// - Trash: `<state>/report_formats_trash/<trash-row-id>`.
/// - Shared signatures: `<state>/signatures/report_formats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    /// State directory root.
    state_dir: PathBuf,
}

impl AssetLayout {
    /// Builds a layout rooted at `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Returns the state directory root.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Parent directory of an owner's active asset directories.
    #[must_use]
    pub fn active_parent(&self, owner_uuid: Option<&str>) -> PathBuf {
        self.state_dir.join("report_formats").join(owner_uuid.unwrap_or("global"))
    }

    /// Active asset directory of a report format.
    #[must_use]
    pub fn active_dir(&self, owner_uuid: Option<&str>, uuid: &str) -> PathBuf {
        self.active_parent(owner_uuid).join(uuid)
    }

    /// Parent directory of trashed asset directories.
    #[must_use]
    pub fn trash_parent(&self) -> PathBuf {
        self.state_dir.join("report_formats_trash")
    }

    /// Trashed asset directory for a trash row id.
    #[must_use]
    pub fn trash_dir(&self, trash_id: i64) -> PathBuf {
        self.trash_parent().join(trash_id.to_string())
    }

    /// Private shared-signature directory.
    #[must_use]
    pub fn signatures_dir(&self) -> PathBuf {
        self.state_dir.join("signatures").join("report_formats")
    }
}

// ============================================================================
// SECTION: Interface
// ============================================================================

/// Asset directory operations used by the lifecycle engine.
pub trait AssetStore: Send + Sync {
    /// Creates `parent/key` with `files`, replacing any existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] when a name is invalid or a write fails; the
    /// directory is removed in that case.
    fn create_or_replace_dir(
        &self,
        parent: &Path,
        key: &str,
        files: &[AssetFile],
    ) -> Result<PathBuf, AssetError>;

    /// Copies every file of `source` into a new `dest_parent/dest_key`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] when the source is missing or a copy fails.
    fn copy_dir(&self, source: &Path, dest_parent: &Path, dest_key: &str) -> Result<PathBuf, AssetError>;

    /// Moves `source` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] when neither rename nor copy succeeds.
    fn move_dir(&self, source: &Path, dest: &Path) -> Result<(), AssetError>;

    /// Removes a directory tree; a missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] when removal fails.
    fn remove_dir(&self, dir: &Path) -> Result<(), AssetError>;

    /// Reads every file of a directory, sorted by name bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] when the directory cannot be read.
    fn read_files(&self, dir: &Path) -> Result<Vec<SignedFile>, AssetError>;
}

// ============================================================================
// SECTION: Filesystem Implementation
// ============================================================================

/// Asset store on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAssetStore;

impl AssetStore for FsAssetStore {
    fn create_or_replace_dir(
        &self,
        parent: &Path,
        key: &str,
        files: &[AssetFile],
    ) -> Result<PathBuf, AssetError> {
        check_file_name(key)?;
        let dir = parent.join(key);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|err| AssetError::io(&dir, &err))?;
        }
        fs::create_dir_all(parent).map_err(|err| AssetError::io(parent, &err))?;
        fs::create_dir(&dir).map_err(|err| AssetError::io(&dir, &err))?;
        let filled = set_mode(&dir, FILLING_DIR_MODE)
            .and_then(|()| files.iter().try_for_each(|file| write_asset(&dir, file)))
            .and_then(|()| set_mode(&dir, DIR_MODE));
        if let Err(err) = filled {
            discard(&dir);
            return Err(err);
        }
        Ok(dir)
    }

    fn copy_dir(&self, source: &Path, dest_parent: &Path, dest_key: &str) -> Result<PathBuf, AssetError> {
        check_file_name(dest_key)?;
        if !source.is_dir() {
            return Err(AssetError::MissingSource(source.display().to_string()));
        }
        fs::create_dir_all(dest_parent).map_err(|err| AssetError::io(dest_parent, &err))?;
        let dest = dest_parent.join(dest_key);
        fs::create_dir(&dest).map_err(|err| AssetError::io(&dest, &err))?;
        let copied = set_mode(&dest, FILLING_DIR_MODE)
            .and_then(|()| copy_entries(source, &dest))
            .and_then(|()| set_mode(&dest, DIR_MODE));
        if let Err(err) = copied {
            discard(&dest);
            return Err(err);
        }
        Ok(dest)
    }

    fn move_dir(&self, source: &Path, dest: &Path) -> Result<(), AssetError> {
        if !source.is_dir() {
            return Err(AssetError::MissingSource(source.display().to_string()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| AssetError::io(parent, &err))?;
        }
        match fs::rename(source, dest) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                fs::create_dir(dest).map_err(|err| AssetError::io(dest, &err))?;
                let copied = copy_entries(source, dest).and_then(|()| set_mode(dest, DIR_MODE));
                if let Err(err) = copied {
                    discard(dest);
                    return Err(err);
                }
                if let Err(err) = fs::remove_dir_all(source) {
                    tracing::warn!(
                        path = %source.display(),
                        error = %err,
                        "failed to remove asset directory after cross-device move"
                    );
                }
                Ok(())
            }
            Err(err) => Err(AssetError::io(source, &err)),
        }
    }

    fn remove_dir(&self, dir: &Path) -> Result<(), AssetError> {
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AssetError::io(dir, &err)),
        }
    }

    fn read_files(&self, dir: &Path) -> Result<Vec<SignedFile>, AssetError> {
        let entries = fs::read_dir(dir).map_err(|err| AssetError::io(dir, &err))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| AssetError::io(dir, &err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| AssetError::InvalidFileName(path.display().to_string()))?;
            let contents = fs::read(&path).map_err(|err| AssetError::io(&path, &err))?;
            files.push(SignedFile {
                name,
                contents,
            });
        }
        files.sort_by(|left, right| left.name.as_bytes().cmp(right.name.as_bytes()));
        Ok(files)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes request files for signing, rejecting invalid names.
///
/// # Errors
///
/// Returns [`AssetError`] for an empty or unsafe name or invalid base64.
pub fn decode_files(files: &[AssetFile]) -> Result<Vec<SignedFile>, AssetError> {
    files
        .iter()
        .map(|file| {
            check_file_name(&file.name)?;
            Ok(SignedFile {
                name: file.name.clone(),
                contents: decode_contents(file)?,
            })
        })
        .collect()
}

/// Rejects empty names and names that are not a single path component.
fn check_file_name(name: &str) -> Result<(), AssetError> {
    if name.is_empty() {
        return Err(AssetError::EmptyFileName);
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(AssetError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Decodes base64 contents; surrounding whitespace and line breaks are ignored.
fn decode_contents(file: &AssetFile) -> Result<Vec<u8>, AssetError> {
    let compact: String = file.content_base64.chars().filter(|ch| !ch.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(|_| AssetError::Decode(file.name.clone()))
}

/// Writes one decoded asset file and sets its mode.
fn write_asset(dir: &Path, file: &AssetFile) -> Result<(), AssetError> {
    check_file_name(&file.name)?;
    let contents = decode_contents(file)?;
    let path = dir.join(&file.name);
    fs::write(&path, contents).map_err(|err| AssetError::io(&path, &err))?;
    set_mode(&path, file_mode(&file.name))
}

/// Copies every regular file from `source` into `dest`.
fn copy_entries(source: &Path, dest: &Path) -> Result<(), AssetError> {
    let entries = fs::read_dir(source).map_err(|err| AssetError::io(source, &err))?;
    for entry in entries {
        let entry = entry.map_err(|err| AssetError::io(source, &err))?;
        let from = entry.path();
        if !from.is_file() {
            continue;
        }
        let to = dest.join(entry.file_name());
        fs::copy(&from, &to).map_err(|err| AssetError::io(&from, &err))?;
        let mode = file_mode(&entry.file_name().to_string_lossy());
        set_mode(&to, mode)?;
    }
    Ok(())
}

/// Returns the mode for an asset file name.
fn file_mode(name: &str) -> u32 {
    if name == GENERATE_SCRIPT { SCRIPT_MODE } else { FILE_MODE }
}

/// Sets the permission bits of a path.
fn set_mode(path: &Path, mode: u32) -> Result<(), AssetError> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|err| AssetError::io(path, &err))
}

/// Removes a partially written directory, logging failures.
fn discard(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        tracing::warn!(path = %dir.display(), error = %err, "failed to discard asset directory");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions and helpers are permitted.")]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use report_registry_core::AssetFile;
    use tempfile::TempDir;

    use super::AssetError;
    use super::AssetStore;
    use super::FsAssetStore;

    fn file(name: &str, base64: &str) -> AssetFile {
        AssetFile {
            name: name.to_string(),
            content_base64: base64.to_string(),
        }
    }

    #[test]
    fn create_sets_modes_and_replaces() {
        let root = TempDir::new().unwrap();
        let store = FsAssetStore;
        let files = [file("generate", "IyEvYmluL3NoCg=="), file("style.xsl", "PHhzbC8+")];
        let dir = store.create_or_replace_dir(root.path(), "u1", &files).unwrap();
        let mode = |name: &str| fs::metadata(dir.join(name)).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode("generate"), 0o755);
        assert_eq!(mode("style.xsl"), 0o444);
        assert_eq!(fs::metadata(&dir).unwrap().permissions().mode() & 0o777, 0o755);

        store.create_or_replace_dir(root.path(), "u1", &[file("other", "")]).unwrap();
        assert!(!dir.join("generate").exists());
        assert!(dir.join("other").exists());
    }

    #[test]
    fn failed_fill_removes_directory() {
        let root = TempDir::new().unwrap();
        let store = FsAssetStore;
        let files = [file("a", "YQ=="), file("", "YQ==")];
        let err = store.create_or_replace_dir(root.path(), "u2", &files).unwrap_err();
        assert!(matches!(err, AssetError::EmptyFileName));
        assert!(!root.path().join("u2").exists());

        let err = store.create_or_replace_dir(root.path(), "u3", &[file("a", "%%%")]).unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
        assert!(!root.path().join("u3").exists());

        let err = store.create_or_replace_dir(root.path(), "u4", &[file("../x", "")]).unwrap_err();
        assert!(matches!(err, AssetError::InvalidFileName(_)));
    }

    #[test]
    fn read_files_sorts_by_name_bytes() {
        let root = TempDir::new().unwrap();
        let store = FsAssetStore;
        let files = [file("b", "Yg=="), file("B", "Qg=="), file("a", "YQ==")];
        let dir = store.create_or_replace_dir(root.path(), "u5", &files).unwrap();
        let names: Vec<String> = store.read_files(&dir).unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["B", "a", "b"]);
    }
}
