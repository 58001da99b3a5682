// crates/report-registry-engine/src/feed.rs
// ============================================================================
// Module: Feed Synchronizer
// Description: Reconciles a feed directory of report format documents.
// Purpose: Create, update, or skip predefined report formats per feed file.
// Dependencies: report-registry-core, report-registry-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! Each pass walks `<feed>/report_formats/` in file name order. Files whose
//! name starts with `.` or does not end in `<uuid>.xml` are ignored. For the
//! rest:
//! - an active report format with the uuid is updated in place when the file
//!   is newer than the stored modification time (or on rebuild), else skipped
//! - a trashed report format with the uuid as its original identity is
//!   skipped; the feed never resurrects trashed content
//! - otherwise the document is created as a predefined, trusted report format
//!   owned by the feed owner and readable by the import roles
//!
//! Params a feed update no longer declares are found through the store's
//! check tables and removed at the end of the pass.
//!
//! Updates replace the asset directory by staging the new files next to the
//! live directory and swapping them before commit; the previous directory is
//! removed after the commit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use report_registry_core::NewReportFormat;
use report_registry_core::RegistryError;
use report_registry_core::RegistryResult;
use report_registry_core::ReportFormat;
use report_registry_core::ResourceUuid;
use report_registry_core::Trust;
use report_registry_core::UserRef;
use report_registry_core::params::definitions_from_requests;
use report_registry_store_sqlite::SqliteStoreError;
use report_registry_store_sqlite::StoreTx;

use crate::import::read_report_format_document;
use crate::lifecycle::CreateMode;
use crate::lifecycle::ReportFormatRegistry;
use crate::lifecycle::StoreResultExt;
use crate::lifecycle::unix_now;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Subdirectory of the feed holding report format documents.
const FEED_SUBDIR: &str = "report_formats";
/// Document file suffix.
const DOCUMENT_SUFFIX: &str = ".xml";
/// Length of a canonical uuid.
const UUID_LENGTH: usize = 36;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Feed settings.
///
/// # Invariants
/// - `import_roles` are role uuids; unknown roles are skipped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedConfig {
    /// Feed root containing `report_formats/`.
    pub dir: PathBuf,
    /// Uuid of the user owning feed-created report formats.
    pub owner_uuid: Option<String>,
    /// Role uuids granted read permission on created report formats.
    pub import_roles: Vec<String>,
}

/// Counts of one feed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSyncReport {
    /// Report formats created.
    pub created: usize,
    /// Report formats updated in place.
    pub updated: usize,
    /// Files skipped (unchanged or trashed).
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
    /// Stale params removed.
    pub removed_params: usize,
}

/// Outcome for one feed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    /// Created.
    Created,
    /// Updated.
    Updated,
    /// Skipped.
    Skipped,
}

/// Feed synchronizer bound to a registry.
pub struct FeedSynchronizer<'a> {
    /// Registry receiving creates and updates.
    registry: &'a ReportFormatRegistry,
    /// Feed settings.
    config: FeedConfig,
}

// ============================================================================
// SECTION: Synchronization
// ============================================================================

impl<'a> FeedSynchronizer<'a> {
    /// Builds a synchronizer.
    #[must_use]
    pub const fn new(registry: &'a ReportFormatRegistry, config: FeedConfig) -> Self {
        Self {
            registry,
            config,
        }
    }

    /// Runs one pass. With `rebuild`, every known document is updated.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoFeedDir`] or [`RegistryError::NoFeedOwner`]
    /// before any change, or a store failure. Per-file failures are counted,
    /// not returned.
    pub fn sync(&self, rebuild: bool) -> RegistryResult<FeedSyncReport> {
        let documents_dir = self.config.dir.join(FEED_SUBDIR);
        if !documents_dir.is_dir() {
            return Err(RegistryError::NoFeedDir(documents_dir.display().to_string()));
        }
        let (owner, roles) = self.resolve_owner_and_roles()?;
        let documents = list_documents(&documents_dir)?;

        let tx = self.registry.store.begin().or_internal("feed_sync")?;
        tx.create_feed_check_tables().or_internal("feed_sync")?;
        tx.commit().or_internal("feed_sync")?;

        let mut report = FeedSyncReport::default();
        for (path, uuid) in &documents {
            match self.sync_document(path, uuid, &owner, &roles, rebuild) {
                Ok(FileOutcome::Created) => report.created += 1,
                Ok(FileOutcome::Updated) => report.updated += 1,
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        code = err.code(),
                        error = %err,
                        "feed document failed"
                    );
                    report.failed += 1;
                }
            }
        }

        let tx = self.registry.store.begin().or_internal("feed_sync")?;
        report.removed_params = tx.remove_unconfirmed_feed_params().or_internal("feed_sync")?;
        tx.drop_feed_check_tables().or_internal("feed_sync")?;
        tx.commit().or_internal("feed_sync")?;

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            removed_params = report.removed_params,
            rebuild,
            "feed sync finished"
        );
        Ok(report)
    }

    /// Resolves the feed owner and import role ids.
    fn resolve_owner_and_roles(&self) -> RegistryResult<(UserRef, Vec<i64>)> {
        let owner_uuid = self
            .config
            .owner_uuid
            .as_deref()
            .filter(|uuid| !uuid.is_empty())
            .ok_or(RegistryError::NoFeedOwner)?;
        let tx = self.registry.store.begin_read().or_internal("feed_sync")?;
        let owner = tx.find_user(owner_uuid).or_internal("feed_sync")?.ok_or(RegistryError::NoFeedOwner)?;
        let mut roles = Vec::with_capacity(self.config.import_roles.len());
        for role_uuid in &self.config.import_roles {
            match tx.find_role(role_uuid).or_internal("feed_sync")? {
                Some(role) => roles.push(role),
                None => tracing::warn!(role = %role_uuid, "feed import role not found"),
            }
        }
        Ok((owner, roles))
    }

    /// Applies one feed document.
    fn sync_document(
        &self,
        path: &Path,
        uuid: &str,
        owner: &UserRef,
        roles: &[i64],
        rebuild: bool,
    ) -> RegistryResult<FileOutcome> {
        let document_time = modification_time(path)?;
        let (existing, trashed) = {
            let tx = self.registry.store.begin_read().or_internal("feed_sync")?;
            (
                tx.find_report_format(uuid).or_internal("feed_sync")?,
                tx.trash_holds_original(uuid).or_internal("feed_sync")?,
            )
        };
        if let Some(existing) = existing {
            if !existing.predefined {
                return Err(RegistryError::Exists);
            }
            if !rebuild && document_time <= existing.modification_time {
                tracing::debug!(uuid, "feed document unchanged");
                return Ok(FileOutcome::Skipped);
            }
            let request = read_report_format_document(path)?;
            self.update(&existing, &request, document_time)?;
            return Ok(FileOutcome::Updated);
        }
        if trashed {
            tracing::debug!(uuid, "feed document matches a trashed report format");
            return Ok(FileOutcome::Skipped);
        }
        let mut request = read_report_format_document(path)?;
        request.uuid = Some(uuid.to_string());
        self.registry.create_record(
            owner,
            &request,
            CreateMode::Feed {
                import_roles: roles,
                document_time,
            },
        )?;
        Ok(FileOutcome::Created)
    }

    /// Rewrites a predefined report format from its feed document.
    ///
    /// Trust stays `yes` without re-verification, as for feed creates.
    fn update(&self, existing: &ReportFormat, request: &NewReportFormat, document_time: i64) -> RegistryResult<()> {
        let params = definitions_from_requests(&request.params)?;
        let now = unix_now();
        let source = ReportFormat {
            name: request.name.clone(),
            extension: request.extension.clone(),
            content_type: request.content_type.clone(),
            summary: request.summary.clone(),
            description: request.description.clone(),
            signature: request.signature.clone().unwrap_or_default(),
            trust: Trust::Yes,
            trust_time: now,
            predefined: true,
            modification_time: now.max(document_time),
            params,
            ..existing.clone()
        };
        let uuid = existing.uuid.as_str();
        let assets = &self.registry.assets;
        let parent = self.registry.layout.active_parent(existing.owner_uuid());
        let live = parent.join(uuid);
        let retired = parent.join(format!("{uuid}.retired-{}", ResourceUuid::generate()));
        let staged = assets.create_or_replace_dir(&parent, &format!("{uuid}.staging"), &request.files)?;

        let tx = self.registry.store.begin().or_internal("feed_update")?;
        if let Err(err) = write_feed_rows(&tx, existing.id, &source).or_internal("feed_update") {
            self.registry.remove_best_effort(&staged, "feed update rolled back");
            return Err(err);
        }

        let had_live = live.is_dir();
        if had_live && let Err(err) = assets.move_dir(&live, &retired) {
            self.registry.remove_best_effort(&staged, "feed update rolled back");
            return Err(err.into());
        }
        if let Err(err) = assets.move_dir(&staged, &live) {
            self.registry.remove_best_effort(&staged, "feed update rolled back");
            if had_live {
                self.registry.move_back(&retired, &live);
            }
            return Err(err.into());
        }
        if let Err(err) = tx.commit().or_internal("feed_update") {
            self.registry.remove_best_effort(&live, "feed update rolled back");
            if had_live {
                self.registry.move_back(&retired, &live);
            }
            return Err(err);
        }
        if had_live {
            self.registry.remove_best_effort(&retired, "feed update replaced files");
        }
        tracing::info!(uuid, "predefined report format updated from feed");
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rewrites a report format row and its params, confirming them as seen.
fn write_feed_rows(tx: &StoreTx<'_>, format_id: i64, source: &ReportFormat) -> Result<(), SqliteStoreError> {
    tx.confirm_feed_format(format_id)?;
    tx.update_from_feed(format_id, source)?;
    for param in &source.params {
        let param_id = tx.upsert_param(format_id, param)?;
        tx.confirm_feed_param(param_id)?;
    }
    Ok(())
}

/// Lists feed documents with their uuids, sorted by file name.
fn list_documents(dir: &Path) -> RegistryResult<Vec<(PathBuf, String)>> {
    let entries = fs::read_dir(dir).map_err(|err| RegistryError::Integrity(err.to_string()))?;
    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| RegistryError::Integrity(err.to_string()))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if let Some(uuid) = document_uuid(&name) {
            documents.push((entry.path(), uuid.to_string()));
        }
    }
    documents.sort();
    Ok(documents)
}

/// Extracts the uuid from `<anything><uuid>.xml`; hidden files never match.
fn document_uuid(file_name: &str) -> Option<&str> {
    if file_name.starts_with('.') {
        return None;
    }
    let stem = file_name.strip_suffix(DOCUMENT_SUFFIX)?;
    let uuid = stem.get(stem.len().checked_sub(UUID_LENGTH)?..)?;
    ResourceUuid::is_well_formed(uuid).then_some(uuid)
}

/// Returns a file's modification time in unix seconds.
fn modification_time(path: &Path) -> RegistryResult<i64> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|err| RegistryError::Integrity(err.to_string()))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)))
}
