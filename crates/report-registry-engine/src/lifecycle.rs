// crates/report-registry-engine/src/lifecycle.rs
// ============================================================================
// Module: Report Format Lifecycle
// Description: Active/trash/gone transitions over rows and asset directories.
// Purpose: Keep the relational store and the asset tree in agreement.
// Dependencies: report-registry-core, report-registry-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! Every transition runs inside one store transaction and touches at most
//! one asset directory. There is no distributed commit; agreement between
//! rows and directories rests on this ordering protocol:
//!
//! 1. Validation, authorization, and conflict checks happen before any
//!    side effect and abort with nothing to undo.
//! 2. Directories a transition *creates* (create, copy) are written before
//!    the commit that makes a row reference them. If anything after the
//!    write fails, the transaction rolls back and the directory is removed.
//! 3. Directories a transition *moves* (soft delete, restore) are moved
//!    after every relational step but before the commit. If the commit
//!    fails, the directory is moved back.
//! 4. Directories a transition *destroys* (ultimate delete, empty trash)
//!    are removed only after a successful commit. A failed removal leaves
//!    an orphan directory, which is logged; it never leaves a row without
//!    its directory.
//!
//! Authorization is delegated to the [`RequestContext`] oracle; the engine
//! holds no ambient user state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use report_registry_core::Action;
use report_registry_core::NewReportFormat;
use report_registry_core::REPORT_FORMAT_FLAG_ACTIVE;
use report_registry_core::RegistryError;
use report_registry_core::RegistryResult;
use report_registry_core::RenderRequest;
use report_registry_core::ReportFormat;
use report_registry_core::ReportRenderer;
use report_registry_core::RequestContext;
use report_registry_core::ResourceUuid;
use report_registry_core::SignatureVerifier;
use report_registry_core::TrashedReportFormat;
use report_registry_core::Trust;
use report_registry_core::UserRef;
use report_registry_core::ValidationTarget;
use report_registry_core::canonical_string;
use report_registry_core::params::definitions_from_requests;
use report_registry_store_sqlite::Location;
use report_registry_store_sqlite::ReportFormatUpdate;
use report_registry_store_sqlite::SqliteResourceStore;
use report_registry_store_sqlite::SqliteStoreError;
use report_registry_store_sqlite::StoreTx;
use report_registry_store_sqlite::SubjectType;

use crate::assets::AssetLayout;
use crate::assets::AssetStore;
use crate::assets::FsAssetStore;
use crate::assets::GENERATE_SCRIPT;
use crate::assets::decode_files;
use crate::signatures::SignatureDirectory;
use crate::signatures::SignatureLocation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Permission granted to feed import roles on feed-created report formats.
const FEED_ROLE_PERMISSION: &str = "get_report_formats";
/// Name of the report XML written for rendering.
const REPORT_INPUT_NAME: &str = "report.xml";

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Single param value change carried by a modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamUpdate {
    /// Param name.
    pub name: String,
    /// New value.
    pub value: String,
}

/// Modify request.
///
/// # Invariants
/// - `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyRequest {
    /// New display name.
    pub name: Option<String>,
    /// New summary.
    pub summary: Option<String>,
    /// New active flag.
    pub active: Option<bool>,
    /// Param value change.
    pub param: Option<ParamUpdate>,
}

/// How a create resolves trust and uuid collisions.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CreateMode<'a> {
    /// User import: collisions get a fresh uuid; trust comes from the verifier.
    Import,
    /// Feed import: collisions are rejected; trust is `yes`.
    Feed {
        /// Roles granted read permission.
        import_roles: &'a [i64],
        /// Modification time of the feed document.
        document_time: i64,
    },
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Lifecycle engine for report formats.
///
/// # Invariants
/// - A committed active row always has its asset directory.
/// - A committed trash row always has its trash directory.
pub struct ReportFormatRegistry {
    /// Relational store.
    pub(crate) store: Arc<SqliteResourceStore>,
    /// Asset directory operations.
    pub(crate) assets: Arc<dyn AssetStore>,
    /// Asset directory layout.
    pub(crate) layout: AssetLayout,
    /// Signature lookup.
    pub(crate) signatures: SignatureDirectory,
    /// Signature checker.
    verifier: Arc<dyn SignatureVerifier>,
    /// Script runner.
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportFormatRegistry {
    /// Builds a registry on the local filesystem.
    #[must_use]
    pub fn new(
        store: Arc<SqliteResourceStore>,
        layout: AssetLayout,
        signatures: SignatureDirectory,
        verifier: Arc<dyn SignatureVerifier>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            store,
            assets: Arc::new(FsAssetStore),
            layout,
            signatures,
            verifier,
            renderer,
        }
    }

    /// Replaces the asset store.
    #[must_use]
    pub fn with_asset_store(mut self, assets: Arc<dyn AssetStore>) -> Self {
        self.assets = assets;
        self
    }

    /// Returns the relational store.
    #[must_use]
    pub fn store(&self) -> &SqliteResourceStore {
        &self.store
    }

    /// Returns the asset layout.
    #[must_use]
    pub const fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// Creates a report format owned by the acting user.
    ///
    /// A requested uuid that is already in use is replaced by a fresh one and
    /// the original's signature is linked under the new uuid.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for authorization, param validation, file
    /// name, store, or filesystem failures.
    pub fn create(&self, ctx: &RequestContext<'_>, request: &NewReportFormat) -> RegistryResult<ResourceUuid> {
        authorize(ctx, Action::CreateReportFormat, None)?;
        self.create_record(ctx.user, request, CreateMode::Import)
    }

    /// Shared create path for user and feed imports.
    pub(crate) fn create_record(
        &self,
        owner: &UserRef,
        request: &NewReportFormat,
        mode: CreateMode<'_>,
    ) -> RegistryResult<ResourceUuid> {
        let params = definitions_from_requests(&request.params)?;
        let decoded = decode_files(&request.files)?;
        let now = unix_now();
        let requested = request
            .uuid
            .as_deref()
            .filter(|uuid| !uuid.is_empty())
            .map_or_else(ResourceUuid::generate, ResourceUuid::new);
        let inline = request.signature.as_deref().map(str::trim).filter(|text| !text.is_empty());
        let located = match inline {
            Some(_) => None,
            None => self.signatures.find(requested.as_str())?,
        };

        let (trust, predefined, modification_time) = match mode {
            CreateMode::Feed {
                document_time, ..
            } => (Trust::Yes, true, now.max(document_time)),
            CreateMode::Import => {
                let signature = inline.map(str::as_bytes).or_else(|| located.as_ref().map(|found| found.bytes.as_slice()));
                let trust = signature.map_or(Trust::Unknown, |signature| {
                    let identity = located.as_ref().map_or(requested.as_str(), |found| found.identity_uuid.as_str());
                    let canonical = canonical_string(
                        identity,
                        &request.extension,
                        &request.content_type,
                        false,
                        &decoded,
                        &params,
                    );
                    self.verifier.verify(&canonical, signature)
                });
                (trust, false, now)
            }
        };

        let tx = self.store.begin().or_internal("create")?;
        let uuid = if tx.uuid_taken(requested.as_str()).or_internal("create")? {
            if matches!(mode, CreateMode::Feed { .. }) {
                return Err(RegistryError::Exists);
            }
            let assigned = ResourceUuid::generate();
            tracing::info!(
                requested = %requested,
                assigned = %assigned,
                "report format uuid already in use; assigned a new uuid"
            );
            assigned
        } else {
            requested.clone()
        };
        let name = tx.unique_name(&request.name, Some(owner.id)).or_internal("create")?;
        let record = ReportFormat {
            id: 0,
            uuid: uuid.clone(),
            owner: Some(owner.clone()),
            name,
            extension: request.extension.clone(),
            content_type: request.content_type.clone(),
            summary: request.summary.clone(),
            description: request.description.clone(),
            signature: inline.unwrap_or_default().to_string(),
            trust,
            trust_time: now,
            flags: REPORT_FORMAT_FLAG_ACTIVE,
            predefined,
            creation_time: now,
            modification_time,
            params,
        };

        let parent = self.layout.active_parent(Some(&owner.uuid));
        let dir = self.assets.create_or_replace_dir(&parent, uuid.as_str(), &request.files)?;
        let link = if uuid == requested { None } else { located.as_ref() };
        let grants: &[i64] = match mode {
            CreateMode::Feed {
                import_roles, ..
            } => import_roles,
            CreateMode::Import => &[],
        };
        if let Err(err) = self.finish_create(tx, &record, link, grants) {
            self.remove_best_effort(&dir, "create rolled back");
            if link.is_some() {
                self.signatures.remove_link(uuid.as_str());
            }
            return Err(err);
        }
        tracing::info!(
            uuid = %uuid,
            owner = %owner.uuid,
            name = %record.name,
            trust = %trust,
            predefined,
            "report format created"
        );
        Ok(uuid)
    }

    /// Inserts rows, grants, and the duplicate link, then commits.
    fn finish_create(
        &self,
        tx: StoreTx<'_>,
        record: &ReportFormat,
        link: Option<&SignatureLocation>,
        grants: &[i64],
    ) -> RegistryResult<()> {
        let id = tx.insert_report_format(record).or_internal("create")?;
        for role in grants {
            tx.grant_permission(FEED_ROLE_PERMISSION, id, &record.uuid, SubjectType::Role, *role)
                .or_internal("create")?;
        }
        if let Some(original) = link {
            self.signatures.link_duplicate(record.uuid.as_str(), original)?;
        }
        tx.commit().or_internal("create")
    }

    // ------------------------------------------------------------------------
    // Copy
    // ------------------------------------------------------------------------

    /// Copies a report format under a new uuid owned by the acting user.
    ///
    /// Without a name the copy is called `"<source name> Clone"`. Copies of
    /// predefined report formats are trusted and never predefined.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the source is missing, access is
    /// refused, or a store or filesystem step fails.
    pub fn copy(&self, ctx: &RequestContext<'_>, source_uuid: &str, name: Option<&str>) -> RegistryResult<ResourceUuid> {
        authorize(ctx, Action::CreateReportFormat, None)?;
        authorize(ctx, Action::GetReportFormats, Some(&ResourceUuid::new(source_uuid)))?;
        let tx = self.store.begin().or_internal("copy")?;
        let source = tx
            .find_report_format(source_uuid)
            .or_internal("copy")?
            .ok_or_else(|| RegistryError::report_format_not_found(source_uuid))?;
        let base = name
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("{} Clone", source.name), str::to_string);
        let name = tx.unique_name(&base, Some(ctx.user.id)).or_internal("copy")?;
        let now = unix_now();
        let uuid = ResourceUuid::generate();
        let source_dir = self.layout.active_dir(source.owner_uuid(), source.uuid.as_str());
        let (trust, trust_time) =
            if source.predefined { (Trust::Yes, now) } else { (source.trust, source.trust_time) };
        let record = ReportFormat {
            id: 0,
            uuid: uuid.clone(),
            owner: Some(ctx.user.clone()),
            name,
            trust,
            trust_time,
            predefined: false,
            creation_time: now,
            modification_time: now,
            ..source
        };

        let parent = self.layout.active_parent(Some(&ctx.user.uuid));
        let dir = self.assets.copy_dir(&source_dir, &parent, uuid.as_str())?;
        if let Err(err) = self.finish_create(tx, &record, None, &[]) {
            self.remove_best_effort(&dir, "copy rolled back");
            return Err(err);
        }
        tracing::info!(uuid = %uuid, source = source_uuid, owner = %ctx.user.uuid, "report format copied");
        Ok(uuid)
    }

    // ------------------------------------------------------------------------
    // Modify
    // ------------------------------------------------------------------------

    /// Modifies metadata and at most one param value.
    ///
    /// Name, summary, and the active flag of predefined report formats are
    /// managed by the feed and refused here.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the target or param is missing, the
    /// value is invalid, or access is refused.
    pub fn modify(&self, ctx: &RequestContext<'_>, uuid: &str, request: &ModifyRequest) -> RegistryResult<()> {
        authorize(ctx, Action::ModifyReportFormat, Some(&ResourceUuid::new(uuid)))?;
        let tx = self.store.begin().or_internal("modify")?;
        let format = tx
            .find_report_format(uuid)
            .or_internal("modify")?
            .ok_or_else(|| RegistryError::report_format_not_found(uuid))?;
        let update = ReportFormatUpdate {
            name: request.name.clone(),
            summary: request.summary.clone(),
            active: request.active,
        };
        if format.predefined && !update.is_empty() {
            return Err(RegistryError::NotAuthorized(
                "predefined report formats are managed by the feed".to_string(),
            ));
        }
        let now = unix_now();
        if let Some(change) = &request.param {
            let param = format
                .params
                .iter()
                .find(|param| param.name == change.name)
                .ok_or_else(|| RegistryError::ParamNotFound(change.name.clone()))?;
            param.validate(ValidationTarget::Value, &change.value)?;
            if !tx.set_param_value(format.id, &change.name, &change.value, now).or_internal("modify")? {
                return Err(RegistryError::ParamNotFound(change.name.clone()));
            }
        }
        if !update.is_empty() {
            tx.update_report_format(format.id, &update, now).or_internal("modify")?;
        }
        tx.commit().or_internal("modify")?;
        tracing::info!(uuid, owner = %ctx.user.uuid, "report format modified");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    /// Moves an active report format to the trash, or deletes it ultimately
    /// from the active table or the trash.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InUse`] when an alert references the target,
    /// [`RegistryError::NotFound`] when it does not exist (a trashed target
    /// is only found with `ultimate`), or other failures.
    pub fn delete(&self, ctx: &RequestContext<'_>, uuid: &str, ultimate: bool) -> RegistryResult<()> {
        authorize(ctx, Action::DeleteReportFormat, Some(&ResourceUuid::new(uuid)))?;
        let tx = self.store.begin().or_internal("delete")?;
        if let Some(format) = tx.find_report_format(uuid).or_internal("delete")? {
            if tx.report_format_in_use(uuid).or_internal("delete")? {
                return Err(RegistryError::InUse);
            }
            let active_dir = self.layout.active_dir(format.owner_uuid(), uuid);
            if ultimate {
                tx.delete_report_format(Location::Active, format.id).or_internal("delete")?;
                tx.commit().or_internal("delete")?;
                self.remove_best_effort(&active_dir, "ultimate delete");
                self.signatures.remove_link(uuid);
                tracing::info!(uuid, "report format deleted ultimately");
                return Ok(());
            }
            let trash_uuid =
                if format.predefined { format.uuid.clone() } else { ResourceUuid::generate() };
            let trash_id = tx.move_to_trash(&format, trash_uuid.as_str()).or_internal("delete")?;
            let trash_dir = self.layout.trash_dir(trash_id);
            self.clear_orphan(&trash_dir)?;
            self.assets.move_dir(&active_dir, &trash_dir)?;
            if let Err(err) = tx.commit().or_internal("delete") {
                self.move_back(&trash_dir, &active_dir);
                return Err(err);
            }
            tracing::info!(uuid, trash_uuid = %trash_uuid, "report format moved to trash");
            return Ok(());
        }

        let trashed = match tx.find_trashed_report_format(uuid).or_internal("delete")? {
            Some(trashed) if ultimate => trashed,
            _ => return Err(RegistryError::report_format_not_found(uuid)),
        };
        if tx.trash_report_format_in_use(uuid).or_internal("delete")? {
            return Err(RegistryError::InUse);
        }
        tx.delete_report_format(Location::Trash, trashed.format.id).or_internal("delete")?;
        tx.commit().or_internal("delete")?;
        self.remove_best_effort(&self.layout.trash_dir(trashed.format.id), "trash delete");
        self.signatures.remove_link(trashed.original_uuid.as_str());
        tracing::info!(uuid, "trashed report format deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------------

    /// Restores a trashed report format under its original uuid.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NameCollision`] or
    /// [`RegistryError::UuidCollision`] when an active report format already
    /// holds the name (per owner) or the original uuid.
    pub fn restore(&self, ctx: &RequestContext<'_>, uuid: &str) -> RegistryResult<()> {
        authorize(ctx, Action::RestoreReportFormat, Some(&ResourceUuid::new(uuid)))?;
        let tx = self.store.begin().or_internal("restore")?;
        let trashed = tx
            .find_trashed_report_format(uuid)
            .or_internal("restore")?
            .ok_or_else(|| RegistryError::report_format_not_found(uuid))?;
        let owner_id = trashed.format.owner.as_ref().map(|owner| owner.id);
        if tx.name_taken(&trashed.format.name, owner_id).or_internal("restore")? {
            return Err(RegistryError::NameCollision);
        }
        let original = trashed.original_uuid.as_str();
        if tx.active_uuid_exists(original).or_internal("restore")? {
            return Err(RegistryError::UuidCollision);
        }
        tx.restore_from_trash(&trashed).or_internal("restore")?;
        let trash_dir = self.layout.trash_dir(trashed.format.id);
        let active_dir = self.layout.active_dir(trashed.format.owner_uuid(), original);
        self.clear_orphan(&active_dir)?;
        self.assets.move_dir(&trash_dir, &active_dir)?;
        if let Err(err) = tx.commit().or_internal("restore") {
            self.move_back(&active_dir, &trash_dir);
            return Err(err);
        }
        tracing::info!(trash_uuid = uuid, uuid = original, "report format restored");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Verify
    // ------------------------------------------------------------------------

    /// Re-verifies the signature of a stored report format and records the
    /// verdict.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the target is missing, access is
    /// refused, or its files cannot be read.
    pub fn verify(&self, ctx: &RequestContext<'_>, uuid: &str) -> RegistryResult<Trust> {
        authorize(ctx, Action::VerifyReportFormat, Some(&ResourceUuid::new(uuid)))?;
        let format = self.load_active(uuid, "verify")?;
        let files = self.assets.read_files(&self.layout.active_dir(format.owner_uuid(), uuid))?;
        let stored = format.signature.trim();
        let signature = if stored.is_empty() {
            self.signatures.find(uuid)?.map(|found| (found.identity_uuid, found.bytes))
        } else {
            Some((uuid.to_string(), stored.as_bytes().to_vec()))
        };
        let trust = signature.map_or(Trust::Unknown, |(identity, bytes)| {
            let canonical = canonical_string(
                &identity,
                &format.extension,
                &format.content_type,
                format.predefined,
                &files,
                &format.params,
            );
            self.verifier.verify(&canonical, &bytes)
        });

        let tx = self.store.begin().or_internal("verify")?;
        if !tx.active_uuid_exists(uuid).or_internal("verify")? {
            return Err(RegistryError::report_format_not_found(uuid));
        }
        tx.set_trust(format.id, trust, unix_now()).or_internal("verify")?;
        tx.commit().or_internal("verify")?;
        tracing::info!(uuid, trust = %trust, "report format signature verified");
        Ok(trust)
    }

    // ------------------------------------------------------------------------
    // Apply
    // ------------------------------------------------------------------------

    /// Renders `report_xml` with the report format's `generate` script.
    ///
    /// Returns `None` when the report format has no script.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Inactive`] for inactive report formats and
    /// [`RegistryError::Integrity`] when rendering fails.
    pub fn apply(
        &self,
        ctx: &RequestContext<'_>,
        uuid: &str,
        report_xml: &[u8],
        scratch_dir: &Path,
    ) -> RegistryResult<Option<PathBuf>> {
        authorize(ctx, Action::GetReportFormats, Some(&ResourceUuid::new(uuid)))?;
        let format = self.load_active(uuid, "apply")?;
        if !format.is_active() {
            return Err(RegistryError::Inactive);
        }
        let working_dir = self.layout.active_dir(format.owner_uuid(), uuid);
        let script = working_dir.join(GENERATE_SCRIPT);
        if !script.is_file() {
            return Ok(None);
        }
        fs::create_dir_all(scratch_dir).map_err(|err| RegistryError::Integrity(err.to_string()))?;
        let report_path = scratch_dir.join(REPORT_INPUT_NAME);
        fs::write(&report_path, report_xml).map_err(|err| RegistryError::Integrity(err.to_string()))?;
        let output_name = if format.extension.is_empty() {
            "report".to_string()
        } else {
            format!("report.{}", format.extension)
        };
        let request = RenderRequest {
            script,
            working_dir,
            report_path,
            output_path: scratch_dir.join(output_name),
        };
        match self.renderer.render(&request) {
            Ok(output) => {
                tracing::info!(uuid, output = %output.display(), "report rendered");
                Ok(Some(output))
            }
            Err(err) => {
                tracing::error!(uuid, error = %err, "report rendering failed");
                Err(RegistryError::Integrity(err.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Trash
    // ------------------------------------------------------------------------

    /// Deletes every trashed report format of the acting user that no
    /// trashed alert references. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when access is refused or a store step fails.
    pub fn empty_trash(&self, ctx: &RequestContext<'_>) -> RegistryResult<usize> {
        authorize(ctx, Action::EmptyTrashcan, None)?;
        let tx = self.store.begin().or_internal("empty_trash")?;
        let mut removed = Vec::new();
        for trashed in tx.list_trashed_report_formats(Some(ctx.user.id)).or_internal("empty_trash")? {
            if tx.trash_report_format_in_use(trashed.format.uuid.as_str()).or_internal("empty_trash")? {
                tracing::debug!(uuid = %trashed.format.uuid, "trashed report format in use; kept");
                continue;
            }
            tx.delete_report_format(Location::Trash, trashed.format.id).or_internal("empty_trash")?;
            removed.push((self.layout.trash_dir(trashed.format.id), trashed.original_uuid));
        }
        tx.commit().or_internal("empty_trash")?;
        for (dir, original_uuid) in &removed {
            self.remove_best_effort(dir, "empty trash");
            self.signatures.remove_link(original_uuid.as_str());
        }
        tracing::info!(owner = %ctx.user.uuid, removed = removed.len(), "trash emptied");
        Ok(removed.len())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Returns an active report format with its params.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when missing or access is refused.
    pub fn get(&self, ctx: &RequestContext<'_>, uuid: &str) -> RegistryResult<ReportFormat> {
        authorize(ctx, Action::GetReportFormats, Some(&ResourceUuid::new(uuid)))?;
        self.load_active(uuid, "get")
    }

    /// Returns a trashed report format with its params.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when missing or access is refused.
    pub fn get_trashed(&self, ctx: &RequestContext<'_>, uuid: &str) -> RegistryResult<TrashedReportFormat> {
        authorize(ctx, Action::GetReportFormats, Some(&ResourceUuid::new(uuid)))?;
        let tx = self.store.begin_read().or_internal("get")?;
        tx.find_trashed_report_format(uuid)
            .or_internal("get")?
            .ok_or_else(|| RegistryError::report_format_not_found(uuid))
    }

    /// Lists active report formats the acting user may read.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the store fails.
    pub fn list(&self, ctx: &RequestContext<'_>) -> RegistryResult<Vec<ReportFormat>> {
        let tx = self.store.begin_read().or_internal("list")?;
        let formats = tx.list_report_formats().or_internal("list")?;
        Ok(formats.into_iter().filter(|format| ctx.may(Action::GetReportFormats, Some(&format.uuid))).collect())
    }

    /// Lists trashed report formats owned by the acting user.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the store fails.
    pub fn list_trash(&self, ctx: &RequestContext<'_>) -> RegistryResult<Vec<TrashedReportFormat>> {
        let tx = self.store.begin_read().or_internal("list")?;
        let trashed = tx.list_trashed_report_formats(Some(ctx.user.id)).or_internal("list")?;
        Ok(trashed
            .into_iter()
            .filter(|trashed| ctx.may(Action::GetReportFormats, Some(&trashed.format.uuid)))
            .collect())
    }

    /// Validates a candidate value for a named param.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ParamNotFound`] or
    /// [`RegistryError::ParamValueInvalid`].
    pub fn validate_param(&self, ctx: &RequestContext<'_>, uuid: &str, name: &str, value: &str) -> RegistryResult<()> {
        let format = self.get(ctx, uuid)?;
        let param = format
            .params
            .iter()
            .find(|param| param.name == name)
            .ok_or_else(|| RegistryError::ParamNotFound(name.to_string()))?;
        param.validate(ValidationTarget::Value, value)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Loads an active report format in a read transaction.
    fn load_active(&self, uuid: &str, operation: &'static str) -> RegistryResult<ReportFormat> {
        let tx = self.store.begin_read().or_internal(operation)?;
        tx.find_report_format(uuid)
            .or_internal(operation)?
            .ok_or_else(|| RegistryError::report_format_not_found(uuid))
    }

    /// Removes a directory whose row is gone or was never committed.
    pub(crate) fn remove_best_effort(&self, dir: &Path, reason: &'static str) {
        if let Err(err) = self.assets.remove_dir(dir) {
            tracing::warn!(path = %dir.display(), reason, error = %err, "asset directory left behind");
        }
    }

    /// Removes a directory left at a move destination that no row
    /// references, such as one a failed best-effort removal kept.
    pub(crate) fn clear_orphan(&self, dir: &Path) -> RegistryResult<()> {
        if fs::symlink_metadata(dir).is_err() {
            return Ok(());
        }
        tracing::warn!(path = %dir.display(), "removing orphaned asset directory");
        self.assets.remove_dir(dir)?;
        Ok(())
    }

    /// Undoes a directory move after a failed commit.
    pub(crate) fn move_back(&self, moved_to: &Path, original: &Path) {
        if let Err(err) = self.assets.move_dir(moved_to, original) {
            tracing::error!(
                from = %moved_to.display(),
                to = %original.display(),
                error = %err,
                "failed to move asset directory back after rollback"
            );
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps store failures to generic internal errors, logging the detail.
pub(crate) trait StoreResultExt<T> {
    /// Converts the error, logging it with the operation name.
    fn or_internal(self, operation: &'static str) -> RegistryResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, SqliteStoreError> {
    fn or_internal(self, operation: &'static str) -> RegistryResult<T> {
        self.map_err(|err| {
            tracing::error!(operation, error = %err, "resource store failure");
            RegistryError::from(err)
        })
    }
}

/// Refuses the request unless the oracle allows `action`.
fn authorize(ctx: &RequestContext<'_>, action: Action, resource: Option<&ResourceUuid>) -> RegistryResult<()> {
    if ctx.may(action, resource) {
        Ok(())
    } else {
        tracing::debug!(user = %ctx.user.uuid, action = action.as_str(), "permission denied");
        Err(RegistryError::NotAuthorized(action.as_str().to_string()))
    }
}

/// Current time in unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
