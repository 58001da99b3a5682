// crates/report-registry-engine/tests/common/mod.rs
// =============================================================================
// Module: Engine Test Helpers
// Description: Registry harness, fake capabilities, and fault injection.
// Purpose: Reduce duplication across engine integration tests.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use report_registry_core::AssetFile;
use report_registry_core::NewParam;
use report_registry_core::NewReportFormat;
use report_registry_core::PermitAll;
use report_registry_core::RenderError;
use report_registry_core::RenderRequest;
use report_registry_core::ReportRenderer;
use report_registry_core::RequestContext;
use report_registry_core::SignatureVerifier;
use report_registry_core::SignedFile;
use report_registry_core::Trust;
use report_registry_core::UserRef;
use report_registry_engine::AssetError;
use report_registry_engine::AssetLayout;
use report_registry_engine::AssetStore;
use report_registry_engine::FsAssetStore;
use report_registry_engine::ReportFormatRegistry;
use report_registry_engine::SignatureDirectory;
use report_registry_store_sqlite::SqliteResourceStore;
use report_registry_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Verifier returning a fixed verdict and recording its inputs.
pub struct FakeVerifier {
    pub verdict: Trust,
    pub calls: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl FakeVerifier {
    pub fn new(verdict: Trust) -> Self {
        Self {
            verdict,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SignatureVerifier for FakeVerifier {
    fn verify(&self, content: &[u8], signature: &[u8]) -> Trust {
        self.calls.lock().unwrap().push((content.to_vec(), signature.to_vec()));
        self.verdict
    }
}

/// Renderer that copies the report to the output and records requests.
#[derive(Default)]
pub struct FakeRenderer {
    pub requests: Mutex<Vec<RenderRequest>>,
}

impl ReportRenderer for FakeRenderer {
    fn render(&self, request: &RenderRequest) -> Result<PathBuf, RenderError> {
        self.requests.lock().unwrap().push(request.clone());
        fs::copy(&request.report_path, &request.output_path)
            .map_err(|err| RenderError::Io(err.to_string()))?;
        Ok(request.output_path.clone())
    }
}

/// Asset operation to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Nothing,
    Create,
    Copy,
    Move,
    /// Only the n-th move from now (1-based).
    NthMove(usize),
}

/// Asset store that fails one operation on demand.
pub struct FailingAssets {
    inner: FsAssetStore,
    fail_on: Mutex<FailOn>,
    moves: Mutex<usize>,
}

impl FailingAssets {
    pub fn new() -> Self {
        Self {
            inner: FsAssetStore,
            fail_on: Mutex::new(FailOn::Nothing),
            moves: Mutex::new(0),
        }
    }

    pub fn fail_on(&self, operation: FailOn) {
        *self.fail_on.lock().unwrap() = operation;
        *self.moves.lock().unwrap() = 0;
    }

    fn check(&self, operation: FailOn) -> Result<(), AssetError> {
        let armed = *self.fail_on.lock().unwrap();
        let nth_move = operation == FailOn::Move && {
            let mut moves = self.moves.lock().unwrap();
            *moves += 1;
            armed == FailOn::NthMove(*moves)
        };
        if armed == operation || nth_move {
            return Err(AssetError::Io {
                path: "injected".to_string(),
                message: format!("injected {operation:?} failure"),
            });
        }
        Ok(())
    }
}

impl AssetStore for FailingAssets {
    fn create_or_replace_dir(&self, parent: &Path, key: &str, files: &[AssetFile]) -> Result<PathBuf, AssetError> {
        self.check(FailOn::Create)?;
        self.inner.create_or_replace_dir(parent, key, files)
    }

    fn copy_dir(&self, source: &Path, dest_parent: &Path, dest_key: &str) -> Result<PathBuf, AssetError> {
        self.check(FailOn::Copy)?;
        self.inner.copy_dir(source, dest_parent, dest_key)
    }

    fn move_dir(&self, source: &Path, dest: &Path) -> Result<(), AssetError> {
        self.check(FailOn::Move)?;
        self.inner.move_dir(source, dest)
    }

    fn remove_dir(&self, dir: &Path) -> Result<(), AssetError> {
        self.inner.remove_dir(dir)
    }

    fn read_files(&self, dir: &Path) -> Result<Vec<SignedFile>, AssetError> {
        self.inner.read_files(dir)
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Registry wired to fakes inside a temporary state directory.
pub struct Harness {
    pub dir: TempDir,
    pub registry: ReportFormatRegistry,
    pub owner: UserRef,
    pub verifier: Arc<FakeVerifier>,
    pub renderer: Arc<FakeRenderer>,
    pub assets: Arc<FailingAssets>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_verdict(Trust::Yes)
    }

    pub fn with_verdict(verdict: Trust) -> Self {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        let store = Arc::new(
            SqliteResourceStore::open(SqliteStoreConfig::for_path(state.join("registry.db"))).unwrap(),
        );
        let owner = {
            let tx = store.begin().unwrap();
            let owner = tx.insert_user("0f000000-0000-4000-8000-000000000001", "admin").unwrap();
            tx.commit().unwrap();
            owner
        };
        let layout = AssetLayout::new(&state);
        let signatures = SignatureDirectory::new(Some(dir.path().join("feed_signatures")), layout.signatures_dir());
        let verifier = Arc::new(FakeVerifier::new(verdict));
        let renderer = Arc::new(FakeRenderer::default());
        let assets = Arc::new(FailingAssets::new());
        let registry = ReportFormatRegistry::new(store, layout, signatures, verifier.clone(), renderer.clone())
            .with_asset_store(assets.clone());
        Self {
            dir,
            registry,
            owner,
            verifier,
            renderer,
            assets,
        }
    }

    pub fn ctx(&self) -> RequestContext<'_> {
        RequestContext::new(&self.owner, &PermitAll)
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("state").join("registry.db")
    }

    pub fn feed_signatures(&self) -> PathBuf {
        self.dir.path().join("feed_signatures")
    }

    pub fn active_dir(&self, uuid: &str) -> PathBuf {
        self.registry.layout().active_dir(Some(&self.owner.uuid), uuid)
    }

    /// Opens a second connection for triggers and direct edits.
    pub fn side_connection(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(self.db_path()).unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        self.side_connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    pub fn mark_predefined(&self, uuid: &str) {
        self.side_connection()
            .execute("UPDATE report_formats SET predefined = 1 WHERE uuid = ?1", [uuid])
            .unwrap();
    }
}

// ============================================================================
// SECTION: Store Faults
// ============================================================================

/// Makes every `event` (`INSERT` or `UPDATE`) on `table` abort its statement.
pub fn abort_writes_to(harness: &Harness, event: &str, table: &str) {
    let name = format!("abort_{}_{table}", event.to_lowercase());
    harness
        .side_connection()
        .execute_batch(&format!(
            "CREATE TRIGGER {name} BEFORE {event} ON {table} BEGIN SELECT RAISE(ABORT, 'injected'); END;"
        ))
        .unwrap();
}

/// Makes the commit after an `event` on `table` fail on a deferred foreign
/// key; the statement itself succeeds.
pub fn fail_commit_after_write_to(harness: &Harness, event: &str, table: &str) {
    let name = format!("guard_{}_{table}", event.to_lowercase());
    harness
        .side_connection()
        .execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS commit_guard (\
                 user_ref INTEGER REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED);\
             CREATE TRIGGER {name} AFTER {event} ON {table} \
             BEGIN INSERT INTO commit_guard (user_ref) VALUES (-1); END;"
        ))
        .unwrap();
}

// ============================================================================
// SECTION: Requests
// ============================================================================

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn file(name: &str, contents: &[u8]) -> AssetFile {
    AssetFile {
        name: name.to_string(),
        content_base64: encode(contents),
    }
}

pub fn param(name: &str, type_name: &str, fallback: &str) -> NewParam {
    NewParam {
        name: name.to_string(),
        type_name: Some(type_name.to_string()),
        value: None,
        fallback: Some(fallback.to_string()),
        min: None,
        max: None,
        options: Vec::new(),
    }
}

pub fn sample_request(uuid: Option<&str>, name: &str) -> NewReportFormat {
    let mut rows = param("Rows", "integer", "3");
    rows.min = Some("0".to_string());
    rows.max = Some("10".to_string());
    let mut mode = param("Mode", "selection", "brief");
    mode.options = vec!["brief".to_string(), "full".to_string()];
    NewReportFormat {
        uuid: uuid.map(str::to_string),
        name: name.to_string(),
        content_type: "text/plain".to_string(),
        extension: "txt".to_string(),
        summary: "Plain text".to_string(),
        description: "Renders reports as text.".to_string(),
        files: vec![file("generate", b"#!/bin/sh\ncat \"$1\"\n"), file("template.txt", b"header\n")],
        params: vec![rows, mode],
        signature: None,
    }
}
