// crates/report-registry-engine/src/renderer.rs
// ============================================================================
// Module: Script Renderer
// Description: Runs a report format's `generate` script.
// Purpose: Produce a report file from report XML, optionally unprivileged.
// Dependencies: report-registry-core
// ============================================================================

//! ## Overview
//! The script runs inside its asset directory with the report XML path as its
//! only argument; its standard output becomes the generated file. When a
//! uid/gid pair is configured the child switches to it before `exec`. The
//! caller blocks until the script exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use report_registry_core::RenderError;
use report_registry_core::RenderRequest;
use report_registry_core::ReportRenderer;

// ============================================================================
// SECTION: Renderer
// ============================================================================

/// Renderer that executes the `generate` script directly.
///
/// # Invariants
/// - `run_as` is applied to the child only; the parent keeps its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptRenderer {
    /// Optional `(uid, gid)` to switch to before running the script.
    run_as: Option<(u32, u32)>,
}

impl ScriptRenderer {
    /// Builds a renderer that keeps the current identity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            run_as: None,
        }
    }

    /// Builds a renderer that drops to `uid`/`gid` in the child.
    #[must_use]
    pub const fn run_as(uid: u32, gid: u32) -> Self {
        Self {
            run_as: Some((uid, gid)),
        }
    }
}

impl ReportRenderer for ScriptRenderer {
    fn render(&self, request: &RenderRequest) -> Result<PathBuf, RenderError> {
        let output = File::create(&request.output_path).map_err(|err| RenderError::Io(err.to_string()))?;
        let mut command = Command::new(&request.script);
        command
            .arg(&request.report_path)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::null());
        if let Some((uid, gid)) = self.run_as {
            command.gid(gid).uid(uid);
        }
        let mut child = command.spawn().map_err(|err| RenderError::Spawn(err.to_string()))?;
        let status = child.wait().map_err(|err| RenderError::Wait(err.to_string()))?;
        if !status.success() {
            return Err(RenderError::Failed(status.to_string()));
        }
        Ok(request.output_path.clone())
    }
}
