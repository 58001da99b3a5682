// crates/report-registry-engine/src/verifier.rs
// ============================================================================
// Module: Process Signature Verifier
// Description: Detached signature checks through an external program.
// Purpose: Map a keyring check to a trust verdict without hard failures.
// Dependencies: report-registry-core, tempfile, tracing
// ============================================================================

//! ## Overview
//! The canonical bytes and the signature are written to private temporary
//! files that are removed when they go out of scope, on every exit path. The
//! checker runs as `<program> --keyring <keyring> --quiet <sig> <data>` with
//! no inherited standard streams. Exit status 0 is trusted, 1 is rejected,
//! anything else (including a failure to start) is unknown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use report_registry_core::SignatureVerifier;
use report_registry_core::Trust;
use tempfile::NamedTempFile;

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Signature verifier backed by an external checker such as `gpgv`.
///
/// # Invariants
/// - Never returns an error; failures yield [`Trust::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSignatureVerifier {
    /// Checker executable.
    program: PathBuf,
    /// Trusted keyring path.
    keyring: PathBuf,
}

impl ProcessSignatureVerifier {
    /// Builds a verifier for `program` and `keyring`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, keyring: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            keyring: keyring.into(),
        }
    }

    /// Runs the checker, returning its exit code (`None` when signalled).
    fn run(&self, content: &[u8], signature: &[u8]) -> io::Result<Option<i32>> {
        let data_file = scoped_file(content)?;
        let signature_file = scoped_file(signature)?;
        let status = Command::new(&self.program)
            .arg("--keyring")
            .arg(&self.keyring)
            .arg("--quiet")
            .arg(signature_file.path())
            .arg(data_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.code())
    }
}

impl SignatureVerifier for ProcessSignatureVerifier {
    fn verify(&self, content: &[u8], signature: &[u8]) -> Trust {
        match self.run(content, signature) {
            Ok(code) => {
                let trust = Trust::from_verifier_exit(code);
                tracing::debug!(?code, %trust, "signature check finished");
                trust
            }
            Err(err) => {
                tracing::warn!(
                    program = %self.program.display(),
                    error = %err,
                    "signature check could not run"
                );
                Trust::Unknown
            }
        }
    }
}

/// Writes `bytes` to a temporary file removed on drop.
fn scoped_file(bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}
