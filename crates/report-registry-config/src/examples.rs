// crates/report-registry-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic starting point for operators and tests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `report-registry.toml`. The example must always load
//! through [`crate::RegistryConfig::from_toml`].

/// Returns a canonical example `report-registry.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"state_dir = "/var/lib/report-registry"

[store]
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[feed]
dir = "/var/lib/report-registry/feed"
owner_uuid = "6d9cde2a-3b6e-4c31-9d0e-1f2a3b4c5d6e"
import_roles = ["7a8cb5b4-b74d-11e2-8187-406186ea4fc5"]
sync_interval_secs = 600

[signatures]
verifier_program = "gpgv"
keyring = "/var/lib/report-registry/keyring.gpg"

[render]
# run_as_uid = 65534
# run_as_gid = 65534

[authorization]
mode = "static"

[[authorization.rules]]
user = "6d9cde2a-3b6e-4c31-9d0e-1f2a3b4c5d6e"
actions = ["*"]

[logging]
filter = "report_registry=info"
"#,
    )
}
