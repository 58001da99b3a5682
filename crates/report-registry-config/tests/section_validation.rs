//! Config section validation tests for report-registry-config.
// crates/report-registry-config/tests/section_validation.rs
// =============================================================================
// Module: Config Section Validation Tests
// Description: Validate feed, render, store, and authorization sections.
// Purpose: Ensure inconsistent sections fail closed with a named field.
// =============================================================================

use std::sync::Arc;

use report_registry_config::ConfigError;
use report_registry_config::RegistryConfig;
use report_registry_core::Action;
use report_registry_core::Authorizer;
use report_registry_core::UserRef;

type TestResult = Result<(), String>;

const OWNER: &str = "6d9cde2a-3b6e-4c31-9d0e-1f2a3b4c5d6e";

fn assert_invalid(toml: &str, needle: &str) -> TestResult {
    match RegistryConfig::from_toml(toml) {
        Err(ConfigError::Invalid(message)) if message.contains(needle) => Ok(()),
        other => Err(format!("expected invalid config naming {needle}, got {other:?}")),
    }
}

fn build_oracle(toml: &str) -> Result<Arc<dyn Authorizer>, String> {
    RegistryConfig::from_toml(toml).map(|config| config.authorization.build()).map_err(|err| err.to_string())
}

fn owner() -> UserRef {
    UserRef {
        id: 7,
        uuid: OWNER.to_string(),
        name: "feed".to_string(),
    }
}

#[test]
fn feed_requires_uuids_and_positive_interval() -> TestResult {
    assert_invalid(
        "state_dir = \"/srv\"\n[feed]\ndir = \"/srv/feed\"\nowner_uuid = \"admin\"\n",
        "feed.owner_uuid",
    )?;
    assert_invalid(
        "state_dir = \"/srv\"\n[feed]\ndir = \"/srv/feed\"\nimport_roles = [\"observer\"]\n",
        "feed.import_roles[0]",
    )?;
    assert_invalid(
        "state_dir = \"/srv\"\n[feed]\ndir = \"/srv/feed\"\nsync_interval_secs = 0\n",
        "feed.sync_interval_secs",
    )?;
    assert_invalid("state_dir = \"/srv\"\n[feed]\ndir = \"  \"\n", "feed.dir")
}

#[test]
fn render_ids_are_set_together() -> TestResult {
    assert_invalid("state_dir = \"/srv\"\n[render]\nrun_as_uid = 65534\n", "render.run_as_uid")?;
    let config = RegistryConfig::from_toml("state_dir = \"/srv\"\n[render]\nrun_as_uid = 1\nrun_as_gid = 2\n")
        .map_err(|err| err.to_string())?;
    if config.render.run_as() != Some((1, 2)) {
        return Err("run_as should pair uid and gid".to_string());
    }
    Ok(())
}

#[test]
fn store_rejects_excessive_busy_timeout() -> TestResult {
    assert_invalid("state_dir = \"/srv\"\n[store]\nbusy_timeout_ms = 600001\n", "store.busy_timeout_ms")?;
    match RegistryConfig::from_toml("state_dir = \"/srv\"\n[store]\njournal_mode = \"memory\"\n") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error for journal mode, got {other:?}")),
    }
}

#[test]
fn authorization_rules_are_checked() -> TestResult {
    assert_invalid(
        &format!(
            "state_dir = \"/srv\"\n[authorization]\nmode = \"permit_all\"\n\
             [[authorization.rules]]\nuser = \"{OWNER}\"\nactions = [\"*\"]\n"
        ),
        "mode = \"static\"",
    )?;
    assert_invalid(
        &format!(
            "state_dir = \"/srv\"\n[authorization]\nmode = \"static\"\n\
             [[authorization.rules]]\nuser = \"{OWNER}\"\nactions = [\"launch\"]\n"
        ),
        "unknown action launch",
    )?;
    assert_invalid(
        "state_dir = \"/srv\"\n[authorization]\nmode = \"static\"\n\
         [[authorization.rules]]\nuser = \"admin\"\nactions = [\"*\"]\n",
        "authorization.rules[0].user",
    )
}

#[test]
fn configured_oracles_decide_as_selected() -> TestResult {
    let permit = build_oracle("state_dir = \"/srv\"\n")?;
    if !permit.user_may(&owner(), Action::EmptyTrashcan, None) {
        return Err("default oracle should permit".to_string());
    }
    let deny = build_oracle("state_dir = \"/srv\"\n[authorization]\nmode = \"deny_all\"\n")?;
    if deny.user_may(&owner(), Action::GetReportFormats, None) {
        return Err("deny_all should refuse".to_string());
    }
    let table = build_oracle(&format!(
        "state_dir = \"/srv\"\n[authorization]\nmode = \"static\"\n\
         [[authorization.rules]]\nuser = \"{OWNER}\"\nactions = [\"get_report_formats\", \"restore\"]\n"
    ))?;
    if !table.user_may(&owner(), Action::RestoreReportFormat, None) {
        return Err("static table should grant restore".to_string());
    }
    if table.user_may(&owner(), Action::DeleteReportFormat, None) {
        return Err("static table should refuse unlisted actions".to_string());
    }
    Ok(())
}
