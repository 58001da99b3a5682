// crates/report-registry-config/src/authorization.rs
// ============================================================================
// Module: Authorization Oracles
// Description: Configured yes/no oracles for lifecycle requests.
// Purpose: Provide swappable, fail-closed authorization decisions.
// Dependencies: report-registry-core, serde
// ============================================================================

//! ## Overview
//! The registry asks a single question of its oracle: may this user perform
//! this action, optionally on this resource. Configuration selects one of
//! three oracles: permit everything, deny everything, or a static table of
//! user uuids to granted actions. Static tables deny anything not listed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use report_registry_core::Action;
use report_registry_core::Authorizer;
use report_registry_core::DenyAll;
use report_registry_core::PermitAll;
use report_registry_core::ResourceUuid;
use report_registry_core::UserRef;
use serde::Deserialize;

use crate::config::ConfigError;

/// Maximum number of static rules.
const MAX_RULES: usize = 256;
/// Wildcard action label granting every action.
const ALL_ACTIONS: &str = "*";

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Oracle selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// Allow every request.
    #[default]
    PermitAll,
    /// Refuse every request.
    DenyAll,
    /// Evaluate the static rule table.
    Static,
}

/// Authorization configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Oracle selection.
    #[serde(default)]
    pub mode: AuthorizationMode,
    /// Static rules; only read in `static` mode.
    #[serde(default)]
    pub rules: Vec<AuthorizationRule>,
}

/// Grants a list of actions to one user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationRule {
    /// User uuid.
    pub user: String,
    /// Permission names (e.g. `get_report_formats`), or `*`.
    pub actions: Vec<String>,
}

impl AuthorizationConfig {
    /// Validates authorization configuration.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.mode != AuthorizationMode::Static && !self.rules.is_empty() {
            return Err(ConfigError::Invalid("authorization.rules require mode = \"static\"".to_string()));
        }
        if self.rules.len() > MAX_RULES {
            return Err(ConfigError::Invalid(format!("authorization.rules exceeds {MAX_RULES} entries")));
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            if !ResourceUuid::is_well_formed(&rule.user) {
                return Err(ConfigError::Invalid(format!("authorization.rules[{idx}].user must be a uuid")));
            }
            if rule.actions.is_empty() {
                return Err(ConfigError::Invalid(format!("authorization.rules[{idx}].actions must be non-empty")));
            }
            if let Some(unknown) =
                rule.actions.iter().find(|label| label.as_str() != ALL_ACTIONS && Action::parse(label).is_none())
            {
                return Err(ConfigError::Invalid(format!(
                    "authorization.rules[{idx}] names unknown action {unknown}"
                )));
            }
        }
        Ok(())
    }

    /// Builds the configured oracle.
    #[must_use]
    pub fn build(&self) -> Arc<dyn Authorizer> {
        match self.mode {
            AuthorizationMode::PermitAll => Arc::new(PermitAll),
            AuthorizationMode::DenyAll => Arc::new(DenyAll),
            AuthorizationMode::Static => Arc::new(StaticAuthorizer::from_rules(&self.rules)),
        }
    }
}

// ============================================================================
// SECTION: Static Oracle
// ============================================================================

/// Grant set for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Grants {
    /// Every action.
    All,
    /// Listed permission names.
    Listed(BTreeSet<&'static str>),
}

/// Static user-to-actions table.
///
/// # Invariants
/// - Users and actions not in the table are refused.
/// - Decisions do not depend on the resource.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    /// Grants keyed by user uuid.
    grants: BTreeMap<String, Grants>,
}

impl StaticAuthorizer {
    /// Builds the table; repeated users accumulate grants and unknown labels
    /// are ignored.
    #[must_use]
    pub fn from_rules(rules: &[AuthorizationRule]) -> Self {
        let mut grants: BTreeMap<String, Grants> = BTreeMap::new();
        for rule in rules {
            let entry = grants.entry(rule.user.clone()).or_insert_with(|| Grants::Listed(BTreeSet::new()));
            for label in &rule.actions {
                if label == ALL_ACTIONS {
                    *entry = Grants::All;
                    continue;
                }
                let Some(action) = Action::parse(label) else {
                    continue;
                };
                if let Grants::Listed(set) = entry {
                    set.insert(action.as_str());
                }
            }
        }
        Self {
            grants,
        }
    }
}

impl Authorizer for StaticAuthorizer {
    fn user_may(&self, user: &UserRef, action: Action, _resource: Option<&ResourceUuid>) -> bool {
        match self.grants.get(&user.uuid) {
            Some(Grants::All) => true,
            Some(Grants::Listed(set)) => set.contains(action.as_str()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use report_registry_core::Action;
    use report_registry_core::Authorizer;
    use report_registry_core::UserRef;

    use super::AuthorizationRule;
    use super::StaticAuthorizer;

    const ADMIN: &str = "0a000000-0000-4000-8000-000000000001";
    const READER: &str = "0a000000-0000-4000-8000-000000000002";

    fn user(uuid: &str) -> UserRef {
        UserRef {
            id: 1,
            uuid: uuid.to_string(),
            name: "someone".to_string(),
        }
    }

    #[test]
    fn static_table_grants_only_listed_actions() {
        let oracle = StaticAuthorizer::from_rules(&[
            AuthorizationRule {
                user: ADMIN.to_string(),
                actions: vec!["*".to_string()],
            },
            AuthorizationRule {
                user: READER.to_string(),
                actions: vec!["get_report_formats".to_string()],
            },
            AuthorizationRule {
                user: READER.to_string(),
                actions: vec!["verify_report_format".to_string()],
            },
        ]);
        assert!(oracle.user_may(&user(ADMIN), Action::EmptyTrashcan, None));
        assert!(oracle.user_may(&user(READER), Action::GetReportFormats, None));
        assert!(oracle.user_may(&user(READER), Action::VerifyReportFormat, None));
        assert!(!oracle.user_may(&user(READER), Action::DeleteReportFormat, None));
        assert!(!oracle.user_may(&user("0a000000-0000-4000-8000-000000000003"), Action::GetReportFormats, None));
    }
}
