// crates/report-registry-config/src/lib.rs
// ============================================================================
// Module: Report Registry Config Library
// Description: Canonical config model, validation, and authorization oracles.
// Purpose: Single source of truth for report-registry.toml semantics.
// Dependencies: report-registry-core, report-registry-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `report-registry-config` defines the configuration model for the report
//! registry. It provides strict, fail-closed validation and builds the
//! configured authorization oracle.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod authorization;
pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authorization::AuthorizationConfig;
pub use authorization::AuthorizationMode;
pub use authorization::AuthorizationRule;
pub use authorization::StaticAuthorizer;
pub use config::ConfigError;
pub use config::FeedSection;
pub use config::LoggingConfig;
pub use config::RegistryConfig;
pub use config::RenderConfig;
pub use config::SignaturesConfig;
pub use config::StoreConfig;
pub use examples::config_toml_example;
