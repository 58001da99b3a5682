// crates/report-registry-core/tests/param_validation.rs
// ============================================================================
// Module: Param Type Validation Tests
// Description: Validation table for every report format param type.
// Purpose: Pin value/default validation and request error attribution.
// ============================================================================

//! ## Overview
//! Table-driven checks for the param type system:
//! - Integer range checks (rejected, never clamped)
//! - String/text character-length bounds
//! - Selection membership and report format list grammar
//! - Request errors mapped to distinct registry outcomes

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use report_registry_core::NewParam;
use report_registry_core::ParamBounds;
use report_registry_core::ParamDefinition;
use report_registry_core::ParamType;
use report_registry_core::RegistryError;
use report_registry_core::ValidationTarget;
use report_registry_core::params::definitions_from_requests;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn definition(param_type: ParamType, min: Option<i64>, max: Option<i64>) -> ParamDefinition {
    ParamDefinition {
        name: "p".to_string(),
        param_type,
        value: String::new(),
        fallback: String::new(),
        bounds: ParamBounds::new(min, max).expect("bounds"),
        options: Vec::new(),
    }
}

fn request(type_name: &str, fallback: &str) -> NewParam {
    NewParam {
        name: "p".to_string(),
        type_name: Some(type_name.to_string()),
        value: None,
        fallback: Some(fallback.to_string()),
        min: None,
        max: None,
        options: Vec::new(),
    }
}

// ============================================================================
// SECTION: Validation Table
// ============================================================================

#[test]
fn integer_values_are_range_checked() {
    let param = definition(ParamType::Integer, Some(0), Some(10));
    assert!(param.accepts("5"));
    assert!(param.accepts("0"));
    assert!(param.accepts("10"));
    assert!(!param.accepts("11"));
    assert!(!param.accepts("-1"));
    assert!(!param.accepts("five"));
}

#[test]
fn string_lengths_count_characters() {
    let param = definition(ParamType::String, Some(1), Some(4));
    assert!(!param.accepts(""));
    assert!(param.accepts("ab"));
    assert!(param.accepts("äöüß"));
    assert!(!param.accepts("abcde"));
    let text = definition(ParamType::Text, None, Some(2));
    assert!(text.accepts(""));
    assert!(!text.accepts("abc"));
}

#[test]
fn selection_requires_registered_option() {
    let mut param = definition(ParamType::Selection, None, None);
    param.options = vec!["a".to_string(), "b".to_string()];
    assert!(param.accepts("a"));
    assert!(!param.accepts("c"));
    assert!(!param.accepts("A"));
}

#[test]
fn report_format_list_tokens() {
    let param = definition(ParamType::ReportFormatList, None, None);
    assert!(param.accepts("a,b,c"));
    assert!(param.accepts(""));
    assert!(!param.accepts("a,,b"));
}

#[test]
fn boolean_accepts_anything() {
    let param = definition(ParamType::Boolean, None, None);
    assert!(param.accepts("0"));
    assert!(param.accepts("yes"));
}

// ============================================================================
// SECTION: Request Errors
// ============================================================================

#[test]
fn value_and_default_failures_are_distinguished() {
    let mut bad_default = request("integer", "20");
    bad_default.max = Some("10".to_string());
    let error = ParamDefinition::from_request(&bad_default).unwrap_err();
    assert_eq!(RegistryError::from(error), RegistryError::ParamDefaultInvalid("p".to_string()));

    let mut bad_value = request("integer", "2");
    bad_value.max = Some("10".to_string());
    bad_value.value = Some("20".to_string());
    let failed = ParamDefinition::from_request(&bad_value).unwrap_err();
    assert_eq!(RegistryError::from(failed), RegistryError::ParamValueInvalid("p".to_string()));

    let param = ParamDefinition::from_request(&request("integer", "2")).unwrap();
    let failure = param.validate(ValidationTarget::Value, "x").unwrap_err();
    assert_eq!(failure.target, ValidationTarget::Value);
}

#[test]
fn request_shape_errors_map_to_distinct_codes() {
    let mut missing_type = request("integer", "1");
    missing_type.type_name = None;
    let code = RegistryError::from(ParamDefinition::from_request(&missing_type).unwrap_err()).code();
    assert_eq!(code, "param_type_missing");

    let bogus = request("float", "1");
    let code = RegistryError::from(ParamDefinition::from_request(&bogus).unwrap_err()).code();
    assert_eq!(code, "bogus_param_type");

    let mut missing_default = request("integer", "1");
    missing_default.fallback = None;
    let code =
        RegistryError::from(ParamDefinition::from_request(&missing_default).unwrap_err()).code();
    assert_eq!(code, "param_default_missing");

    let mut sentinel = request("integer", "1");
    sentinel.min = Some(i64::MIN.to_string());
    let code = RegistryError::from(ParamDefinition::from_request(&sentinel).unwrap_err()).code();
    assert_eq!(code, "param_bound_out_of_range");

    let duplicates = vec![request("boolean", "0"), request("boolean", "1")];
    let code = RegistryError::from(definitions_from_requests(&duplicates).unwrap_err()).code();
    assert_eq!(code, "duplicate_param_name");
}

#[test]
fn absent_value_falls_back_to_default() {
    let param = ParamDefinition::from_request(&request("string", "abc")).unwrap();
    assert_eq!(param.value, "abc");
}

proptest! {
    #[test]
    fn integer_acceptance_matches_bounds(min in -1000_i64..1000, span in 0_i64..1000, value in -3000_i64..3000) {
        let max = min + span;
        let param = definition(ParamType::Integer, Some(min), Some(max));
        prop_assert_eq!(param.accepts(&value.to_string()), value >= min && value <= max);
    }
}
