// crates/report-registry-core/src/params.rs
// ============================================================================
// Module: Report Format Param Types
// Description: Parameter types, bounds, and value validation rules.
// Purpose: Validate param values and defaults against per-type bounds.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every report format param carries a type, an optional numeric bound pair,
//! a mandatory default (`fallback`), and for `selection` params the list of
//! allowed options. Bounds are explicit optionals: an absent bound means
//! "unbounded", and the reserved sentinel integers are refused as real bounds
//! so a stored bound can never be confused with "unset".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::model::NewParam;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sentinel reserved for "no lower bound"; never a valid stored minimum.
pub const UNBOUNDED_MIN: i64 = i64::MIN;
/// Sentinel reserved for "no upper bound"; never a valid stored maximum.
pub const UNBOUNDED_MAX: i64 = i64::MAX;

// ============================================================================
// SECTION: Param Type
// ============================================================================

/// Report format parameter type.
///
/// # Invariants
/// - Labels map 1:1 to the stored `type` column and the canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Boolean flag; any value accepted.
    Boolean,
    /// Signed 64-bit integer bounded by `[min, max]`.
    Integer,
    /// Single-line string with character-length bounds.
    String,
    /// Multi-line text with character-length bounds.
    Text,
    /// One of the registered options.
    Selection,
    /// Comma-separated list of report format ids.
    ReportFormatList,
}

impl ParamType {
    /// Returns the stable label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Text => "text",
            Self::Selection => "selection",
            Self::ReportFormatList => "report_format_list",
        }
    }

    /// Parses a type label. Unknown labels are `None`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "string" => Some(Self::String),
            "text" => Some(Self::Text),
            "selection" => Some(Self::Selection),
            "report_format_list" => Some(Self::ReportFormatList),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Bounds
// ============================================================================

/// Optional numeric bounds for integer values and string/text lengths.
///
/// # Invariants
/// - `min` is never [`UNBOUNDED_MIN`]; `max` is never [`UNBOUNDED_MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParamBounds {
    /// Inclusive lower bound.
    min: Option<i64>,
    /// Inclusive upper bound.
    max: Option<i64>,
}

impl ParamBounds {
    /// Returns bounds with neither side set.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// Builds bounds, refusing the reserved sentinel values.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::BoundOutOfRange`] when a bound equals its sentinel.
    pub fn new(min: Option<i64>, max: Option<i64>) -> Result<Self, ParamError> {
        if min == Some(UNBOUNDED_MIN) || max == Some(UNBOUNDED_MAX) {
            return Err(ParamError::BoundOutOfRange);
        }
        Ok(Self {
            min,
            max,
        })
    }

    /// Parses textual bounds as carried on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::BoundOutOfRange`] for non-integer text or sentinels.
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Result<Self, ParamError> {
        Self::new(parse_bound(min)?, parse_bound(max)?)
    }

    /// Returns the lower bound.
    #[must_use]
    pub const fn min(&self) -> Option<i64> {
        self.min
    }

    /// Returns the upper bound.
    #[must_use]
    pub const fn max(&self) -> Option<i64> {
        self.max
    }

    /// Returns true when `value` lies inside the bounds.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Parses one textual bound; blank text means "unset".
fn parse_bound(text: Option<&str>) -> Result<Option<i64>, ParamError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| ParamError::BoundOutOfRange),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Which part of a param failed validation.
///
/// # Invariants
/// - Callers attribute `Value` and `Fallback` failures to different codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationTarget {
    /// The current value.
    Value,
    /// The default (`fallback`) value.
    Fallback,
}

impl ValidationTarget {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Fallback => "default",
        }
    }
}

/// Single validation failure signal.
///
/// # Invariants
/// - Carries only the param name, never the rejected value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("param {param} failed {} validation", .target.as_str())]
pub struct ValidationFailed {
    /// Part of the param that failed.
    pub target: ValidationTarget,
    /// Param name.
    pub param: String,
}

/// Errors raised while building a param definition from a request.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// The request carried no type.
    #[error("param type missing")]
    TypeMissing,
    /// The request carried an unknown type label.
    #[error("bogus param type: {0}")]
    BogusType(String),
    /// The request carried no default.
    #[error("param default missing")]
    DefaultMissing,
    /// A bound was malformed or equal to the reserved sentinel.
    #[error("param bound out of range")]
    BoundOutOfRange,
    /// Two params share a name.
    #[error("duplicate param name: {0}")]
    DuplicateName(String),
    /// A value or default failed its type rules.
    #[error(transparent)]
    Validation(#[from] ValidationFailed),
}

// ============================================================================
// SECTION: Definition
// ============================================================================

/// Validated report format parameter.
///
/// # Invariants
/// - `value` and `fallback` satisfy the type rules at construction time.
/// - `options` keep insertion order (it feeds the canonical string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDefinition {
    /// Param name (unique within its report format).
    pub name: String,
    /// Param type.
    pub param_type: ParamType,
    /// Current value.
    pub value: String,
    /// Default value.
    pub fallback: String,
    /// Numeric bounds.
    pub bounds: ParamBounds,
    /// Options for `selection` params.
    pub options: Vec<String>,
}

impl ParamDefinition {
    /// Builds and validates a definition from raw request fields.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] when the type, bounds, default, or value are invalid.
    pub fn from_request(request: &NewParam) -> Result<Self, ParamError> {
        let type_name = request.type_name.as_deref().map(str::trim).unwrap_or_default();
        if type_name.is_empty() {
            return Err(ParamError::TypeMissing);
        }
        let param_type =
            ParamType::parse(type_name).ok_or_else(|| ParamError::BogusType(type_name.to_string()))?;
        let fallback = request.fallback.clone().ok_or(ParamError::DefaultMissing)?;
        let bounds = ParamBounds::parse(request.min.as_deref(), request.max.as_deref())?;
        let value = request.value.clone().unwrap_or_else(|| fallback.clone());
        let definition = Self {
            name: request.name.clone(),
            param_type,
            value,
            fallback,
            bounds,
            options: request.options.clone(),
        };
        definition.validate(ValidationTarget::Fallback, &definition.fallback)?;
        definition.validate(ValidationTarget::Value, &definition.value)?;
        Ok(definition)
    }

    /// Validates a candidate value against this param's type rules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailed`] tagged with `target` when the value is invalid.
    pub fn validate(&self, target: ValidationTarget, candidate: &str) -> Result<(), ValidationFailed> {
        if self.accepts(candidate) {
            Ok(())
        } else {
            Err(ValidationFailed {
                target,
                param: self.name.clone(),
            })
        }
    }

    /// Returns true when the candidate satisfies the type rules.
    #[must_use]
    pub fn accepts(&self, candidate: &str) -> bool {
        match self.param_type {
            ParamType::Boolean => true,
            ParamType::Integer => {
                candidate.parse::<i64>().is_ok_and(|value| self.bounds.contains(value))
            }
            ParamType::String | ParamType::Text => {
                let length = i64::try_from(candidate.chars().count()).unwrap_or(i64::MAX);
                self.bounds.contains(length)
            }
            ParamType::Selection => self.options.iter().any(|option| option == candidate),
            ParamType::ReportFormatList => is_report_format_list(candidate),
        }
    }
}

/// Builds definitions for every param of a request, rejecting duplicates.
///
/// # Errors
///
/// Returns the first [`ParamError`] encountered, in declaration order.
pub fn definitions_from_requests(requests: &[NewParam]) -> Result<Vec<ParamDefinition>, ParamError> {
    let mut seen = BTreeSet::new();
    let mut definitions = Vec::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(request.name.as_str()) {
            return Err(ParamError::DuplicateName(request.name.clone()));
        }
        definitions.push(ParamDefinition::from_request(request)?);
    }
    Ok(definitions)
}

/// Returns true for an empty list or comma-separated non-empty id tokens.
#[must_use]
pub fn is_report_format_list(candidate: &str) -> bool {
    if candidate.is_empty() {
        return true;
    }
    candidate.split(',').all(|token| {
        !token.is_empty()
            && token.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::ParamBounds;
    use super::ParamError;
    use super::UNBOUNDED_MAX;
    use super::UNBOUNDED_MIN;
    use super::is_report_format_list;

    #[test]
    fn sentinel_bounds_are_rejected() {
        assert_eq!(ParamBounds::new(Some(UNBOUNDED_MIN), None), Err(ParamError::BoundOutOfRange));
        assert_eq!(ParamBounds::new(None, Some(UNBOUNDED_MAX)), Err(ParamError::BoundOutOfRange));
        assert!(ParamBounds::new(Some(UNBOUNDED_MAX), Some(UNBOUNDED_MIN)).is_ok());
    }

    #[test]
    fn bound_text_must_be_an_integer() {
        assert_eq!(ParamBounds::parse(Some("ten"), None), Err(ParamError::BoundOutOfRange));
        assert_eq!(
            ParamBounds::parse(Some("99999999999999999999"), None),
            Err(ParamError::BoundOutOfRange)
        );
        assert_eq!(ParamBounds::parse(Some(" "), Some("")), Ok(ParamBounds::unbounded()));
    }

    #[test]
    fn report_format_list_grammar() {
        assert!(is_report_format_list(""));
        assert!(is_report_format_list("a"));
        assert!(is_report_format_list("a-1,b_2,C3"));
        assert!(!is_report_format_list(",a"));
        assert!(!is_report_format_list("a,"));
        assert!(!is_report_format_list("a b"));
    }
}
