// crates/report-registry-engine/src/import.rs
// ============================================================================
// Module: Report Format Documents
// Description: Parser for the XML report format document.
// Purpose: Turn feed files and import files into create requests.
// Dependencies: report-registry-core, roxmltree, thiserror
// ============================================================================

//! ## Overview
//! A document holds one `report_format` element (possibly wrapped in a
//! response element):
//!
//! ```text
//! <report_format id="UUID">
//!   <name/> <summary/> <description/> <extension/> <content_type/>
//!   <signature/>?
//!   <file name="generate">BASE64</file>*
//!   <param>
//!     <name/> <type>integer<min/>?<max/>?</type>
//!     <value/>? <default/> <options><option/>*</options>?
//!   </param>*
//! </report_format>
//! ```
//!
//! Values and defaults of `report_format_list` params may carry
//! `<report_format id="..."/>` children instead of text; their ids are joined
//! with commas.
//!
//! Security posture: documents are untrusted input and size-limited before
//! parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use report_registry_core::AssetFile;
use report_registry_core::NewParam;
use report_registry_core::NewReportFormat;
use report_registry_core::RegistryError;
use roxmltree::Document;
use roxmltree::Node;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum document size in bytes.
pub const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;
/// Element naming a report format.
const REPORT_FORMAT_TAG: &str = "report_format";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Document parsing errors.
///
/// # Invariants
/// - Messages never include document contents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The document could not be read.
    #[error("report format document io error: {0}")]
    Io(String),
    /// The document exceeds [`MAX_DOCUMENT_BYTES`].
    #[error("report format document exceeds size limit")]
    TooLarge,
    /// The document is not well-formed XML.
    #[error("report format document is malformed: {0}")]
    Xml(String),
    /// A required element is missing.
    #[error("report format document lacks <{0}>")]
    Missing(&'static str),
}

impl From<ImportError> for RegistryError {
    fn from(error: ImportError) -> Self {
        Self::Integrity(error.to_string())
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Reads and parses a document file.
///
/// # Errors
///
/// Returns [`ImportError`] when the file is unreadable, too large, or invalid.
pub fn read_report_format_document(path: &Path) -> Result<NewReportFormat, ImportError> {
    let metadata = fs::metadata(path).map_err(|err| ImportError::Io(err.to_string()))?;
    if metadata.len() > MAX_DOCUMENT_BYTES {
        return Err(ImportError::TooLarge);
    }
    let text = fs::read_to_string(path).map_err(|err| ImportError::Io(err.to_string()))?;
    parse_report_format_document(&text)
}

/// Parses a document into a create request.
///
/// # Errors
///
/// Returns [`ImportError`] when the XML is malformed or lacks a report format.
pub fn parse_report_format_document(text: &str) -> Result<NewReportFormat, ImportError> {
    let document = Document::parse(text).map_err(|err| ImportError::Xml(err.to_string()))?;
    let format = document
        .descendants()
        .find(|node| node.has_tag_name(REPORT_FORMAT_TAG))
        .ok_or(ImportError::Missing(REPORT_FORMAT_TAG))?;
    let name = child(format, "name").map(text_of).ok_or(ImportError::Missing("name"))?;
    let files = format
        .children()
        .filter(|node| node.has_tag_name("file"))
        .map(|node| AssetFile {
            name: node.attribute("name").unwrap_or_default().to_string(),
            content_base64: text_of(node),
        })
        .collect();
    let params = format.children().filter(|node| node.has_tag_name("param")).map(parse_param).collect();
    let signature = child(format, "signature").map(text_of).filter(|text| !text.trim().is_empty());
    Ok(NewReportFormat {
        uuid: format.attribute("id").map(str::to_string).filter(|id| !id.is_empty()),
        name,
        content_type: child_text(format, "content_type"),
        extension: child_text(format, "extension"),
        summary: child_text(format, "summary"),
        description: child_text(format, "description"),
        files,
        params,
        signature,
    })
}

/// Parses one `param` element.
fn parse_param(node: Node<'_, '_>) -> NewParam {
    let type_node = child(node, "type");
    let type_name = type_node.map(|ty| text_of(ty).trim().to_string()).filter(|ty| !ty.is_empty());
    let bound = |name: &str| {
        type_node.and_then(|ty| child(ty, name)).or_else(|| child(node, name)).map(text_of)
    };
    let options = child(node, "options")
        .map(|options| {
            options.children().filter(|opt| opt.has_tag_name("option")).map(text_of).collect()
        })
        .unwrap_or_default();
    NewParam {
        name: child_text(node, "name"),
        type_name,
        value: child(node, "value").map(value_of),
        fallback: child(node, "default").map(value_of),
        min: bound("min"),
        max: bound("max"),
        options,
    }
}

/// Returns a value's text, or its joined report format ids.
fn value_of(node: Node<'_, '_>) -> String {
    let ids: Vec<&str> = node
        .children()
        .filter(|child| child.has_tag_name(REPORT_FORMAT_TAG))
        .filter_map(|child| child.attribute("id"))
        .collect();
    if ids.is_empty() { text_of(node) } else { ids.join(",") }
}

/// Returns the first direct child element named `name`.
fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(name))
}

/// Returns the text of a child element, or an empty string.
fn child_text(node: Node<'_, '_>, name: &str) -> String {
    child(node, name).map(text_of).unwrap_or_default()
}

/// Concatenates the direct text children of an element.
fn text_of(node: Node<'_, '_>) -> String {
    node.children().filter(Node::is_text).filter_map(|text| text.text()).collect()
}
