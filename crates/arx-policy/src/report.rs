//! Structured reports for dry-run and validate operations.
//!
//! The report shape is shared: a validation is a dry run whose delta
//! sections are empty, and a document syntax failure short-circuits to
//! an invalid report carrying the parser's errors unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Whether the submitted document parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// The document parsed and the requested operation was simulated.
    #[serde(rename = "Valid YAML")]
    Valid,

    /// The document failed to parse; nothing was simulated.
    #[serde(rename = "Invalid YAML")]
    Invalid,
}

/// One error reported by the external document parser, passed through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    /// Human-readable description.
    pub message: String,

    /// Line the error was detected on, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Column the error was detected on, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Rows of one delta group, as plain attribute maps ordered by table
/// then primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSection {
    /// Row attribute maps.
    pub items: Vec<JsonValue>,
}

/// The before/after views of every modified entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedSection {
    /// Rows as the caller could see them before the load.
    pub before: DiffSection,

    /// Rows as the caller could see them after the load.
    pub after: DiffSection,
}

/// Outcome of a dry run or validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunReport {
    /// Parse status of the submitted document.
    pub status: ValidationStatus,

    /// Parser errors; present only when the document was invalid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ParseIssue>,

    /// Rows the load would create.
    pub created: DiffSection,

    /// Modified entities, before and after.
    pub updated: UpdatedSection,

    /// Rows the load would delete.
    pub deleted: DiffSection,
}

impl DryRunReport {
    /// A valid report with empty delta sections.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            status: ValidationStatus::Valid,
            errors: Vec::new(),
            created: DiffSection::default(),
            updated: UpdatedSection::default(),
            deleted: DiffSection::default(),
        }
    }

    /// An invalid report carrying the parser's errors unchanged.
    #[must_use]
    pub fn invalid(errors: Vec<ParseIssue>) -> Self {
        Self {
            status: ValidationStatus::Invalid,
            errors,
            created: DiffSection::default(),
            updated: UpdatedSection::default(),
            deleted: DiffSection::default(),
        }
    }
}
