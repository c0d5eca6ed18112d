//! Shared data model: documents, passages, requests, and verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw text of one guideline source, consumed once at ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source identifier, usually the file name without extension.
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Stable passage identifier, assigned in index insertion order.
pub type PassageId = usize;

/// A contiguous slice of a document's text, the unit of retrieval.
///
/// Neighbouring passages from the same document may overlap by the configured
/// margin; `start` is a character offset within the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub id: PassageId,
    pub source: String,
    pub start: usize,
    pub text: String,
}

/// Binary adherence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Yes,
    No,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }

    /// Parse a reasoning response strictly.
    ///
    /// Accepts only an unambiguous "Yes"/"No" token after trimming, case
    /// folding, and dropping a single trailing period. Anything else is a
    /// malformed response and yields `None`.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        let token = raw.trim().trim_end_matches('.').trim();
        if token.eq_ignore_ascii_case("yes") {
            Some(Self::Yes)
        } else if token.eq_ignore_ascii_case("no") {
            Some(Self::No)
        } else {
            None
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (row, column) pair's text value plus the column's semantic role.
///
/// Transient: exists only for the duration of one decision engine call.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub row: usize,
    pub column: String,
    /// Which guideline context applies to this column.
    pub role: String,
    pub text: String,
}

/// The outcome of one classification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Identifiers of the passages used as grounding.
    pub grounding: Vec<PassageId>,
    /// Optional rationale kept for audit; never used for the label itself.
    pub rationale: Option<String>,
}

/// Addresses one target cell in the input table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub column: String,
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}, column '{}'", self.row, self.column)
    }
}
