//! Header templates built from string alignments
//!
//! A [`Diff`] is the structural "shape" shared by a set of header blocks: an
//! ordered run of literal segments that every sample contains verbatim, separated
//! by wildcard gaps where the samples disagree.
//!
//! ## Module Structure
//!
//! - `string_diff`: pairwise alignment of two strings into a template
//! - `generalize`: folding another sample into an existing template
//! - `matcher`: compiling a template into a matcher that extracts gap contents

pub mod generalize;
pub mod matcher;
pub mod string_diff;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DiffError;

pub use generalize::{generalize, rebuild_diff};
pub use matcher::{DEFAULT_MATCHER_SIZE_LIMIT, DiffMatcher, MatchResult};
pub use string_diff::{StringAlignment, string_diff};

/// Shortest literal run kept when no threshold is configured.
pub const DEFAULT_MIN_LENGTH: usize = 2;

pub(crate) fn check_min_length(min_length: usize) -> Result<(), DiffError> {
    if min_length < 2 {
        return Err(DiffError::InvalidArgument { min_length });
    }
    Ok(())
}

/// One element of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffElement {
    /// Text every sample contains verbatim at this position.
    Literal(String),
    /// Content that varies between samples (zero or more characters).
    Wildcard,
}

impl DiffElement {
    pub fn literal(text: impl Into<String>) -> Self {
        DiffElement::Literal(text.into())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, DiffElement::Wildcard)
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            DiffElement::Literal(text) => Some(text),
            DiffElement::Wildcard => None,
        }
    }
}

/// A normalized header template.
///
/// Invariants upheld by every constructor:
///
/// - literals are non-empty and never adjacent (adjacent runs are joined)
/// - wildcards are never adjacent
/// - a template consisting of a single wildcard is stored as the empty template
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<DiffElement>", into = "Vec<DiffElement>")]
pub struct Diff {
    elements: Vec<DiffElement>,
}

impl Diff {
    /// The template-less diff: nothing in common worth templating.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: impl IntoIterator<Item = DiffElement>) -> Self {
        let mut normalized: Vec<DiffElement> = Vec::new();

        for element in elements {
            match element {
                DiffElement::Literal(text) if text.is_empty() => {}
                DiffElement::Literal(text) => match normalized.last_mut() {
                    Some(DiffElement::Literal(previous)) => previous.push_str(&text),
                    _ => normalized.push(DiffElement::Literal(text)),
                },
                DiffElement::Wildcard => {
                    if !matches!(normalized.last(), Some(DiffElement::Wildcard)) {
                        normalized.push(DiffElement::Wildcard);
                    }
                }
            }
        }

        if normalized.len() == 1 && normalized[0].is_wildcard() {
            normalized.clear();
        }

        Self {
            elements: normalized,
        }
    }

    pub fn elements(&self) -> &[DiffElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn starts_with_wildcard(&self) -> bool {
        self.elements.first().is_some_and(DiffElement::is_wildcard)
    }

    pub fn ends_with_wildcard(&self) -> bool {
        self.elements.last().is_some_and(DiffElement::is_wildcard)
    }

    pub fn wildcard_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_wildcard()).count()
    }

    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(DiffElement::as_literal)
    }

    /// Number of characters covered by literal segments.
    pub fn literal_char_count(&self) -> usize {
        self.literals().map(|l| l.chars().count()).sum()
    }

    /// All literal segments joined, with the wildcards squeezed out.
    pub fn splat(&self) -> String {
        self.literals().collect()
    }
}

impl From<Vec<DiffElement>> for Diff {
    fn from(elements: Vec<DiffElement>) -> Self {
        Diff::from_elements(elements)
    }
}

impl From<Diff> for Vec<DiffElement> {
    fn from(diff: Diff) -> Self {
        diff.elements
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, element) in self.elements.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match element {
                DiffElement::Literal(text) => write!(f, "{text:?}")?,
                DiffElement::Wildcard => f.write_str("*")?,
            }
        }
        f.write_str("]")
    }
}
