//! Compiled template matchers
//!
//! A template compiles to an anchored regular expression: each literal is
//! escaped and must appear in order, each wildcard becomes a lazy capture
//! group spanning any characters (newlines included). Capture `n` holds the
//! text occupying the `n`th gap.

use regex::{Regex, RegexBuilder};

use super::{Diff, DiffElement};

/// Compiled size allowed for one template's regex, in bytes.
pub const DEFAULT_MATCHER_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Outcome of matching a candidate against a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'s> {
    pub is_complete: bool,
    /// Text in each wildcard gap, in template order. Empty unless complete.
    pub wildcard_spans: Vec<&'s str>,
}

impl MatchResult<'_> {
    fn incomplete() -> Self {
        Self {
            is_complete: false,
            wildcard_spans: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiffMatcher {
    regex: Option<Regex>,
    gaps: usize,
}

impl DiffMatcher {
    /// Compile `diff`. The empty template compiles to a matcher that rejects
    /// everything.
    pub fn compile(diff: &Diff) -> Result<Self, regex::Error> {
        Self::compile_with_limit(diff, DEFAULT_MATCHER_SIZE_LIMIT)
    }

    /// Compile `diff`, failing if the regex would outgrow `size_limit` bytes.
    pub fn compile_with_limit(diff: &Diff, size_limit: usize) -> Result<Self, regex::Error> {
        if diff.is_empty() {
            return Ok(Self {
                regex: None,
                gaps: 0,
            });
        }

        let mut pattern = String::from("^");
        for element in diff.elements() {
            match element {
                DiffElement::Literal(text) => pattern.push_str(&regex::escape(text)),
                DiffElement::Wildcard => pattern.push_str("(.*?)"),
            }
        }
        pattern.push('$');

        let regex = RegexBuilder::new(&pattern)
            .dot_matches_new_line(true)
            .size_limit(size_limit)
            .build()?;

        Ok(Self {
            regex: Some(regex),
            gaps: diff.wildcard_count(),
        })
    }

    /// Number of wildcard gaps in the compiled template.
    pub fn gap_count(&self) -> usize {
        self.gaps
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(candidate))
    }

    pub fn match_str<'s>(&self, candidate: &'s str) -> MatchResult<'s> {
        let Some(captures) = self
            .regex
            .as_ref()
            .and_then(|regex| regex.captures(candidate))
        else {
            return MatchResult::incomplete();
        };

        let wildcard_spans = captures
            .iter()
            .skip(1)
            .map(|group| group.map_or("", |m| m.as_str()))
            .collect();

        MatchResult {
            is_complete: true,
            wildcard_spans,
        }
    }
}
