//! Pairwise string alignment
//!
//! Two strings are aligned with a Myers shortest-edit-script diff over their
//! characters. The maximal runs the diff keeps in common become template
//! literals when they reach the minimum segment length; everything else
//! collapses into wildcard gaps.
//!
//! A [`StringAlignment`] is computed once and can then be read at any minimum
//! segment length, so callers that need both a coverage figure and a template
//! for the same pair do not diff twice.

use std::time::{Duration, Instant};

use similar::{Algorithm, DiffOp, capture_diff_slices_deadline};

use super::{Diff, DiffElement, check_min_length};
use crate::error::DiffError;

/// Alignments still running after this long settle for a coarser script.
const ALIGNMENT_DEADLINE: Duration = Duration::from_secs(1);

/// A maximal run the two strings share: `len` characters starting at
/// `first_start` in the first string and `second_start` in the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SharedRun {
    first_start: usize,
    second_start: usize,
    len: usize,
}

/// Character alignment of two strings.
#[derive(Debug, Clone)]
pub struct StringAlignment {
    first: Vec<char>,
    second_len: usize,
    runs: Vec<SharedRun>,
}

impl StringAlignment {
    pub fn new(first: &str, second: &str) -> Self {
        let first: Vec<char> = first.chars().collect();
        let second: Vec<char> = second.chars().collect();

        let deadline = Instant::now() + ALIGNMENT_DEADLINE;
        let ops = capture_diff_slices_deadline(Algorithm::Myers, &first, &second, Some(deadline));

        let mut runs: Vec<SharedRun> = Vec::new();
        for op in ops {
            let DiffOp::Equal {
                old_index,
                new_index,
                len,
            } = op
            else {
                continue;
            };

            // Equal ops can arrive split; a run is only judged once whole.
            let contiguous = |run: &&mut SharedRun| {
                run.first_start + run.len == old_index && run.second_start + run.len == new_index
            };
            if let Some(run) = runs.last_mut().filter(contiguous) {
                run.len += len;
                continue;
            }
            runs.push(SharedRun {
                first_start: old_index,
                second_start: new_index,
                len,
            });
        }

        Self {
            first,
            second_len: second.len(),
            runs,
        }
    }

    /// Characters covered by shared runs of at least `min_length`.
    pub fn shared_chars(&self, min_length: usize) -> usize {
        self.runs
            .iter()
            .filter(|run| run.len >= min_length)
            .map(|run| run.len)
            .sum()
    }

    /// The template keeping every shared run of at least `min_length`.
    pub fn template(&self, min_length: usize) -> Result<Diff, DiffError> {
        check_min_length(min_length)?;

        let mut elements = Vec::with_capacity(self.runs.len() * 2 + 1);
        let (mut first_next, mut second_next) = (0, 0);

        for run in self.runs.iter().filter(|run| run.len >= min_length) {
            if run.first_start > first_next || run.second_start > second_next {
                elements.push(DiffElement::Wildcard);
            }
            elements.push(DiffElement::Literal(
                self.first[run.first_start..run.first_start + run.len]
                    .iter()
                    .collect(),
            ));
            first_next = run.first_start + run.len;
            second_next = run.second_start + run.len;
        }

        if first_next < self.first.len() || second_next < self.second_len {
            elements.push(DiffElement::Wildcard);
        }

        Ok(Diff::from_elements(elements))
    }
}

/// Align `first` and `second` into a template.
///
/// Returns the empty template when the strings share no run of at least
/// `min_length` characters.
///
/// ## Examples
///
/// ```rust
/// use mailfamiliar_core::diff::{string_diff, DiffElement};
///
/// let diff = string_diff("abab", "abcab", 2).unwrap();
/// assert_eq!(
///     diff.elements(),
///     &[DiffElement::literal("ab"), DiffElement::Wildcard, DiffElement::literal("ab")]
/// );
/// assert!(string_diff("abab", "abcab", 3).unwrap().is_empty());
/// ```
pub fn string_diff(first: &str, second: &str, min_length: usize) -> Result<Diff, DiffError> {
    check_min_length(min_length)?;
    StringAlignment::new(first, second).template(min_length)
}
