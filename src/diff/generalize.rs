//! Folding a new sample into an existing template
//!
//! The cheap path walks the template's literals through the sample in order,
//! keeping literals the sample contains verbatim and re-aligning the ones it
//! does not. When that walk cannot produce a template the sample matches, the
//! template is rebuilt by aligning its joined literals against the sample.

use super::matcher::DiffMatcher;
use super::string_diff::string_diff;
use super::{Diff, DiffElement, check_min_length};
use crate::error::DiffError;

/// Produce the most general template consistent with both `diff` and `sample`.
///
/// Whenever the result is non-empty, `sample` matches it completely. An empty
/// `sample` leaves the template unchanged; an empty template stays empty.
pub fn generalize(diff: &Diff, sample: &str, min_length: usize) -> Result<Diff, DiffError> {
    check_min_length(min_length)?;

    if sample.is_empty() {
        return Ok(diff.clone());
    }

    if diff.is_empty() {
        return Ok(Diff::empty());
    }

    if accepts(diff, sample) {
        return Ok(diff.clone());
    }

    let walked = walk_literals(diff, sample, min_length)?;
    if walked.is_empty() || accepts(&walked, sample) {
        return Ok(walked);
    }

    log::debug!("incremental generalization of {diff} did not fit sample, rebuilding");

    let rebuilt = rebuild_diff(diff, sample, min_length)?;
    if rebuilt.is_empty() || accepts(&rebuilt, sample) {
        return Ok(rebuilt);
    }

    log::warn!("rebuilt template {rebuilt} still rejects its sample, dropping template");
    Ok(Diff::empty())
}

/// Re-align the joined literals of `diff` against `sample`, keeping any
/// boundary wildcards `diff` already had.
pub fn rebuild_diff(diff: &Diff, sample: &str, min_length: usize) -> Result<Diff, DiffError> {
    let rebuilt = string_diff(&diff.splat(), sample, min_length)?;

    if rebuilt.is_empty() {
        return Ok(rebuilt);
    }

    let mut elements = Vec::with_capacity(rebuilt.len() + 2);
    if diff.starts_with_wildcard() {
        elements.push(DiffElement::Wildcard);
    }
    elements.extend(rebuilt.elements().iter().cloned());
    if diff.ends_with_wildcard() {
        elements.push(DiffElement::Wildcard);
    }

    Ok(Diff::from_elements(elements))
}

fn accepts(diff: &Diff, sample: &str) -> bool {
    match DiffMatcher::compile(diff) {
        Ok(matcher) => matcher.is_match(sample),
        Err(err) => {
            log::warn!("cannot compile matcher for {} elements: {err}", diff.len());
            false
        }
    }
}

/// Accumulates template elements while consuming the sample left to right.
struct Walk<'s> {
    elements: Vec<DiffElement>,
    remainder: &'s str,
}

impl<'s> Walk<'s> {
    fn last_is_wildcard(&self) -> bool {
        matches!(self.elements.last(), Some(DiffElement::Wildcard))
    }

    fn push_wildcard(&mut self) {
        if !self.last_is_wildcard() {
            self.elements.push(DiffElement::Wildcard);
        }
    }

    /// Consume up to and past `literal` if it occurs in the remainder.
    fn take_literal(&mut self, literal: &str) -> bool {
        let Some(index) = self.remainder.find(literal) else {
            return false;
        };

        // Skipped text needs a gap to live in.
        if index > 0 {
            self.push_wildcard();
        }
        self.elements.push(DiffElement::literal(literal));
        self.remainder = &self.remainder[index + literal.len()..];
        true
    }
}

fn walk_literals(diff: &Diff, sample: &str, min_length: usize) -> Result<Diff, DiffError> {
    let mut walk = Walk {
        elements: Vec::with_capacity(diff.len() + 2),
        remainder: sample,
    };

    for element in diff.elements() {
        let literal = match element {
            DiffElement::Wildcard => {
                walk.push_wildcard();
                continue;
            }
            DiffElement::Literal(literal) => literal,
        };

        if walk.take_literal(literal) {
            continue;
        }

        let partial = string_diff(literal, walk.remainder, min_length)?;
        if partial.is_empty() {
            walk.push_wildcard();
            continue;
        }

        for piece in partial.elements() {
            match piece {
                DiffElement::Wildcard => walk.push_wildcard(),
                DiffElement::Literal(text) => {
                    if !walk.take_literal(text) {
                        walk.push_wildcard();
                    }
                }
            }
        }
    }

    if !walk.remainder.is_empty() {
        walk.push_wildcard();
    }

    Ok(Diff::from_elements(walk.elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::test_support::diff_of;

    fn generalized(parts: &[Option<&str>], sample: &str) -> Diff {
        generalize(&diff_of(parts), sample, 2).unwrap()
    }

    #[test]
    fn test_empty_sample_keeps_diff() {
        assert_eq!(
            generalized(&[None, Some("abc"), None], ""),
            diff_of(&[None, Some("abc"), None])
        );
    }

    #[test]
    fn test_empty_diff_stays_empty() {
        assert!(generalized(&[], "abcd").is_empty());
    }

    #[test]
    fn test_no_match_gives_empty_diff() {
        assert!(generalized(&[None, Some("snoot"), None], "nsto").is_empty());
    }

    #[test]
    fn test_gains_leading_wildcard() {
        assert_eq!(
            generalized(&[Some("abcd")], "wooab0cd"),
            diff_of(&[None, Some("ab"), None, Some("cd")])
        );
    }

    #[test]
    fn test_keeps_leading_wildcard() {
        assert_eq!(
            generalized(&[None, Some("abcd")], "ab0cd"),
            diff_of(&[None, Some("ab"), None, Some("cd")])
        );
    }

    #[test]
    fn test_keeps_trailing_wildcard() {
        assert_eq!(
            generalized(&[None, Some("abcd"), None], "ab0cd"),
            diff_of(&[None, Some("ab"), None, Some("cd"), None])
        );
    }

    #[test]
    fn test_does_not_gain_leading_wildcard() {
        assert_eq!(
            generalized(&[Some("abcd")], "ab0cd"),
            diff_of(&[Some("ab"), None, Some("cd")])
        );
    }

    #[test]
    fn test_loses_unmatched_characters() {
        assert_eq!(generalized(&[Some("abcd")], "abc"), diff_of(&[Some("abc"), None]));
    }

    #[test]
    fn test_keeps_existing_wildcards_for_matching_sample() {
        assert_eq!(
            generalized(&[Some("ab"), None, Some("cd"), None, Some("ef")], "abcdef"),
            diff_of(&[Some("ab"), None, Some("cd"), None, Some("ef")])
        );
    }

    #[test]
    fn test_trailing_text_gets_a_gap() {
        assert_eq!(
            generalized(&[Some("abc")], "abcxyz"),
            diff_of(&[Some("abc"), None])
        );
        assert_eq!(
            generalized(&[Some("abc")], "xyzabc"),
            diff_of(&[None, Some("abc")])
        );
    }

    #[test]
    fn test_result_always_matches_sample() {
        let cases: [(&[Option<&str>], &str); 4] = [
            (
                &[Some("Received: from mx1"), None, Some("example.org")],
                "Received: from mx2.example.org",
            ),
            (&[None, Some("Subject: [list] "), None], "Subject: [other] weekly digest"),
            (&[Some("From: a"), None, Some("To: b")], "To: b\nFrom: a"),
            (&[Some("abcdef"), None, Some("ghij")], "xxabcyyghzz"),
        ];

        for (parts, sample) in cases {
            let diff = generalized(parts, sample);
            if !diff.is_empty() {
                let matcher = DiffMatcher::compile(&diff).unwrap();
                assert!(matcher.is_match(sample), "{diff} should match {sample:?}");
            }
        }
    }

    #[test]
    fn test_rebuild_keeps_boundary_wildcards() {
        let diff = diff_of(&[None, Some("abcd"), None]);
        assert_eq!(
            rebuild_diff(&diff, "ab0cd", 2).unwrap(),
            diff_of(&[None, Some("ab"), None, Some("cd"), None])
        );
    }

    #[test]
    fn test_rejects_short_min_length() {
        assert!(generalize(&diff_of(&[Some("ab")]), "ab", 0).is_err());
    }
}
