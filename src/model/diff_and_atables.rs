//! A mailbox template paired with per-gap character models
//!
//! The template captures what a mailbox's header blocks have in common; one
//! [`AdjacencyTable`] per wildcard gap captures what typically fills that gap.
//! A candidate that fits the template is scored by how typical its gap contents
//! are; a candidate that does not fit scores 0.
//!
//! ## Staleness
//!
//! Adding samples that already fit the template only feeds the gap tables.
//! Anything else (a sample that breaks the template, a sample restored to its
//! old place, any removal) makes the model [`Freshness::Stale`] and it is
//! rebuilt from its samples in arrival order. The rebuilt model is constructed
//! in full before it replaces the current one, so a failed rebuild leaves the
//! previous model untouched.

use crate::diff::{
    DEFAULT_MATCHER_SIZE_LIMIT, DEFAULT_MIN_LENGTH, Diff, DiffMatcher, StringAlignment,
    check_min_length, generalize, string_diff,
};
use crate::error::{DiffError, EngineError, Result};

use super::adjacency_table::AdjacencyTable;
use super::arrivals::Arrivals;

/// Whether a batch of samples can be absorbed without rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// A candidate's confidence, plus how many template characters would remain
/// literal if it were merged in. The merge is only worked out when the
/// confidence is positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub confidence: f64,
    pub merged_literals: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DiffAndAtables {
    min_length: usize,
    matcher_size_limit: usize,
    diff: Diff,
    matcher: DiffMatcher,
    /// One table per wildcard gap, in template order.
    gap_tables: Vec<AdjacencyTable>,
    arrivals: Arrivals,
    max_length: usize,
}

impl DiffAndAtables {
    /// A model with no corpus and no template.
    pub fn empty(min_length: usize) -> Result<Self> {
        Self::from_strings(Vec::new(), min_length)
    }

    /// Build a model over `corpus`, generalizing the template across every
    /// sample in order.
    pub fn from_strings(corpus: Vec<String>, min_length: usize) -> Result<Self> {
        Self::from_strings_with_limit(corpus, min_length, DEFAULT_MATCHER_SIZE_LIMIT)
    }

    /// Like [`DiffAndAtables::from_strings`], with every compiled template held
    /// to `matcher_size_limit` bytes.
    pub fn from_strings_with_limit(
        corpus: Vec<String>,
        min_length: usize,
        matcher_size_limit: usize,
    ) -> Result<Self> {
        Self::build(Arrivals::new(corpus), min_length, matcher_size_limit)
    }

    fn build(arrivals: Arrivals, min_length: usize, matcher_size_limit: usize) -> Result<Self> {
        check_min_length(min_length)?;

        let corpus = arrivals.as_slice();
        let diff = build_template(corpus, min_length, matcher_size_limit)?;
        let matcher = compile(&diff, matcher_size_limit)?;

        let mut gap_tables = vec![AdjacencyTable::new(); matcher.gap_count()];
        if !diff.is_empty() {
            for sample in corpus {
                feed_gaps(&matcher, &mut gap_tables, sample);
            }
        }

        let max_length = corpus.iter().map(|s| s.chars().count()).max().unwrap_or(0);

        Ok(Self {
            min_length,
            matcher_size_limit,
            diff,
            matcher,
            gap_tables,
            arrivals,
            max_length,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    /// Samples in arrival order.
    pub fn corpus(&self) -> &[String] {
        self.arrivals.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    pub fn contains(&self, sample: &str) -> bool {
        self.arrivals.contains(sample)
    }

    /// Length in characters of the longest sample in the corpus.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn start_table(&self) -> Option<&AdjacencyTable> {
        if self.diff.starts_with_wildcard() {
            self.gap_tables.first()
        } else {
            None
        }
    }

    pub fn finish_table(&self) -> Option<&AdjacencyTable> {
        if self.diff.ends_with_wildcard() {
            self.gap_tables.last()
        } else {
            None
        }
    }

    /// Tables for the gaps strictly inside the template.
    pub fn interior_tables(&self) -> &[AdjacencyTable] {
        let start = usize::from(self.diff.starts_with_wildcard());
        let end = self.gap_tables.len() - usize::from(self.diff.ends_with_wildcard());
        &self.gap_tables[start..end.max(start)]
    }

    /// Whether `samples` can be folded in without regenerating the template.
    pub fn freshness_for(&self, samples: &[String]) -> Freshness {
        let absorbable = self.arrivals.len() >= 2
            && self.arrivals.admits_at_tail(samples)
            && (self.diff.is_empty() || samples.iter().all(|s| self.matcher.is_match(s)));

        if absorbable {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    /// Add `samples` in order. A sample that was the most recent removal goes
    /// back to its old place in the arrival order.
    pub fn add_strings(&mut self, samples: &[String]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        match self.freshness_for(samples) {
            Freshness::Fresh => {
                for sample in samples {
                    if !self.diff.is_empty() {
                        feed_gaps(&self.matcher, &mut self.gap_tables, sample);
                    }
                    self.max_length = self.max_length.max(sample.chars().count());
                }
                self.arrivals.admit_all(samples);
                Ok(())
            }
            Freshness::Stale => {
                let mut arrivals = self.arrivals.clone();
                arrivals.admit_all(samples);
                self.rebuild(arrivals)
            }
        }
    }

    /// Remove the latest occurrence of each sample and rebuild from what
    /// remains. Samples that are not in the corpus are ignored.
    pub fn remove_strings(&mut self, samples: &[String]) -> Result<()> {
        let mut arrivals = self.arrivals.clone();
        let mut removed = false;

        for sample in samples {
            removed |= arrivals.withdraw(sample);
        }

        if !removed {
            return Ok(());
        }

        self.rebuild(arrivals)
    }

    fn rebuild(&mut self, arrivals: Arrivals) -> Result<()> {
        let size = arrivals.len();
        let rebuilt = Self::build(arrivals, self.min_length, self.matcher_size_limit)
            .inspect_err(|err| {
                log::warn!("keeping previous model after failed rebuild of {size} samples: {err}");
            })?;

        log::debug!(
            "rebuilt template over {size} samples (min length {}): {} gaps",
            self.min_length,
            rebuilt.gap_tables.len()
        );

        *self = rebuilt;
        Ok(())
    }

    /// Template this model would have after `sample` was added.
    pub fn template_with(&self, sample: &str) -> std::result::Result<Diff, DiffError> {
        match self.arrivals.as_slice() {
            [] => Ok(Diff::empty()),
            [only] => string_diff(only, sample, self.min_length),
            _ if self.matcher.is_match(sample) => Ok(self.diff.clone()),
            _ => generalize(&self.diff, sample, self.min_length),
        }
    }

    pub fn confidence_for(&self, candidate: &str) -> f64 {
        if self.arrivals.is_empty() {
            return 0.0;
        }

        if self.diff.is_empty() {
            return self.coverage_confidence(candidate);
        }

        let matched = self.matcher.match_str(candidate);
        if !matched.is_complete {
            return 0.0;
        }

        if self.gap_tables.is_empty() {
            return 1.0;
        }

        let cumulative: f64 = self
            .gap_tables
            .iter()
            .zip(&matched.wildcard_spans)
            .map(|(table, span)| table.confidence_for(span))
            .sum();

        cumulative / self.gap_tables.len() as f64
    }

    /// [`DiffAndAtables::confidence_for`] together with the literal size of
    /// [`DiffAndAtables::template_with`], sharing the alignment work between
    /// the two.
    pub fn assess(&self, candidate: &str) -> Assessment {
        let [only] = self.arrivals.as_slice() else {
            let confidence = self.confidence_for(candidate);
            // A positive score means the template already accepts the
            // candidate, or there is no template to keep.
            let merged_literals = (confidence > 0.0).then(|| self.diff.literal_char_count());
            return Assessment {
                confidence,
                merged_literals,
            };
        };

        let alignment = StringAlignment::new(only, candidate);
        let confidence = coverage(&alignment, candidate);
        Assessment {
            confidence,
            merged_literals: (confidence > 0.0).then(|| alignment.shared_chars(self.min_length)),
        }
    }

    /// Best fraction of `candidate` covered by runs shared with any one sample.
    /// Used while the corpus has no template. Runs are found at the default
    /// minimum length whatever this model's own threshold is.
    fn coverage_confidence(&self, candidate: &str) -> f64 {
        self.arrivals
            .as_slice()
            .iter()
            .map(|sample| coverage(&StringAlignment::new(sample, candidate), candidate))
            .fold(0.0, f64::max)
    }
}

fn coverage(alignment: &StringAlignment, candidate: &str) -> f64 {
    let length = candidate.chars().count();
    if length == 0 {
        return 0.0;
    }
    alignment.shared_chars(DEFAULT_MIN_LENGTH) as f64 / length as f64
}

fn build_template(corpus: &[String], min_length: usize, size_limit: usize) -> Result<Diff> {
    let [first, second, rest @ ..] = corpus else {
        return Ok(Diff::empty());
    };

    let mut diff = string_diff(first, second, min_length)?;
    let mut matcher = compile(&diff, size_limit)?;

    for sample in rest {
        if diff.is_empty() {
            break;
        }
        if matcher.is_match(sample) {
            continue;
        }
        diff = generalize(&diff, sample, min_length)?;
        matcher = compile(&diff, size_limit)?;
    }

    Ok(diff)
}

fn compile(diff: &Diff, size_limit: usize) -> Result<DiffMatcher> {
    DiffMatcher::compile_with_limit(diff, size_limit)
        .map_err(|err| EngineError::rebuild_failed(err.to_string()))
}

fn feed_gaps(matcher: &DiffMatcher, gap_tables: &mut [AdjacencyTable], sample: &str) {
    let matched = matcher.match_str(sample);
    if !matched.is_complete {
        log::debug!("sample does not fit its own template, gap tables skipped");
        return;
    }

    for (table, span) in gap_tables.iter_mut().zip(matched.wildcard_spans) {
        table.add_string(span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::test_support::diff_of;

    const SNOOTY: &str = "snooty snoot snoot";
    const ALPHABET: &str = "abcdefghijklmnopqrsntuvwxyz";

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn model(values: &[&str]) -> DiffAndAtables {
        let mut daat = DiffAndAtables::empty(2).unwrap();
        daat.add_strings(&strings(values)).unwrap();
        daat
    }

    #[test]
    fn test_empty_model_has_no_confidence() {
        let daat = DiffAndAtables::empty(2).unwrap();
        assert_eq!(daat.confidence_for("abc123"), 0.0);
        assert_eq!(daat.confidence_for(""), 0.0);
        assert!(daat.is_empty());
    }

    #[test]
    fn test_rejects_short_min_length() {
        assert!(matches!(
            DiffAndAtables::empty(1),
            Err(EngineError::Diff(DiffError::InvalidArgument { min_length: 1 }))
        ));
    }

    #[test]
    fn test_single_string() {
        let daat = model(&[SNOOTY]);
        assert!(daat.diff().is_empty());
        assert_eq!(daat.confidence_for(SNOOTY), 1.0);
        assert_eq!(daat.max_length(), 18);
    }

    #[test]
    fn test_same_string_twice() {
        let daat = model(&[SNOOTY, SNOOTY]);
        assert_eq!(daat.diff(), &diff_of(&[Some(SNOOTY)]));
        assert_eq!(daat.confidence_for(SNOOTY), 1.0);
        assert_eq!(daat.max_length(), 18);
    }

    #[test]
    fn test_two_dissimilar_strings() {
        let daat = model(&[SNOOTY, ALPHABET]);
        assert!(!daat.diff().is_empty());
        assert!(daat.diff().starts_with_wildcard() && daat.diff().ends_with_wildcard());
        assert_eq!(daat.max_length(), 27);

        for candidate in [SNOOTY, ALPHABET] {
            let confidence = daat.confidence_for(candidate);
            assert!(confidence > 0.0 && confidence < 1.0, "{candidate}: {confidence}");
        }

        let extended = daat.confidence_for(&format!("{SNOOTY}a"));
        assert!(extended > 0.0 && extended < 1.0);
        assert_eq!(daat.confidence_for("xyz"), 0.0);
    }

    #[test]
    fn test_repeating_a_sample_raises_its_confidence() {
        let mut daat = model(&[SNOOTY, ALPHABET]);
        let before = daat.confidence_for(SNOOTY);
        let extended_before = daat.confidence_for(&format!("{SNOOTY}a"));

        assert_eq!(daat.freshness_for(&strings(&[SNOOTY])), Freshness::Fresh);
        daat.add_strings(&strings(&[SNOOTY])).unwrap();

        assert!(daat.confidence_for(SNOOTY) > before);
        assert!(daat.confidence_for(&format!("{SNOOTY}a")) > extended_before);
    }

    #[test]
    fn test_tables_follow_template_shape() {
        let daat = model(&["id=1;ok", "id=22;ok", "id=333;ok"]);
        assert_eq!(daat.diff(), &diff_of(&[Some("id="), None, Some(";ok")]));
        assert!(daat.start_table().is_none());
        assert!(daat.finish_table().is_none());
        assert_eq!(daat.interior_tables().len(), 1);
        assert_eq!(daat.interior_tables()[0].total_samples(), 3);

        let open = model(&["xabcx", "yabcy"]);
        assert_eq!(open.diff(), &diff_of(&[None, Some("abc"), None]));
        assert!(open.start_table().is_some());
        assert!(open.finish_table().is_some());
        assert!(open.interior_tables().is_empty());
    }

    #[test]
    fn test_cheap_path_matches_rebuild() {
        let mut incremental = model(&["id=1;ok", "id=22;ok"]);
        incremental.add_strings(&strings(&["id=4;ok"])).unwrap();

        let rebuilt =
            DiffAndAtables::from_strings(strings(&["id=1;ok", "id=22;ok", "id=4;ok"]), 2).unwrap();

        assert_eq!(incremental.diff(), rebuilt.diff());
        assert_eq!(incremental.corpus(), rebuilt.corpus());
        assert_eq!(incremental.interior_tables(), rebuilt.interior_tables());
    }

    #[test]
    fn test_nonconforming_sample_forces_rebuild() {
        let mut daat = model(&["id=1;ok", "id=22;ok"]);
        let breaking = strings(&["id=5;failed"]);
        assert_eq!(daat.freshness_for(&breaking), Freshness::Stale);

        daat.add_strings(&breaking).unwrap();
        assert_eq!(daat.diff(), &diff_of(&[Some("id="), None]));
        assert!(daat.confidence_for("id=5;failed") > 0.0);
    }

    #[test]
    fn test_remove_strings() {
        let mut daat = model(&["id=1;ok", "id=22;ok", "id=5;failed"]);
        daat.remove_strings(&strings(&["id=5;failed"])).unwrap();
        assert_eq!(daat.diff(), &diff_of(&[Some("id="), None, Some(";ok")]));
        assert_eq!(daat.corpus().len(), 2);
    }

    #[test]
    fn test_removing_unknown_string_is_noop() {
        let mut daat = model(&["id=1;ok", "id=22;ok"]);
        let before = daat.clone();
        daat.remove_strings(&strings(&["never added"])).unwrap();
        assert_eq!(daat.diff(), before.diff());
        assert_eq!(daat.corpus(), before.corpus());
        assert_eq!(daat.interior_tables(), before.interior_tables());
    }

    #[test]
    fn test_remove_then_readd_restores_state() {
        let mut daat = model(&["id=1;ok", "id=22;ok", "id=5;failed"]);
        let before = daat.clone();

        daat.remove_strings(&strings(&["id=5;failed"])).unwrap();
        daat.add_strings(&strings(&["id=5;failed"])).unwrap();

        assert_eq!(daat.diff(), before.diff());
        assert_eq!(daat.corpus(), before.corpus());
        assert_eq!(daat.finish_table(), before.finish_table());
    }

    #[test]
    fn test_readding_an_earlier_sample_restores_its_place() {
        let mut daat = model(&["id=1;ok", "id=22;ok", "id=5;failed"]);
        let before = daat.clone();

        daat.remove_strings(&strings(&["id=1;ok"])).unwrap();
        assert_eq!(daat.corpus(), strings(&["id=22;ok", "id=5;failed"]));
        assert_eq!(daat.freshness_for(&strings(&["id=1;ok"])), Freshness::Stale);

        daat.add_strings(&strings(&["id=1;ok"])).unwrap();
        assert_eq!(daat.corpus(), before.corpus());
        assert_eq!(daat.diff(), before.diff());
        assert_eq!(daat.finish_table(), before.finish_table());
        assert_eq!(daat.confidence_for("id=7;ok"), before.confidence_for("id=7;ok"));
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_model() {
        let mut daat =
            DiffAndAtables::from_strings_with_limit(strings(&["id=1;ok"]), 2, 1).unwrap();
        let before = daat.confidence_for("id=22;ok");

        let added = daat.add_strings(&strings(&["id=22;ok"]));
        assert!(matches!(added, Err(EngineError::RebuildFailed { .. })));
        assert_eq!(daat.corpus(), strings(&["id=1;ok"]));
        assert!(daat.diff().is_empty());
        assert_eq!(daat.confidence_for("id=22;ok"), before);
    }

    #[test]
    fn test_assess_shares_one_alignment() {
        let short = DiffAndAtables::from_strings(strings(&["ogg"]), 2).unwrap();
        let long = DiffAndAtables::from_strings(strings(&["ogg"]), 4).unwrap();

        assert_eq!(
            short.assess("mogg"),
            Assessment {
                confidence: 0.75,
                merged_literals: Some(3)
            }
        );
        assert_eq!(
            long.assess("mogg"),
            Assessment {
                confidence: 0.75,
                merged_literals: Some(0)
            }
        );
        assert_eq!(long.assess("xyz").merged_literals, None);

        let templated = model(&["id=1;ok", "id=22;ok"]);
        let assessment = templated.assess("id=2;ok");
        assert_eq!(assessment.confidence, templated.confidence_for("id=2;ok"));
        assert_eq!(
            assessment.merged_literals,
            Some(templated.template_with("id=2;ok").unwrap().literal_char_count())
        );
        assert_eq!(templated.assess("nope").merged_literals, None);
    }

    #[test]
    fn test_template_with_predicts_rebuild() {
        let daat = model(&["id=1;ok", "id=22;ok"]);
        let predicted = daat.template_with("id=5;failed").unwrap();

        let mut merged = daat.clone();
        merged.add_strings(&strings(&["id=5;failed"])).unwrap();
        assert_eq!(&predicted, merged.diff());

        assert_eq!(daat.template_with("id=9;ok").unwrap(), daat.diff().clone());
        assert!(DiffAndAtables::empty(2).unwrap().template_with("x").unwrap().is_empty());
    }

    #[test]
    fn test_coverage_without_template() {
        let daat = model(&["ogg"]);
        assert_eq!(daat.confidence_for("mogg"), 0.75);
        assert_eq!(daat.confidence_for("ogg"), 1.0);
        assert_eq!(daat.confidence_for(""), 0.0);
    }

    #[test]
    fn test_coverage_ignores_model_threshold() {
        let daat = DiffAndAtables::from_strings(strings(&["egg"]), 8).unwrap();
        assert!(daat.diff().is_empty());
        assert_eq!(daat.confidence_for("egg"), 1.0);
        assert!(daat.template_with("egg").unwrap().is_empty());
    }
}
