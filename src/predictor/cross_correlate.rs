//! Model-free scoring by sliding alignment
//!
//! Each stored header block is slid across the candidate. At every offset the
//! score is the fraction of the shorter sequence that is either outside the
//! overlap or mismatched inside it; the best (lowest) offset score is kept.
//! A mailbox's confidence is then taken from the most common score among its
//! headers.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::CrossCorrelateConfig;
use crate::error::Result;

use super::{FolderScores, Mailbox, Predictor, unknown_mailbox};

/// Best alignment of two character sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// Position of the second sequence's first character relative to the first's.
    pub offset: isize,
    /// Mismatch fraction in `[0, 1]`; 0 means one sequence contains the other.
    pub score: f64,
}

/// Slide `right` across `left`. `None` when either is empty.
///
/// Ties between equally good offsets go to the offset closest to zero.
pub fn best_alignment(left: &[char], right: &[char]) -> Option<Alignment> {
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let shorter = left.len().min(right.len());
    let mut best: Option<Alignment> = None;

    for offset in 1 - right.len() as isize..left.len() as isize {
        let left_start = offset.max(0) as usize;
        let right_start = (-offset).max(0) as usize;
        let overlap = (left.len() - left_start).min(right.len() - right_start);

        let mismatches = left[left_start..left_start + overlap]
            .iter()
            .zip(&right[right_start..right_start + overlap])
            .filter(|(l, r)| l != r)
            .count();

        let score = (shorter - overlap + mismatches) as f64 / shorter as f64;

        let better = match best {
            None => true,
            Some(current) => {
                score < current.score
                    || (score == current.score
                        && offset.unsigned_abs() < current.offset.unsigned_abs())
            }
        };
        if better {
            best = Some(Alignment { offset, score });
        }
    }

    best
}

/// Turn a mailbox's best alignment scores into a confidence.
///
/// An exact containment anywhere gives 1. Otherwise the scores are binned
/// between their minimum and maximum and the confidence is one minus the
/// midpoint of the fullest bin (the first, on ties).
pub fn modal_confidence(scores: &[f64], bins: usize) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    if scores.iter().any(|&score| score == 0.0) {
        return 1.0;
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max <= min {
        return (1.0 - min).clamp(0.0, 1.0);
    }

    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];

    for &score in scores {
        let index = (((score - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    let mut fullest = 0;
    for (index, &count) in counts.iter().enumerate() {
        if count > counts[fullest] {
            fullest = index;
        }
    }

    let midpoint = min + (fullest as f64 + 0.5) * width;
    (1.0 - midpoint).clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct CrossCorrelate {
    bins: usize,
    boxes: BTreeMap<String, Vec<Vec<char>>>,
}

impl CrossCorrelate {
    pub fn new(config: &CrossCorrelateConfig) -> Self {
        Self {
            bins: config.bins,
            boxes: BTreeMap::new(),
        }
    }

    fn headers_mut(&mut self, mailbox: &str) -> Result<&mut Vec<Vec<char>>> {
        self.boxes
            .get_mut(mailbox)
            .ok_or_else(|| unknown_mailbox(mailbox))
    }
}

impl Predictor for CrossCorrelate {
    fn add_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        self.headers_mut(mailbox)?.push(headers.chars().collect());
        Ok(())
    }

    fn remove_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        let stored = self.headers_mut(mailbox)?;
        let target: Vec<char> = headers.chars().collect();
        if let Some(index) = stored.iter().position(|h| *h == target) {
            stored.remove(index);
        }
        Ok(())
    }

    fn consider_box(&mut self, mailbox: &Mailbox) -> Result<()> {
        let headers = mailbox
            .header_blocks()
            .map(|h| h.chars().collect::<Vec<char>>())
            .collect::<Vec<_>>();

        log::info!(
            "cross correlate loaded {} headers for {}",
            headers.len(),
            mailbox.qualified_name
        );
        self.boxes.insert(mailbox.qualified_name.clone(), headers);
        Ok(())
    }

    fn folder_score(&self, headers: &str) -> FolderScores {
        let candidate: Vec<char> = headers.chars().collect();

        self.boxes
            .par_iter()
            .map(|(name, stored)| {
                let scores: Vec<f64> = stored
                    .iter()
                    .filter_map(|h| best_alignment(h, &candidate))
                    .map(|alignment| alignment.score)
                    .collect();
                (name.clone(), modal_confidence(&scores, self.bins))
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "cross correlate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::predictor::MailMessage;
    use chrono::Utc;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn mailbox(name: &str, headers: &[&str]) -> Mailbox {
        let now = Utc::now();
        Mailbox::new(
            name,
            headers.iter().map(|h| MailMessage::new(*h, now)).collect(),
        )
    }

    fn predictor() -> CrossCorrelate {
        CrossCorrelate::new(&CrossCorrelateConfig::builtin())
    }

    #[test]
    fn test_empty_sequences_do_not_align() {
        assert_eq!(best_alignment(&chars("ab"), &[]), None);
        assert_eq!(best_alignment(&[], &chars("ab")), None);
    }

    #[test]
    fn test_equal_sequences_align_at_zero() {
        assert_eq!(
            best_alignment(&chars("ab"), &chars("ab")),
            Some(Alignment { offset: 0, score: 0.0 })
        );
    }

    #[test]
    fn test_finds_offsets_in_both_directions() {
        assert_eq!(
            best_alignment(&chars("aabc"), &chars("bc")),
            Some(Alignment { offset: 2, score: 0.0 })
        );
        assert_eq!(
            best_alignment(&chars("bc"), &chars("abbc")),
            Some(Alignment { offset: -2, score: 0.0 })
        );
        assert_eq!(
            best_alignment(&chars("\u{2665}bc"), &chars("ab\u{2665}bc")),
            Some(Alignment { offset: -2, score: 0.0 })
        );
    }

    #[test]
    fn test_partial_overlap_counts_as_mismatch() {
        // "abcd" against "cdxy": best overlap is "cd" with "xy" hanging off.
        let alignment = best_alignment(&chars("abcd"), &chars("cdxy")).unwrap();
        assert_eq!(alignment.offset, 2);
        assert_eq!(alignment.score, 0.5);
    }

    #[test]
    fn test_ties_prefer_smallest_offset() {
        let alignment = best_alignment(&chars("ab"), &chars("xy")).unwrap();
        assert_eq!(alignment, Alignment { offset: 0, score: 1.0 });
    }

    #[test]
    fn test_modal_confidence() {
        assert_eq!(modal_confidence(&[], 100), 0.0);
        assert_eq!(modal_confidence(&[0.4, 0.0], 100), 1.0);
        assert_eq!(modal_confidence(&[0.25, 0.25], 100), 0.75);

        // Two of three scores fall in the lowest of two bins [0.2, 0.4).
        let confidence = modal_confidence(&[0.2, 0.25, 0.6], 2);
        assert!((confidence - 0.7).abs() < 1e-9, "{confidence}");
    }

    #[test]
    fn test_modal_confidence_ties_take_first_bin() {
        let confidence = modal_confidence(&[0.2, 0.6], 2);
        assert!((confidence - 0.7).abs() < 1e-9, "{confidence}");
    }

    #[test]
    fn test_unknown_mailbox() {
        let mut xcorr = predictor();
        assert!(matches!(
            xcorr.add_headers("From: a", "Nowhere"),
            Err(EngineError::UnknownMailbox(name)) if name == "Nowhere"
        ));
        assert!(xcorr.remove_headers("From: a", "Nowhere").is_err());
    }

    #[test]
    fn test_folder_score() {
        let mut xcorr = predictor();
        xcorr
            .consider_box(&mailbox("Lists", &["List-Id: dev", "List-Id: ops"]))
            .unwrap();
        xcorr.consider_box(&mailbox("Empty", &[])).unwrap();

        let scores = xcorr.folder_score("List-Id: dev");
        assert_eq!(scores["Lists"], 1.0);
        assert_eq!(scores["Empty"], 0.0);

        let partial = xcorr.folder_score("List-Id: qa")["Lists"];
        assert!(partial > 0.0 && partial < 1.0, "{partial}");
    }

    #[test]
    fn test_remove_headers() {
        let mut xcorr = predictor();
        xcorr.consider_box(&mailbox("Lists", &["List-Id: dev"])).unwrap();
        xcorr.add_headers("List-Id: ops", "Lists").unwrap();
        xcorr.remove_headers("List-Id: dev", "Lists").unwrap();
        xcorr.remove_headers("never stored", "Lists").unwrap();

        assert!(xcorr.folder_score("List-Id: dev")["Lists"] < 1.0);
        assert_eq!(xcorr.folder_score("List-Id: ops")["Lists"], 1.0);
    }
}
