//! Clustered templates
//!
//! A single template over a whole mailbox degrades to almost nothing as soon as
//! a few structurally different messages arrive. [`ThresholdedDiffAndAtables`]
//! instead keeps, for each configured minimum segment length, a bucket of
//! independent [`DiffAndAtables`] clusters. A sample joins the cluster it fits
//! best, or starts a cluster of its own when nothing fits well enough.
//!
//! Clustering is greedy, so the buckets are a function of the samples in
//! arrival order. Removing a sample re-clusters what is left in that order,
//! and adding back the sample removed last restores its old place, leaving the
//! model exactly as it was before the removal.

use rayon::prelude::*;

use crate::config::ThresholdConfig;
use crate::error::Result;

use super::arrivals::Arrivals;
use super::diff_and_atables::{Assessment, DiffAndAtables};

/// Where one bucket puts a new sample.
#[derive(Debug)]
enum Placement {
    /// Replace the cluster at this index with one that includes the sample.
    Replace(usize, DiffAndAtables),
    /// Start a new cluster.
    Append(DiffAndAtables),
}

/// The clusters kept for one minimum segment length. Never empty: with no
/// samples it holds a single empty cluster.
#[derive(Debug, Clone)]
pub struct ClusterBucket {
    min_length: usize,
    clusters: Vec<DiffAndAtables>,
}

impl ClusterBucket {
    fn new(min_length: usize, limits: &ThresholdConfig) -> Result<Self> {
        Ok(Self {
            min_length,
            clusters: vec![singleton(Vec::new(), min_length, limits)?],
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn clusters(&self) -> &[DiffAndAtables] {
        &self.clusters
    }

    /// Work out where `sample` goes without touching the bucket.
    fn place(&self, sample: &str, limits: &ThresholdConfig) -> Result<Placement> {
        if self.clusters.len() == 1 && self.clusters[0].is_empty() {
            let seeded = singleton(vec![sample.to_owned()], self.min_length, limits)?;
            return Ok(Placement::Replace(0, seeded));
        }

        let best = self
            .clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| (index, cluster.assess(sample)))
            .fold(None, |best: Option<(usize, Assessment)>, (index, assessment)| match best {
                Some((_, highest)) if highest.confidence >= assessment.confidence => best,
                _ => Some((index, assessment)),
            });

        let target = match best {
            Some((index, assessment)) if assessment.confidence >= limits.min_confidence => {
                let merged = match assessment.merged_literals {
                    Some(literals) => literals,
                    None => self.clusters[index]
                        .template_with(sample)
                        .map(|diff| diff.literal_char_count())
                        .unwrap_or(0),
                };
                (merged_coverage(sample, merged) > limits.min_equality).then_some(index)
            }
            _ => None,
        };

        match target {
            Some(index) => {
                let mut joined = self.clusters[index].clone();
                joined.add_strings(&[sample.to_owned()])?;
                Ok(Placement::Replace(index, joined))
            }
            None => Ok(Placement::Append(singleton(
                vec![sample.to_owned()],
                self.min_length,
                limits,
            )?)),
        }
    }

    fn apply(&mut self, placement: Placement) {
        match placement {
            Placement::Replace(index, cluster) => self.clusters[index] = cluster,
            Placement::Append(cluster) => {
                self.clusters.push(cluster);
                log::debug!(
                    "started cluster {} for segment length {}",
                    self.clusters.len(),
                    self.min_length
                );
            }
        }
    }

    fn confidence_for(&self, candidate: &str) -> f64 {
        self.clusters
            .iter()
            .map(|cluster| cluster_confidence(cluster, candidate))
            .fold(0.0, f64::max)
    }
}

fn singleton(
    corpus: Vec<String>,
    min_length: usize,
    limits: &ThresholdConfig,
) -> Result<DiffAndAtables> {
    DiffAndAtables::from_strings_with_limit(corpus, min_length, limits.matcher_size_limit)
}

/// Fraction of `sample` that would be literal template text after merging.
/// The empty sample always fits.
fn merged_coverage(sample: &str, merged_literals: usize) -> f64 {
    let length = sample.chars().count();
    if length == 0 {
        return 1.0;
    }
    merged_literals as f64 / length as f64
}

/// Credit covered characters in full and the rest at the cluster's own
/// confidence.
fn cluster_confidence(cluster: &DiffAndAtables, candidate: &str) -> f64 {
    let length = candidate.chars().count();
    if length == 0 {
        return 0.0;
    }

    let assessment = cluster.assess(candidate);
    let Some(matched) = assessment.merged_literals else {
        return 0.0;
    };
    let matched = matched.min(length);
    let unmatched = length - matched;

    ((matched as f64 + assessment.confidence * unmatched as f64) / length as f64).clamp(0.0, 1.0)
}

/// Cluster `samples` from scratch, one bucket per segment length.
fn cluster_all(samples: &[String], limits: &ThresholdConfig) -> Result<Vec<ClusterBucket>> {
    limits
        .segment_lengths
        .par_iter()
        .map(|&min_length| {
            let mut bucket = ClusterBucket::new(min_length, limits)?;
            for sample in samples {
                let placement = bucket.place(sample, limits)?;
                bucket.apply(placement);
            }
            Ok(bucket)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ThresholdedDiffAndAtables {
    limits: ThresholdConfig,
    buckets: Vec<ClusterBucket>,
    arrivals: Arrivals,
}

impl ThresholdedDiffAndAtables {
    pub fn new(limits: &ThresholdConfig) -> Result<Self> {
        Self::from_strings::<&str>(&[], limits)
    }

    pub fn from_strings<S: AsRef<str>>(samples: &[S], limits: &ThresholdConfig) -> Result<Self> {
        let mut arrivals = Arrivals::default();
        arrivals.admit_all(samples);

        Ok(Self {
            limits: limits.clone(),
            buckets: cluster_all(arrivals.as_slice(), limits)?,
            arrivals,
        })
    }

    pub fn buckets(&self) -> &[ClusterBucket] {
        &self.buckets
    }

    pub fn contains(&self, sample: &str) -> bool {
        self.arrivals.contains(sample)
    }

    /// Add `sample` to every bucket. Either every bucket takes it or, on
    /// error, none does.
    pub fn add_string(&mut self, sample: &str) -> Result<()> {
        if !self.arrivals.admits_at_tail(&[sample]) {
            let mut arrivals = self.arrivals.clone();
            arrivals.admit(sample);
            return self.recluster(arrivals);
        }

        let placements = self
            .buckets
            .par_iter()
            .map(|bucket| bucket.place(sample, &self.limits))
            .collect::<Result<Vec<_>>>()?;

        for (bucket, placement) in self.buckets.iter_mut().zip(placements) {
            bucket.apply(placement);
        }
        self.arrivals.admit(sample);
        Ok(())
    }

    /// Add each sample in turn. Stops at the first failure; samples before it
    /// stay added.
    pub fn add_strings<S: AsRef<str>>(&mut self, samples: &[S]) -> Result<()> {
        for sample in samples {
            self.add_string(sample.as_ref())?;
        }
        Ok(())
    }

    /// Remove the latest occurrence of `sample`. Returns `false` if there is
    /// none.
    pub fn remove_string(&mut self, sample: &str) -> Result<bool> {
        let mut arrivals = self.arrivals.clone();
        if !arrivals.withdraw(sample) {
            return Ok(false);
        }

        self.recluster(arrivals)?;
        Ok(true)
    }

    pub fn remove_strings<S: AsRef<str>>(&mut self, samples: &[S]) -> Result<()> {
        for sample in samples {
            self.remove_string(sample.as_ref())?;
        }
        Ok(())
    }

    fn recluster(&mut self, arrivals: Arrivals) -> Result<()> {
        let buckets = cluster_all(arrivals.as_slice(), &self.limits).inspect_err(|err| {
            log::warn!("keeping previous clusters after failed re-clustering: {err}");
        })?;

        log::debug!(
            "re-clustered {} samples into {} buckets",
            arrivals.len(),
            buckets.len()
        );
        self.buckets = buckets;
        self.arrivals = arrivals;
        Ok(())
    }

    /// Best score over every cluster of every bucket, in `[0, 1]`.
    pub fn confidence_for(&self, candidate: &str) -> f64 {
        self.buckets
            .iter()
            .map(|bucket| bucket.confidence_for(candidate))
            .fold(0.0, f64::max)
    }
}
