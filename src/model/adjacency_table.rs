//! Order-1 character transition model
//!
//! An adjacency table counts every adjacent character pair seen across a set
//! of sample strings, with synthetic `START` and `FINISH` tokens standing in
//! for the string boundaries. The confidence for a candidate is the mean
//! conditional probability of each of its transitions.
//!
//! ## Snapshot format
//!
//! [`AdjacencyTableSnapshot`] is the persisted form:
//!
//! ```json
//! {"table": {"STARTa": 1, "ab": 1, "bFINISH": 1}, "totalSampleLength": 2, "totalSamples": 1}
//! ```
//!
//! Transition keys are the two tokens written back to back. Reconstructing a
//! table from a snapshot and exporting it again yields an identical snapshot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

pub const START: &str = "START";
pub const FINISH: &str = "FINISH";

/// One side of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    Start,
    Char(char),
    Finish,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Start => f.write_str(START),
            Token::Char(c) => write!(f, "{c}"),
            Token::Finish => f.write_str(FINISH),
        }
    }
}

type Transition = (Token, Token);

fn transition_key((from, to): Transition) -> String {
    format!("{from}{to}")
}

fn parse_transition_key(key: &str) -> Result<Transition, SnapshotError> {
    let mut chars = key.chars();
    if let (Some(first), Some(second), None) = (chars.next(), chars.next(), chars.next()) {
        return Ok((Token::Char(first), Token::Char(second)));
    }

    let single = |rest: &str| {
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    };

    if let Some(rest) = key.strip_prefix(START) {
        if rest == FINISH {
            return Ok((Token::Start, Token::Finish));
        }
        if let Some(c) = single(rest) {
            return Ok((Token::Start, Token::Char(c)));
        }
    }

    if let Some(c) = key.strip_suffix(FINISH).and_then(single) {
        return Ok((Token::Char(c), Token::Finish));
    }

    Err(SnapshotError::InvalidKey(key.to_string()))
}

/// Transitions of `sample` including both boundary tokens.
fn transitions(sample: &str) -> impl Iterator<Item = Transition> + '_ {
    let tokens = std::iter::once(Token::Start)
        .chain(sample.chars().map(Token::Char))
        .chain(std::iter::once(Token::Finish));
    let following = tokens.clone().skip(1);
    tokens.zip(following)
}

/// Persisted form of an [`AdjacencyTable`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjacencyTableSnapshot {
    pub table: BTreeMap<String, u64>,
    pub total_sample_length: u64,
    pub total_samples: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyTable {
    /// Count per transition; counts are always positive.
    counts: BTreeMap<Transition, u64>,
    /// Total outgoing count per first token, the denominator of `probability`.
    outgoing: BTreeMap<Token, u64>,
    total_sample_length: u64,
    total_samples: u64,
}

impl AdjacencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_string(sample: &str) -> Self {
        let mut table = Self::new();
        table.add_string(sample);
        table
    }

    /// Fold a set of persisted per-message snapshots into one table.
    pub fn from_snapshots<'a>(
        snapshots: impl IntoIterator<Item = &'a AdjacencyTableSnapshot>,
    ) -> Result<Self, SnapshotError> {
        let mut table = Self::new();
        for snapshot in snapshots {
            table.add_table(&Self::try_from(snapshot.clone())?);
        }
        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: AdjacencyTableSnapshot = serde_json::from_str(json)?;
        Self::try_from(snapshot)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn total_sample_length(&self) -> u64 {
        self.total_sample_length
    }

    /// Count `sample`'s transitions. The empty string contributes the single
    /// `START` to `FINISH` transition.
    pub fn add_string(&mut self, sample: &str) {
        for transition in transitions(sample) {
            self.add_at(transition, 1);
        }
        self.total_sample_length += sample.chars().count() as u64;
        self.total_samples += 1;
    }

    /// Exact inverse of [`add_string`](Self::add_string).
    pub fn subtract_string(&mut self, sample: &str) {
        for transition in transitions(sample) {
            self.subtract_at(transition, 1);
        }
        self.total_sample_length = self
            .total_sample_length
            .saturating_sub(sample.chars().count() as u64);
        self.total_samples = self.total_samples.saturating_sub(1);
    }

    pub fn add_table(&mut self, other: &AdjacencyTable) {
        for (&transition, &count) in &other.counts {
            self.add_at(transition, count);
        }
        self.total_sample_length += other.total_sample_length;
        self.total_samples += other.total_samples;
    }

    pub fn subtract_table(&mut self, other: &AdjacencyTable) {
        for (&transition, &count) in &other.counts {
            self.subtract_at(transition, count);
        }
        self.total_sample_length = self
            .total_sample_length
            .saturating_sub(other.total_sample_length);
        self.total_samples = self.total_samples.saturating_sub(other.total_samples);
    }

    /// Conditional probability of `to` following `from`, 0 if never seen.
    pub fn probability(&self, from: Token, to: Token) -> f64 {
        let Some(&count) = self.counts.get(&(from, to)) else {
            return 0.0;
        };

        match self.outgoing.get(&from) {
            Some(&total) if total > 0 => count as f64 / total as f64,
            _ => 0.0,
        }
    }

    /// Mean transition probability over the `len + 1` transitions of `candidate`.
    pub fn confidence_for(&self, candidate: &str) -> f64 {
        let mut cumulative = 0.0;
        let mut steps = 0usize;

        for (from, to) in transitions(candidate) {
            cumulative += self.probability(from, to);
            steps += 1;
        }

        cumulative / steps as f64
    }

    pub fn snapshot(&self) -> AdjacencyTableSnapshot {
        AdjacencyTableSnapshot {
            table: self
                .counts
                .iter()
                .map(|(&transition, &count)| (transition_key(transition), count))
                .collect(),
            total_sample_length: self.total_sample_length,
            total_samples: self.total_samples,
        }
    }

    fn add_at(&mut self, transition: Transition, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(transition).or_insert(0) += count;
        *self.outgoing.entry(transition.0).or_insert(0) += count;
    }

    fn subtract_at(&mut self, transition: Transition, count: u64) {
        let Some(existing) = self.counts.get_mut(&transition) else {
            return;
        };

        let removed = count.min(*existing);
        *existing -= removed;
        if *existing == 0 {
            self.counts.remove(&transition);
        }

        if let Some(total) = self.outgoing.get_mut(&transition.0) {
            *total = total.saturating_sub(removed);
            if *total == 0 {
                self.outgoing.remove(&transition.0);
            }
        }
    }
}

impl TryFrom<AdjacencyTableSnapshot> for AdjacencyTable {
    type Error = SnapshotError;

    fn try_from(snapshot: AdjacencyTableSnapshot) -> Result<Self, Self::Error> {
        if !snapshot.table.is_empty() && snapshot.total_samples == 0 {
            return Err(SnapshotError::MissingSamples);
        }

        let mut table = Self::new();
        for (key, count) in snapshot.table {
            if count == 0 {
                return Err(SnapshotError::ZeroCount(key));
            }
            table.add_at(parse_transition_key(&key)?, count);
        }
        table.total_sample_length = snapshot.total_sample_length;
        table.total_samples = snapshot.total_samples;

        Ok(table)
    }
}
