use crate::diff::{DEFAULT_MATCHER_SIZE_LIMIT, DEFAULT_MIN_LENGTH};
use crate::predictor::PredictorKind;
use std::env;
use std::str::FromStr;

pub const DEFAULT_REGEX_SEGMENT_LENGTHS: [usize; 13] =
    [5, 6, 7, 8, 9, 10, 11, 13, 17, 19, 23, 29, 31];
pub const DEFAULT_TRAAT_SEGMENT_LENGTHS: [usize; 3] = [2, 4, 8];
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MIN_EQUALITY: f64 = 0.02;
pub const DEFAULT_XCORR_BINS: usize = 100;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(default)
}

fn env_matcher_size_limit() -> usize {
    env_usize("MAILFAMILIAR_MATCHER_SIZE_LIMIT", DEFAULT_MATCHER_SIZE_LIMIT)
}

fn env_segment_lengths(key: &str, default: &[usize]) -> Vec<usize> {
    match env::var(key) {
        Ok(value) => parse_segment_lengths(&value, default),
        Err(_) => default.to_vec(),
    }
}

/// Parse a comma separated list of minimum segment lengths. Entries that are
/// not numbers or are below the smallest usable length are dropped.
pub fn parse_segment_lengths(value: &str, default: &[usize]) -> Vec<usize> {
    let mut lengths = Vec::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<usize>() {
            Ok(length) if length >= DEFAULT_MIN_LENGTH => {
                if !lengths.contains(&length) {
                    lengths.push(length);
                }
            }
            _ => log::warn!(
                "ignoring segment length {entry:?}: must be an integer of at least {DEFAULT_MIN_LENGTH}"
            ),
        }
    }

    if lengths.is_empty() {
        default.to_vec()
    } else {
        lengths
    }
}

/// Minimum segment lengths averaged over by the regex predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexAndAtableConfig {
    pub segment_lengths: Vec<usize>,
    /// Compiled regex budget for each template, in bytes.
    pub matcher_size_limit: usize,
}

impl RegexAndAtableConfig {
    pub fn from_env() -> Self {
        Self {
            segment_lengths: env_segment_lengths(
                "MAILFAMILIAR_REGEX_SEGMENT_LENGTHS",
                &DEFAULT_REGEX_SEGMENT_LENGTHS,
            ),
            matcher_size_limit: env_matcher_size_limit(),
        }
    }

    /// The built-in values, ignoring the environment.
    pub fn builtin() -> Self {
        Self {
            segment_lengths: DEFAULT_REGEX_SEGMENT_LENGTHS.to_vec(),
            matcher_size_limit: DEFAULT_MATCHER_SIZE_LIMIT,
        }
    }
}

impl Default for RegexAndAtableConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Clustering thresholds for the thresholded model.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    /// One cluster bucket per length.
    pub segment_lengths: Vec<usize>,
    /// Best-cluster confidence below which a sample starts its own cluster.
    pub min_confidence: f64,
    /// Literal coverage a merge must exceed to be kept.
    pub min_equality: f64,
    pub matcher_size_limit: usize,
}

impl ThresholdConfig {
    pub fn from_env() -> Self {
        Self {
            segment_lengths: env_segment_lengths(
                "MAILFAMILIAR_TRAAT_SEGMENT_LENGTHS",
                &DEFAULT_TRAAT_SEGMENT_LENGTHS,
            ),
            min_confidence: env_f64("MAILFAMILIAR_TRAAT_MIN_CONFIDENCE", DEFAULT_MIN_CONFIDENCE),
            min_equality: env_f64("MAILFAMILIAR_TRAAT_MIN_EQUALITY", DEFAULT_MIN_EQUALITY),
            matcher_size_limit: env_matcher_size_limit(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            segment_lengths: DEFAULT_TRAAT_SEGMENT_LENGTHS.to_vec(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_equality: DEFAULT_MIN_EQUALITY,
            matcher_size_limit: DEFAULT_MATCHER_SIZE_LIMIT,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossCorrelateConfig {
    /// Histogram bins used to find the modal alignment score.
    pub bins: usize,
}

impl CrossCorrelateConfig {
    pub fn from_env() -> Self {
        Self {
            bins: env_usize("MAILFAMILIAR_XCORR_BINS", DEFAULT_XCORR_BINS).max(1),
        }
    }

    pub fn builtin() -> Self {
        Self {
            bins: DEFAULT_XCORR_BINS,
        }
    }
}

impl Default for CrossCorrelateConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Runtime configuration for the scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub predictor: PredictorKind,
    pub regex: RegexAndAtableConfig,
    pub threshold: ThresholdConfig,
    pub cross_correlate: CrossCorrelateConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let predictor = env::var("MAILFAMILIAR_PREDICTOR")
            .ok()
            .and_then(|value| match PredictorKind::from_str(&value) {
                Ok(kind) => Some(kind),
                Err(err) => {
                    log::warn!("{err}, using the default predictor");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            predictor,
            regex: RegexAndAtableConfig::from_env(),
            threshold: ThresholdConfig::from_env(),
            cross_correlate: CrossCorrelateConfig::from_env(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            predictor: PredictorKind::default(),
            regex: RegexAndAtableConfig::builtin(),
            threshold: ThresholdConfig::builtin(),
            cross_correlate: CrossCorrelateConfig::builtin(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
