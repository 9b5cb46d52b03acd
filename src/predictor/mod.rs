//! Mailbox predictors
//!
//! Every predictor keeps one model per registered mailbox and scores a header
//! block against all of them at once. Mailboxes are registered (or reset) with
//! [`Predictor::consider_box`]; adding to or removing from a mailbox that was
//! never registered is an error.
//!
//! ## Module Structure
//!
//! - `cross_correlate`: model-free sliding alignment against stored headers
//! - `regex_and_atable`: one template model per minimum segment length
//! - `thresholded_regex_and_atable`: clustered templates with mistake feedback
//! - `mailbox`: the mailbox and message records predictors are loaded from

pub mod cross_correlate;
pub mod mailbox;
pub mod regex_and_atable;
pub mod thresholded_regex_and_atable;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

pub use cross_correlate::CrossCorrelate;
pub use mailbox::{MailMessage, Mailbox};
pub use regex_and_atable::RegexAndAtable;
pub use thresholded_regex_and_atable::ThresholdedRegexAndAtable;

/// Confidence per mailbox, each in `[0, 1]`.
pub type FolderScores = BTreeMap<String, f64>;

pub trait Predictor: Send + Sync {
    fn add_headers(&mut self, headers: &str, mailbox: &str) -> Result<()>;

    fn remove_headers(&mut self, headers: &str, mailbox: &str) -> Result<()>;

    /// Register `mailbox`, replacing any model already held for it.
    fn consider_box(&mut self, mailbox: &Mailbox) -> Result<()>;

    fn folder_score(&self, headers: &str) -> FolderScores;

    fn name(&self) -> &'static str;

    /// The best scoring mailbox, if any scores above zero. Ties go to the
    /// mailbox whose name sorts first.
    fn folder_for(&self, headers: &str) -> Option<String> {
        self.folder_score(headers)
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .fold(None, |best: Option<(String, f64)>, (name, score)| match best {
                Some((_, highest)) if highest >= score => best,
                _ => Some((name, score)),
            })
            .map(|(name, _)| name)
    }
}

pub(crate) fn unknown_mailbox(mailbox: &str) -> EngineError {
    EngineError::UnknownMailbox(mailbox.to_string())
}

/// The predictor variants.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PredictorKind {
    CrossCorrelate,
    RegexAndAtable,
    /// Thresholded regex and adjacency table.
    #[default]
    Traat,
}

impl PredictorKind {
    pub const ALL: [PredictorKind; 3] = [
        PredictorKind::CrossCorrelate,
        PredictorKind::RegexAndAtable,
        PredictorKind::Traat,
    ];
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PredictorKind::CrossCorrelate => "CrossCorrelate",
            PredictorKind::RegexAndAtable => "RegexAndAtable",
            PredictorKind::Traat => "Traat",
        })
    }
}

impl FromStr for PredictorKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "crosscorrelate" | "xcorr" => Ok(PredictorKind::CrossCorrelate),
            "regexandatable" | "regex" => Ok(PredictorKind::RegexAndAtable),
            "traat" | "thresholdedregexandatable" | "thresholdedregex" | "" => {
                Ok(PredictorKind::Traat)
            }
            _ => Err(EngineError::UnknownPredictor(s.to_string())),
        }
    }
}

/// A predictor of any kind, chosen at runtime.
#[derive(Debug, Clone)]
pub enum Engine {
    CrossCorrelate(CrossCorrelate),
    RegexAndAtable(RegexAndAtable),
    Traat(ThresholdedRegexAndAtable),
}

impl Engine {
    pub fn new(kind: PredictorKind, config: &EngineConfig) -> Self {
        match kind {
            PredictorKind::CrossCorrelate => {
                Engine::CrossCorrelate(CrossCorrelate::new(&config.cross_correlate))
            }
            PredictorKind::RegexAndAtable => {
                Engine::RegexAndAtable(RegexAndAtable::new(&config.regex))
            }
            PredictorKind::Traat => {
                Engine::Traat(ThresholdedRegexAndAtable::new(&config.threshold))
            }
        }
    }

    /// The predictor named by `config.predictor`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.predictor, config)
    }

    pub fn kind(&self) -> PredictorKind {
        match self {
            Engine::CrossCorrelate(_) => PredictorKind::CrossCorrelate,
            Engine::RegexAndAtable(_) => PredictorKind::RegexAndAtable,
            Engine::Traat(_) => PredictorKind::Traat,
        }
    }

    /// Mistake feedback is only understood by the thresholded predictor.
    pub fn as_traat_mut(&mut self) -> Option<&mut ThresholdedRegexAndAtable> {
        match self {
            Engine::Traat(traat) => Some(traat),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Predictor {
        match self {
            Engine::CrossCorrelate(p) => p,
            Engine::RegexAndAtable(p) => p,
            Engine::Traat(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Predictor {
        match self {
            Engine::CrossCorrelate(p) => p,
            Engine::RegexAndAtable(p) => p,
            Engine::Traat(p) => p,
        }
    }
}

impl Predictor for Engine {
    fn add_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        self.inner_mut().add_headers(headers, mailbox)
    }

    fn remove_headers(&mut self, headers: &str, mailbox: &str) -> Result<()> {
        self.inner_mut().remove_headers(headers, mailbox)
    }

    fn consider_box(&mut self, mailbox: &Mailbox) -> Result<()> {
        self.inner_mut().consider_box(mailbox)
    }

    fn folder_score(&self, headers: &str) -> FolderScores {
        self.inner().folder_score(headers)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

/// One instance of every predictor variant.
pub fn create_all(config: &EngineConfig) -> BTreeMap<PredictorKind, Engine> {
    PredictorKind::ALL
        .into_iter()
        .map(|kind| (kind, Engine::new(kind, config)))
        .collect()
}
