//! Header pattern learning and confidence scoring for mail filing
//!
//! Each mailbox learns the shape of the header blocks filed into it. A new
//! header block is scored against every mailbox's model and the scores are
//! used to recommend where it belongs.
//!
//! ## Module Structure
//!
//! - `diff`: header templates, their generalization and matching
//! - `model`: transition tables and the template models built on them
//! - `predictor`: per-mailbox predictors behind one interface
//! - `config`: environment driven configuration
//! - `error`: error types

pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod predictor;

pub use config::EngineConfig;
pub use diff::{Diff, DiffElement, DiffMatcher, generalize, string_diff};
pub use error::{DiffError, EngineError, Result, SnapshotError};
pub use model::{AdjacencyTable, DiffAndAtables, ThresholdedDiffAndAtables};
pub use predictor::{
    Engine, FolderScores, MailMessage, Mailbox, Predictor, PredictorKind, create_all,
};
