use thiserror::Error;

/// Errors raised by the string alignment functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("minimum segment length must be at least 2, but was {min_length}")]
    InvalidArgument { min_length: usize },
}

/// Validation failures when rebuilding an adjacency table from a persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot split transition key {0:?}")]
    InvalidKey(String),

    #[error("transition {0:?} has a zero count")]
    ZeroCount(String),

    #[error("snapshot holds transitions but records no samples")]
    MissingSamples,

    #[error("malformed snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the learning engine and its predictors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("mailbox {0:?} has not been registered")]
    UnknownMailbox(String),

    #[error("model rebuild failed: {reason}")]
    RebuildFailed { reason: String },

    #[error("unknown predictor {0:?}")]
    UnknownPredictor(String),
}

impl EngineError {
    pub fn rebuild_failed(reason: impl Into<String>) -> Self {
        EngineError::RebuildFailed {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
