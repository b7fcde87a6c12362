use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by melvad-core.
#[derive(Debug, Error)]
pub enum VadError {
    /// Zero/invalid feature count, zero sample rate or frame duration, etc.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The optimizer rejected the hyperparameters or training set.
    #[error("invalid SVM parameters: {0}")]
    Parameter(String),

    #[error("model persistence error at {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A filter collected no (or non-finite) energy and the policy forbids flooring it.
    #[error("degenerate input: filter {filter} of frame {frame} has no usable energy")]
    DegenerateInput { frame: usize, filter: usize },

    #[error("classifier holds no model; train or load one first")]
    ModelNotReady,

    #[error("model was trained without probability estimates")]
    ProbabilityUnavailable,

    #[error("audio decode error: {0}")]
    AudioDecode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VadError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VadError>;
