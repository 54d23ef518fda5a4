//! Error types for the finetuner networks.

use signet_common::SignetError;
use thiserror::Error;

use crate::ModelKind;

pub type Result<T> = std::result::Result<T, FinetunerError>;

#[derive(Error, Debug)]
pub enum FinetunerError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Non-finite values in {stage}")]
    NonFinite { stage: &'static str },

    #[error("The {0} network needs a baseline guess")]
    MissingBaseline(&'static str),

    #[error("Cannot reconstruct model from {path}: {reason}")]
    CannotReconstruct { path: String, reason: String },

    #[error("Expected a {expected} model, found {found:?}")]
    WrongModelKind {
        expected: &'static str,
        found: ModelKind,
    },

    #[error("Parameter store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Common(#[from] SignetError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
