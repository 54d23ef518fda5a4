use signet_baseline::BaselineError;
use signet_common::SignetError;
use signet_config::ConfigError;
use signet_finetuner::FinetunerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No baseline guess given and no baseline decomposer attached")]
    MissingBaseline,

    #[error("An ensemble needs at least one member")]
    EmptyEnsemble,

    #[error("Models disagree on the number of signatures: {0}")]
    ClassMismatch(String),

    #[error("Expected a {expected} in {path}")]
    WrongModel { expected: &'static str, path: String },

    #[error(transparent)]
    Finetuner(#[from] FinetunerError),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error(transparent)]
    Common(#[from] SignetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}
