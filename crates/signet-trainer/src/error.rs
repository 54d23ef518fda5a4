use signet_baseline::BaselineError;
use signet_common::SignetError;
use signet_config::ConfigError;
use signet_finetuner::FinetunerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainerError>;

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Invalid training data: {0}")]
    Data(String),

    #[error("Loss became non-finite at step {step}")]
    NonFiniteLoss { step: usize },

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
