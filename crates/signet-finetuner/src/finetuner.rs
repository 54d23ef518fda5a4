//! The finetuner capability and its two variants behind one handle.

use std::path::Path;

use candle_core::{Device, Tensor};
use tracing::{debug, info};

use crate::{
    load_model, ExposureNetwork, FineTunerLargeNumMut, FineTunerLowNumMut, FinetunerError,
    FinetunerInput, LoadedModel, Mode, ModelConfig, ModelKind, ModelWeights, Result,
};

/// Either finetuner variant.
#[derive(Debug)]
pub enum Finetuner {
    Low(FineTunerLowNumMut),
    Large(FineTunerLargeNumMut),
}

impl Finetuner {
    /// Build a freshly initialised network of the configured kind.
    pub fn new(config: ModelConfig, device: &Device) -> Result<Self> {
        match config.model_type {
            ModelKind::FineTunerLowNumMut => Ok(Self::Low(FineTunerLowNumMut::new(config, device)?)),
            ModelKind::FineTunerLargeNumMut => {
                Ok(Self::Large(FineTunerLargeNumMut::new(config, device)?))
            }
            ModelKind::Classifier => Err(FinetunerError::WrongModelKind {
                expected: "finetuner",
                found: ModelKind::Classifier,
            }),
        }
    }

    /// Load a saved finetuner directory.
    pub fn load(dir: impl AsRef<Path>, device: &Device) -> Result<Self> {
        match load_model(dir, device)? {
            LoadedModel::Finetuner(f) => Ok(f),
            LoadedModel::Classifier(c) => Err(FinetunerError::WrongModelKind {
                expected: "finetuner",
                found: c.config().model_type,
            }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.config().model_type
    }

    pub fn num_classes(&self) -> usize {
        self.config().num_classes
    }

    /// True when [`ExposureNetwork::forward`] needs `baseline_guess`.
    pub fn needs_baseline(&self) -> bool {
        matches!(self, Self::Large(_))
    }

    pub fn device(&self) -> &Device {
        self.weights().device()
    }

    /// Copy onto `device`, returning a new handle. The original stays usable.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        let moved = Self::new(self.config().clone(), device)?;
        moved.weights().copy_from(self.weights())?;
        debug!(from = ?self.device(), to = ?device, "moved finetuner");
        Ok(moved)
    }

    /// Drop the network and free its parameter memory.
    pub fn release(self) {
        debug!(kind = ?self.kind(), device = ?self.device(), "releasing finetuner");
    }
}

impl ExposureNetwork for Finetuner {
    fn config(&self) -> &ModelConfig {
        match self {
            Self::Low(n) => n.config(),
            Self::Large(n) => n.config(),
        }
    }

    fn weights(&self) -> &ModelWeights {
        match self {
            Self::Low(n) => n.weights(),
            Self::Large(n) => n.weights(),
        }
    }

    fn weights_mut(&mut self) -> &mut ModelWeights {
        match self {
            Self::Low(n) => n.weights_mut(),
            Self::Large(n) => n.weights_mut(),
        }
    }

    fn forward(&self, input: &FinetunerInput, mode: Mode) -> Result<Tensor> {
        match self {
            Self::Low(n) => n.forward(input, mode),
            Self::Large(n) => n.forward(input, mode),
        }
    }
}

/// Refine a batch of baseline guesses with the finetuner saved in `dir`.
///
/// The model is loaded on the CPU, applied once in evaluation mode and
/// released before returning.
pub fn refine_baseline_guess(dir: impl AsRef<Path>, input: &FinetunerInput) -> Result<Tensor> {
    let dir = dir.as_ref();
    let device = Device::Cpu;
    let finetuner = Finetuner::load(dir, &device)?;
    info!(path = %dir.display(), kind = ?finetuner.kind(), rows = input.rows(), "refining baseline guess");

    let refined = finetuner.forward(&input.to_device(&device)?, Mode::Eval);
    finetuner.release();
    refined
}
