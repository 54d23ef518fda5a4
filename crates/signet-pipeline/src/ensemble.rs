use std::sync::Arc;

use candle_core::Tensor;
use signet_finetuner::FinetunerInput;
use tracing::debug;

use crate::{ExposureModel, PipelineError, Result};

/// Element-wise mean over independently trained members.
#[derive(Clone)]
pub struct FinetunerEnsemble {
    members: Vec<Arc<dyn ExposureModel>>,
}

impl std::fmt::Debug for FinetunerEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinetunerEnsemble")
            .field("members", &self.members.len())
            .finish()
    }
}

impl FinetunerEnsemble {
    pub fn new(members: Vec<Arc<dyn ExposureModel>>) -> Result<Self> {
        let first = members.first().ok_or(PipelineError::EmptyEnsemble)?;
        let k = first.num_classes();
        if let Some(other) = members.iter().find(|m| m.num_classes() != k) {
            return Err(PipelineError::ClassMismatch(format!(
                "ensemble members have {k} and {} signatures",
                other.num_classes()
            )));
        }
        Ok(Self { members })
    }

    /// Always at least one.
    pub fn num_members(&self) -> usize {
        self.members.len()
    }
}

impl ExposureModel for FinetunerEnsemble {
    fn num_classes(&self) -> usize {
        self.members[0].num_classes()
    }

    fn predict(&self, input: &FinetunerInput) -> Result<Tensor> {
        if let [only] = self.members.as_slice() {
            return only.predict(input);
        }
        let outputs = self
            .members
            .iter()
            .map(|m| m.predict(input))
            .collect::<Result<Vec<_>>>()?;
        debug!(members = outputs.len(), rows = input.rows(), "averaging ensemble");
        Ok(Tensor::stack(&outputs, 0)?.mean(0)?)
    }
}
