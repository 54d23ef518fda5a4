//! Parameter storage for one network.

use std::collections::BTreeMap;
use std::path::Path;

use candle_core::{DType, Device, Var};
use candle_nn::{VarBuilder, VarMap};

use crate::{FinetunerError, Result};

/// A network's trainable parameters and the device they live on.
pub struct ModelWeights {
    varmap: VarMap,
    device: Device,
}

impl std::fmt::Debug for ModelWeights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelWeights")
            .field("device", &self.device)
            .field("tensors", &self.varmap.all_vars().len())
            .finish()
    }
}

impl ModelWeights {
    pub fn new(device: &Device) -> Self {
        Self {
            varmap: VarMap::new(),
            device: device.clone(),
        }
    }

    /// A builder that registers freshly initialised parameters in this store.
    pub fn builder(&self) -> VarBuilder<'static> {
        VarBuilder::from_varmap(&self.varmap, DType::F32, &self.device)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn all_vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn num_parameters(&self) -> usize {
        self.varmap.all_vars().iter().map(|v| v.elem_count()).sum()
    }

    /// Write all tensors to a safetensors file.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Overwrite the registered tensors with the ones stored at `path`.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    /// Copy every tensor of `other` into this store, moving it onto this
    /// store's device.
    pub fn copy_from(&self, other: &ModelWeights) -> Result<()> {
        let source = other
            .varmap
            .data()
            .lock()
            .map_err(|_| FinetunerError::Poisoned)?;
        let target = self
            .varmap
            .data()
            .lock()
            .map_err(|_| FinetunerError::Poisoned)?;

        for (name, var) in target.iter() {
            let src = source.get(name).ok_or_else(|| {
                FinetunerError::InvalidConfig(format!("source weights lack tensor {name}"))
            })?;
            var.set(&src.as_tensor().to_device(&self.device)?)?;
        }
        Ok(())
    }

    /// Flattened host copies of every tensor, keyed by name.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<f32>>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| FinetunerError::Poisoned)?;
        data.iter()
            .map(|(name, var)| {
                let values = var.as_tensor().flatten_all()?.to_vec1::<f32>()?;
                Ok((name.clone(), values))
            })
            .collect()
    }
}
