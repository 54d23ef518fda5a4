use candle_core::{Device, Tensor};
use signet_common::spectrum::{burden_column, check_exposure_batch, check_spectrum_batch};

use crate::Result;

/// One batch of network inputs.
///
/// `mutation_dist` is (B, 96), `num_mut` is (B, 1) and `baseline_guess`,
/// when present, is (B, K).
#[derive(Debug, Clone)]
pub struct FinetunerInput {
    pub mutation_dist: Tensor,
    pub baseline_guess: Option<Tensor>,
    pub num_mut: Tensor,
}

impl FinetunerInput {
    /// Validates shapes and normalises `num_mut` to a column.
    pub fn new(mutation_dist: Tensor, num_mut: Tensor) -> Result<Self> {
        let rows = check_spectrum_batch(&mutation_dist)?;
        let num_mut = burden_column(&num_mut, rows)?;
        Ok(Self {
            mutation_dist,
            baseline_guess: None,
            num_mut,
        })
    }

    pub fn with_baseline(mut self, baseline_guess: Tensor) -> Result<Self> {
        let rows = self.rows();
        let k = baseline_guess.dims().get(1).copied().unwrap_or(0);
        check_exposure_batch(&baseline_guess, rows, k)?;
        self.baseline_guess = Some(baseline_guess);
        Ok(self)
    }

    pub fn rows(&self) -> usize {
        self.mutation_dist.dims()[0]
    }

    pub fn device(&self) -> &Device {
        self.mutation_dist.device()
    }

    /// The sub-batch made of `rows`, in the given order.
    pub fn select_rows(&self, rows: &[u32]) -> Result<Self> {
        let ids = Tensor::from_slice(rows, rows.len(), self.device())?;
        Ok(Self {
            mutation_dist: self.mutation_dist.index_select(&ids, 0)?,
            baseline_guess: self
                .baseline_guess
                .as_ref()
                .map(|b| b.index_select(&ids, 0))
                .transpose()?,
            num_mut: self.num_mut.index_select(&ids, 0)?,
        })
    }

    /// Copy every tensor onto `device`.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        Ok(Self {
            mutation_dist: self.mutation_dist.to_device(device)?,
            baseline_guess: self
                .baseline_guess
                .as_ref()
                .map(|b| b.to_device(device))
                .transpose()?,
            num_mut: self.num_mut.to_device(device)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_select_rows_keeps_order() {
        let dist = Tensor::arange(0f32, 4.0 * 96.0, &Device::Cpu)
            .unwrap()
            .reshape((4, 96))
            .unwrap();
        let num_mut = Tensor::new(&[10f32, 20.0, 30.0, 40.0], &Device::Cpu).unwrap();
        let input = FinetunerInput::new(dist, num_mut).unwrap();

        let sub = input.select_rows(&[3, 1]).unwrap();
        assert_eq!(sub.num_mut.to_vec2::<f32>().unwrap(), vec![vec![40.0], vec![20.0]]);
        assert_eq!(sub.mutation_dist.dims(), &[2, 96]);
        assert!(sub.baseline_guess.is_none());
    }

    #[test]
    fn test_rejects_mismatched_baseline() {
        let dist = Tensor::zeros((2, 96), DType::F32, &Device::Cpu).unwrap();
        let num_mut = Tensor::ones((2, 1), DType::F32, &Device::Cpu).unwrap();
        let guess = Tensor::zeros((3, 5), DType::F32, &Device::Cpu).unwrap();
        let input = FinetunerInput::new(dist, num_mut).unwrap();
        assert!(input.with_baseline(guess).is_err());
    }
}
