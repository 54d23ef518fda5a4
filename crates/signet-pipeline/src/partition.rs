//! Splitting a batch in two and putting the results back in input order.

use candle_core::{DType, Tensor};
use signet_common::SignetError;
use signet_finetuner::FinetunerInput;
use tracing::debug;

use crate::Result;

/// Which side of a split a sub-batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    First,
    Second,
}

/// Row indices of both sides of a split, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub first: Vec<u32>,
    pub second: Vec<u32>,
}

impl Partition {
    /// Rows with `true` go to [`Branch::First`].
    pub fn from_mask(mask: &[bool]) -> Self {
        let (first, second): (Vec<u32>, Vec<u32>) =
            (0..mask.len() as u32).partition(|&i| mask[i as usize]);
        Self { first, second }
    }

    pub fn rows(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// Reassemble branch outputs so row `i` of the result belongs to input row `i`.
    ///
    /// `outputs` holds the outputs of the non-empty branches, first branch
    /// before second.
    pub fn scatter(&self, outputs: &[Tensor]) -> Result<Tensor> {
        let stacked = Tensor::cat(outputs, 0)?;
        let order: Vec<u32> = self.first.iter().chain(&self.second).copied().collect();

        let mut inverse = vec![0u32; order.len()];
        for (position, &row) in order.iter().enumerate() {
            inverse[row as usize] = position as u32;
        }
        let ids = Tensor::from_vec(inverse, order.len(), stacked.device())?;
        Ok(stacked.index_select(&ids, 0)?)
    }
}

/// Run `run` on each non-empty side of the split described by `mask` and
/// return the outputs in input row order.
///
/// `mask` needs one entry per input row. An empty side is never passed to
/// `run`. An empty batch yields a (0, `num_classes`) tensor.
pub fn route_rows<F>(
    input: &FinetunerInput,
    mask: &[bool],
    num_classes: usize,
    mut run: F,
) -> Result<Tensor>
where
    F: FnMut(Branch, &FinetunerInput) -> Result<Tensor>,
{
    if mask.len() != input.rows() {
        return Err(SignetError::shape("routing mask", input.rows(), mask.len()).into());
    }
    let partition = Partition::from_mask(mask);
    debug!(
        first = partition.first.len(),
        second = partition.second.len(),
        "partitioned batch"
    );
    if partition.rows() == 0 {
        return Ok(Tensor::zeros((0, num_classes), DType::F32, input.device())?);
    }

    let mut outputs = Vec::with_capacity(2);
    for (branch, rows) in [(Branch::First, &partition.first), (Branch::Second, &partition.second)] {
        if rows.is_empty() {
            continue;
        }
        outputs.push(run(branch, &input.select_rows(rows)?)?);
    }
    partition.scatter(&outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_from_mask() {
        let p = Partition::from_mask(&[true, false, true, false, false]);
        assert_eq!(p.first, vec![0, 2]);
        assert_eq!(p.second, vec![1, 3, 4]);
    }

    #[test]
    fn test_scatter_restores_order() {
        let p = Partition::from_mask(&[false, true, false, true]);
        // First branch produced rows 1 and 3, second rows 0 and 2.
        let first = Tensor::new(&[[1f32], [3.0]], &Device::Cpu).unwrap();
        let second = Tensor::new(&[[0f32], [2.0]], &Device::Cpu).unwrap();
        let out = p.scatter(&[first, second]).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(out, vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_route_rows_skips_empty_branch() {
        let dist = Tensor::zeros((3, 96), DType::F32, &Device::Cpu).unwrap();
        let num_mut = Tensor::new(&[1f32, 2.0, 3.0], &Device::Cpu).unwrap();
        let input = FinetunerInput::new(dist, num_mut).unwrap();

        let mut calls = Vec::new();
        let out = route_rows(&input, &[true, true, true], 1, |branch, sub| {
            calls.push((branch, sub.rows()));
            Ok(sub.num_mut.clone())
        })
        .unwrap();
        assert_eq!(calls, vec![(Branch::First, 3)]);
        assert_eq!(out.to_vec2::<f32>().unwrap(), vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_route_rows_rejects_short_mask() {
        let dist = Tensor::zeros((3, 96), DType::F32, &Device::Cpu).unwrap();
        let num_mut = Tensor::new(&[1f32, 2.0, 3.0], &Device::Cpu).unwrap();
        let input = FinetunerInput::new(dist, num_mut).unwrap();

        let err = route_rows(&input, &[true, false], 1, |_, sub| Ok(sub.num_mut.clone()))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::PipelineError::Common(SignetError::ShapeMismatch { .. })
        ));
    }
}
