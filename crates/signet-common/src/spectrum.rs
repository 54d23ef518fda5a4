//! Mutation spectrum normalisation and shape checks.
//!
//! A spectrum is a row of 96 non-negative counts, one per trinucleotide
//! substitution context. Models never see raw counts: they see the row
//! divided by its sum, plus the sum itself as the mutation burden.

use candle_core::{DType, Tensor};

use crate::{Result, SignetError};

/// Number of trinucleotide mutation-type contexts.
pub const NUM_MUTATION_TYPES: usize = 96;

/// Tolerance used when checking that a normalised row sums to one.
pub const SUM_TOLERANCE: f32 = 1e-4;

/// A batch of normalised spectra with the burden of each row.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    /// (batch, 96), each row sums to 1
    pub mutation_dist: Tensor,
    /// (batch, 1), total mutation count per row
    pub num_mut: Tensor,
}

/// Normalise raw counts into distributions and burdens.
///
/// Fails on negative or non-finite counts and on rows without mutations,
/// since those have no defined distribution.
pub fn normalize_counts(counts: &Tensor) -> Result<NormalizedBatch> {
    let counts = counts.to_dtype(DType::F32)?;
    let rows = check_spectrum_batch(&counts)?;
    if rows == 0 {
        return Err(SignetError::InvalidInput("empty count table".to_string()));
    }

    let flat = counts.flatten_all()?.to_vec1::<f32>()?;
    if let Some(bad) = flat.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(SignetError::InvalidInput(format!(
            "mutation counts must be finite and non-negative, found {bad}"
        )));
    }

    let num_mut = counts.sum_keepdim(1)?;
    let burdens = num_mut.flatten_all()?.to_vec1::<f32>()?;
    if let Some(row) = burdens.iter().position(|b| *b <= 0.0) {
        return Err(SignetError::InvalidInput(format!(
            "row {row} has no mutations and cannot be normalised"
        )));
    }

    let mutation_dist = counts.broadcast_div(&num_mut)?;
    Ok(NormalizedBatch {
        mutation_dist,
        num_mut,
    })
}

/// Validate a (batch, 96) spectrum tensor and return its batch size.
pub fn check_spectrum_batch(mutation_dist: &Tensor) -> Result<usize> {
    match mutation_dist.dims() {
        [rows, NUM_MUTATION_TYPES] => Ok(*rows),
        dims => Err(SignetError::shape(
            "mutation distribution",
            ("batch", NUM_MUTATION_TYPES),
            dims,
        )),
    }
}

/// Validate a (batch, k) exposure tensor.
pub fn check_exposure_batch(weights: &Tensor, rows: usize, num_classes: usize) -> Result<()> {
    match weights.dims() {
        [r, k] if *r == rows && *k == num_classes => Ok(()),
        dims => Err(SignetError::shape("exposure batch", (rows, num_classes), dims)),
    }
}

/// Accept a burden vector shaped (batch,) or (batch, 1) and return it as a column.
pub fn burden_column(num_mut: &Tensor, rows: usize) -> Result<Tensor> {
    match num_mut.dims() {
        [r] if *r == rows => Ok(num_mut.reshape((rows, 1))?),
        [r, 1] if *r == rows => Ok(num_mut.clone()),
        dims => Err(SignetError::shape("mutation burden", (rows, 1), dims)),
    }
}

/// Check that every row of a (batch, n) tensor sums to one within `tolerance`.
pub fn rows_sum_to_one(t: &Tensor, tolerance: f32) -> Result<bool> {
    let sums = t.sum(1)?.to_vec1::<f32>()?;
    Ok(sums.iter().all(|s| (s - 1.0).abs() <= tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn counts(rows: &[[f32; 2]]) -> Tensor {
        // Spread two values across the 96 contexts: first half and second half.
        let mut data = Vec::new();
        for row in rows {
            for i in 0..NUM_MUTATION_TYPES {
                data.push(if i < 48 { row[0] } else { row[1] });
            }
        }
        Tensor::from_vec(data, (rows.len(), NUM_MUTATION_TYPES), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_normalize_counts_sums_to_one() {
        let batch = normalize_counts(&counts(&[[1.0, 3.0], [10.0, 0.0]])).unwrap();
        assert!(rows_sum_to_one(&batch.mutation_dist, SUM_TOLERANCE).unwrap());

        let burdens = batch.num_mut.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(burdens, vec![48.0 + 144.0, 480.0]);
    }

    #[test]
    fn test_normalize_rejects_empty_row() {
        let err = normalize_counts(&counts(&[[1.0, 1.0], [0.0, 0.0]])).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_normalize_rejects_negative_counts() {
        assert!(normalize_counts(&counts(&[[1.0, -1.0]])).is_err());
    }

    #[test]
    fn test_spectrum_shape_check() {
        let bad = Tensor::zeros((3, 95), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            check_spectrum_batch(&bad),
            Err(SignetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_burden_column_accepts_vector() {
        let v = Tensor::new(&[1.0f32, 2.0, 3.0], &Device::Cpu).unwrap();
        let col = burden_column(&v, 3).unwrap();
        assert_eq!(col.dims(), &[3, 1]);
        assert!(burden_column(&v, 4).is_err());
    }
}
