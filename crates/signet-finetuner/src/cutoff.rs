//! Small-weight cutoff and finiteness checks on network outputs.

use candle_core::Tensor;

use crate::{FinetunerError, Result};

/// Added to the row sum when renormalising after the cutoff.
pub const CUTOFF_EPS: f64 = 1e-6;

/// Zero every weight `<= cutoff` and renormalise each row.
///
/// A row with nothing above the cutoff comes back as all zeros.
pub fn apply_cutoff(weights: &Tensor, cutoff: f64) -> Result<Tensor> {
    let mask = weights.gt(cutoff)?.to_dtype(weights.dtype())?;
    let kept = (weights * mask)?;
    let denom = (kept.sum_keepdim(1)? + CUTOFF_EPS)?;
    Ok(kept.broadcast_div(&denom)?)
}

/// Fail with [`FinetunerError::NonFinite`] if any entry is NaN or infinite.
pub fn ensure_finite(t: &Tensor, stage: &'static str) -> Result<()> {
    let values = t
        .flatten_all()?
        .to_dtype(candle_core::DType::F32)?
        .to_vec1::<f32>()?;
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(FinetunerError::NonFinite { stage })
    }
}
