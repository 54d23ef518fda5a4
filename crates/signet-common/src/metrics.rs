//! Divergences and evaluation metrics over exposure batches.
//!
//! `jensen_shannon` and `kl_divergence` return scalar tensors so they can
//! be used directly as training losses. The remaining helpers return plain
//! numbers for reporting.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::{Result, SignetError};

/// Added inside logarithms so zero weights stay finite.
const LOG_EPS: f64 = 1e-6;

/// Weight above which a signature counts as present.
pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.01;

fn check_same_shape(a: &Tensor, b: &Tensor, what: &str) -> Result<()> {
    if a.dims() != b.dims() || a.rank() != 2 {
        return Err(SignetError::shape(what, a.dims(), b.dims()));
    }
    Ok(())
}

/// Batch-mean of Σ p·(log p − log q).
fn kl(p: &Tensor, q: &Tensor) -> Result<Tensor> {
    let log_ratio = ((p + LOG_EPS)?.log()? - (q + LOG_EPS)?.log()?)?;
    Ok((p * log_ratio)?.sum(1)?.mean(0)?)
}

/// KL(label ‖ prediction), averaged over the batch.
pub fn kl_divergence(predicted: &Tensor, label: &Tensor) -> Result<Tensor> {
    check_same_shape(predicted, label, "kl divergence operands")?;
    kl(label, predicted)
}

/// Jensen-Shannon divergence between predicted and true exposures, averaged over the batch.
pub fn jensen_shannon(predicted: &Tensor, label: &Tensor) -> Result<Tensor> {
    check_same_shape(predicted, label, "jensen-shannon operands")?;
    let m = ((predicted + label)? * 0.5)?;
    let js = ((kl(predicted, &m)? + kl(label, &m)?)? * 0.5)?;
    Ok(js)
}

/// Mean squared error over all entries.
pub fn mse(a: &Tensor, b: &Tensor) -> Result<f32> {
    check_same_shape(a, b, "mse operands")?;
    Ok((a - b)?.sqr()?.mean_all()?.to_scalar::<f32>()?)
}

/// Row-wise cosine similarity, averaged over the batch.
pub fn cosine_similarity(a: &Tensor, b: &Tensor) -> Result<f32> {
    check_same_shape(a, b, "cosine similarity operands")?;
    let dot = (a * b)?.sum(1)?;
    let norm_a = a.sqr()?.sum(1)?.sqrt()?;
    let norm_b = b.sqr()?.sum(1)?.sqrt()?;
    let denom = (norm_a * norm_b)?.clamp(1e-12f32, f32::MAX)?;
    Ok((dot / denom)?.mean(0)?.to_scalar::<f32>()?)
}

/// Presence/absence confusion counts over every (sample, signature) entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    pub precision: f32,
    pub recall: f32,
    pub accuracy: f32,
    pub f1: f32,
}

/// Compare which signatures are present (weight > `threshold`) in label and prediction.
pub fn classification_metrics(
    label: &Tensor,
    predicted: &Tensor,
    threshold: f32,
) -> Result<ClassificationMetrics> {
    check_same_shape(label, predicted, "classification operands")?;
    let label = label.to_vec2::<f32>()?;
    let predicted = predicted.to_vec2::<f32>()?;

    let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);
    for (l_row, p_row) in label.iter().zip(&predicted) {
        for (l, p) in l_row.iter().zip(p_row) {
            match (*l > threshold, *p > threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => tn += 1,
            }
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f32 / den as f32 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(ClassificationMetrics {
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
        true_negatives: tn,
        precision,
        recall,
        accuracy: ratio(tp + tn, tp + fp + fn_ + tn),
        f1,
    })
}
