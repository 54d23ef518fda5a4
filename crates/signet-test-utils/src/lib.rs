//! Deterministic fixtures shared by the SigNet test suites.
//!
//! Everything here is seeded so two calls with the same arguments return the
//! same data, which keeps model comparisons in tests exact.

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signet_common::{LabeledTable, SignatureMatrix, NUM_MUTATION_TYPES};

/// A seeded RNG.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A well-conditioned 96 × `k` signature matrix.
///
/// Signature `j` puts most of its mass on the contexts `i` with `i % k == j`
/// over a small random background, so columns are close to orthogonal.
pub fn synthetic_signatures(k: usize) -> SignatureMatrix {
    assert!((1..=NUM_MUTATION_TYPES).contains(&k), "k must be in 1..=96");
    let mut rng = seeded_rng(7);

    let mut columns = vec![vec![0f32; NUM_MUTATION_TYPES]; k];
    for (j, column) in columns.iter_mut().enumerate() {
        for (i, v) in column.iter_mut().enumerate() {
            let peak = if i % k == j { 1.0 } else { 0.0 };
            *v = peak + 0.05 * rng.gen::<f32>();
        }
        let total: f32 = column.iter().sum();
        column.iter_mut().for_each(|v| *v /= total);
    }

    let rows = (0..NUM_MUTATION_TYPES)
        .map(|i| columns.iter().map(|c| c[i]).collect())
        .collect();
    SignatureMatrix::new(
        mutation_types(),
        (0..k).map(|j| format!("SBS{}", j + 1)).collect(),
        rows,
    )
    .expect("synthetic signatures are valid")
}

/// Context labels in the usual `A[C>A]A` notation.
pub fn mutation_types() -> Vec<String> {
    let subs = ["C>A", "C>G", "C>T", "T>A", "T>C", "T>G"];
    let bases = ['A', 'C', 'G', 'T'];
    let mut out = Vec::with_capacity(NUM_MUTATION_TYPES);
    for sub in subs {
        for left in bases {
            for right in bases {
                out.push(format!("{left}[{sub}]{right}"));
            }
        }
    }
    out
}

/// The normalised spectrum generated by mixing signatures with `weights`.
pub fn mixture_spectrum(signatures: &SignatureMatrix, weights: &[f32]) -> Vec<f32> {
    let k = signatures.num_signatures();
    assert_eq!(weights.len(), k);
    let s = signatures.as_slice();
    (0..NUM_MUTATION_TYPES)
        .map(|i| (0..k).map(|j| s[i * k + j] * weights[j]).sum())
        .collect()
}

/// `rows` random exposure vectors over `k` signatures with `active` non-zero entries each.
pub fn random_exposures(rng: &mut StdRng, rows: usize, k: usize, active: usize) -> Vec<Vec<f32>> {
    (0..rows)
        .map(|_| {
            let mut w = vec![0f32; k];
            for _ in 0..active.min(k).max(1) {
                w[rng.gen_range(0..k)] += rng.gen_range(0.1f32..1.0);
            }
            let total: f32 = w.iter().sum();
            w.iter().map(|v| v / total).collect()
        })
        .collect()
}

/// A (rows, cols) tensor from nested rows.
pub fn tensor_from_rows(rows: &[Vec<f32>], device: &Device) -> Tensor {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_vec(flat, (rows.len(), cols), device).expect("rectangular rows")
}

/// Normalised spectra for the given exposures, as a (rows, 96) tensor.
pub fn spectrum_batch(signatures: &SignatureMatrix, exposures: &[Vec<f32>], device: &Device) -> Tensor {
    let rows: Vec<Vec<f32>> = exposures
        .iter()
        .map(|w| mixture_spectrum(signatures, w))
        .collect();
    tensor_from_rows(&rows, device)
}

/// A (rows, 1) burden column.
pub fn burden_column(values: &[f32], device: &Device) -> Tensor {
    Tensor::from_slice(values, (values.len(), 1), device).expect("burden column")
}

/// Integer mutation counts drawn from the mixture, as a labeled table.
pub fn count_table(
    rng: &mut StdRng,
    signatures: &SignatureMatrix,
    exposures: &[Vec<f32>],
    burden: f32,
) -> LabeledTable {
    let values = exposures
        .iter()
        .map(|w| {
            mixture_spectrum(signatures, w)
                .into_iter()
                .map(|p| (p * burden + rng.gen_range(0.0f32..1.0)).floor().max(0.0) + 1.0)
                .collect()
        })
        .collect();
    LabeledTable::new(
        (0..exposures.len()).map(|i| format!("sample_{i}")).collect(),
        mutation_types(),
        values,
    )
    .expect("count table")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures_are_deterministic() {
        let a = synthetic_signatures(10);
        let b = synthetic_signatures(10);
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_mutation_types_are_unique() {
        let mut types = mutation_types();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), NUM_MUTATION_TYPES);
    }

    #[test]
    fn test_mixture_is_normalised() {
        let s = synthetic_signatures(4);
        let x = mixture_spectrum(&s, &[0.1, 0.2, 0.3, 0.4]);
        assert!((x.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }
}
