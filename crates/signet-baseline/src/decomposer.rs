//! Simplex-constrained least squares solved per sample on a worker pool.

use std::sync::Arc;
use std::time::Instant;

use candle_core::{Device, Tensor};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use signet_common::{spectrum::check_spectrum_batch, SignatureMatrix, NUM_MUTATION_TYPES};
use signet_config::FailurePolicy;
use tracing::{debug, info, warn};

use crate::simplex::project_onto_simplex;
use crate::{BaselineError, Result, SolverError};

/// Power-iteration rounds used to bound the gradient's Lipschitz constant.
const POWER_ITERATIONS: usize = 200;

/// Stopping rule for the per-sample solver.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Converged once no weight moves by more than this in one step
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-8,
        }
    }
}

/// Result of a batch decomposition, rows in input order.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub weights: Vec<Vec<f32>>,
    /// Rows whose solve failed and received a uniform exposure instead.
    /// Always empty under [`FailurePolicy::Abort`].
    pub fallback_rows: Vec<usize>,
}

impl Decomposition {
    /// The weights as a (batch, K) tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        let rows = self.weights.len();
        let k = self.weights.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<f32> = self.weights.iter().flatten().copied().collect();
        Ok(Tensor::from_vec(flat, (rows, k), device)?)
    }
}

/// Baseline decomposer over a fixed signature matrix.
pub struct Baseline {
    signatures: Arc<SignatureMatrix>,
    /// 96 × K
    basis: Array2<f64>,
    /// Sᵀ·S, K × K
    gram: Array2<f64>,
    /// 1 / Lipschitz constant of the gradient
    step: f64,
    settings: SolverSettings,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Baseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Baseline")
            .field("signatures", &self.signatures.num_signatures())
            .field("workers", &self.pool.current_num_threads())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Baseline {
    /// Create a decomposer running on `n_workers` threads.
    pub fn new(signatures: Arc<SignatureMatrix>, n_workers: usize) -> Result<Self> {
        let k = signatures.num_signatures();
        let basis = Array2::from_shape_vec(
            (NUM_MUTATION_TYPES, k),
            signatures.as_slice().iter().map(|v| *v as f64).collect(),
        )
        .map_err(|e| BaselineError::InvalidSignatures(e.to_string()))?;

        let gram = basis.t().dot(&basis);
        let lambda = largest_eigenvalue(&gram);
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(BaselineError::InvalidSignatures(
                "signature matrix has no energy".to_string(),
            ));
        }
        // Gradient of ‖Sw − x‖² is 2(SᵀS w − Sᵀx); pad the bound slightly.
        let step = 1.0 / (2.0 * lambda * 1.01);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers.max(1))
            .thread_name(|i| format!("signet-baseline-{i}"))
            .build()?;

        info!(signatures = k, workers = n_workers, "baseline decomposer ready");
        Ok(Self {
            signatures,
            basis,
            gram,
            step,
            settings: SolverSettings::default(),
            pool,
        })
    }

    /// Override the solver's stopping rule.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn signatures(&self) -> &Arc<SignatureMatrix> {
        &self.signatures
    }

    pub fn num_signatures(&self) -> usize {
        self.signatures.num_signatures()
    }

    /// Decompose one normalised spectrum.
    pub fn decompose(&self, spectrum: &[f32]) -> std::result::Result<Vec<f32>, SolverError> {
        if spectrum.len() != NUM_MUTATION_TYPES {
            return Err(SolverError::Dimension {
                expected: NUM_MUTATION_TYPES,
                got: spectrum.len(),
            });
        }
        if spectrum.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite);
        }

        let x: Array1<f64> = spectrum.iter().map(|v| *v as f64).collect();
        let target = self.basis.t().dot(&x);
        let k = self.num_signatures();

        // FISTA with gradient-based adaptive restart.
        let mut w = Array1::from_elem(k, 1.0 / k as f64);
        let mut y = w.clone();
        let mut t = 1.0f64;
        let mut change = f64::INFINITY;

        for _ in 0..self.settings.max_iterations {
            let grad = (self.gram.dot(&y) - &target) * 2.0;
            let w_next = project_onto_simplex((&y - &(grad * self.step)).view());

            let step_dir = &w_next - &w;
            change = step_dir.iter().fold(0.0f64, |m, d| m.max(d.abs()));
            if !change.is_finite() {
                return Err(SolverError::NonFinite);
            }

            if (&y - &w_next).dot(&step_dir) > 0.0 {
                t = 1.0;
                y = w_next.clone();
            } else {
                let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
                y = &w_next + &(&step_dir * ((t - 1.0) / t_next));
                t = t_next;
            }
            w = w_next;

            if change < self.settings.tolerance {
                return Ok(w.iter().map(|v| *v as f32).collect());
            }
        }

        Err(SolverError::NotConverged {
            iterations: self.settings.max_iterations,
            change,
        })
    }

    /// Decompose a batch of spectra in parallel, preserving row order.
    ///
    /// Per-row failures follow `policy`: [`FailurePolicy::Abort`] returns the
    /// first failing row (by index) as [`BaselineError::Solver`];
    /// [`FailurePolicy::Uniform`] substitutes `1/K` everywhere and lists the
    /// row in [`Decomposition::fallback_rows`].
    pub fn decompose_batch(
        &self,
        spectra: &[Vec<f32>],
        policy: FailurePolicy,
    ) -> Result<Decomposition> {
        let start = Instant::now();
        let results: Vec<std::result::Result<Vec<f32>, SolverError>> = self
            .pool
            .install(|| spectra.par_iter().map(|row| self.decompose(row)).collect());

        let k = self.num_signatures();
        let mut weights = Vec::with_capacity(results.len());
        let mut fallback_rows = Vec::new();
        for (row, result) in results.into_iter().enumerate() {
            match (result, policy) {
                (Ok(w), _) => weights.push(w),
                (Err(source), FailurePolicy::Abort) => {
                    return Err(BaselineError::Solver { row, source });
                }
                (Err(source), FailurePolicy::Uniform) => {
                    warn!(row, error = %source, "baseline solve failed, using uniform exposure");
                    weights.push(vec![1.0 / k as f32; k]);
                    fallback_rows.push(row);
                }
            }
        }

        debug!(
            rows = spectra.len(),
            fallbacks = fallback_rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "baseline batch decomposed"
        );
        Ok(Decomposition {
            weights,
            fallback_rows,
        })
    }

    /// Decompose a (batch, 96) tensor of normalised spectra.
    pub fn decompose_tensor(
        &self,
        mutation_dist: &Tensor,
        policy: FailurePolicy,
    ) -> Result<Decomposition> {
        check_spectrum_batch(mutation_dist)?;
        let rows = mutation_dist.to_dtype(candle_core::DType::F32)?.to_vec2::<f32>()?;
        self.decompose_batch(&rows, policy)
    }
}

/// Dominant eigenvalue of a symmetric positive semi-definite matrix.
fn largest_eigenvalue(m: &Array2<f64>) -> f64 {
    let n = m.nrows();
    let mut v = Array1::from_elem(n, 1.0 / (n as f64).sqrt());
    let mut lambda = 0.0;
    for _ in 0..POWER_ITERATIONS {
        let mv = m.dot(&v);
        let norm = mv.dot(&mv).sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        lambda = v.dot(&mv);
        v = mv / norm;
    }
    lambda
}

#[cfg(test)]
mod tests {
    use super::*;
    use signet_test_utils::{mixture_spectrum, synthetic_signatures};

    fn baseline(k: usize) -> Baseline {
        Baseline::new(Arc::new(synthetic_signatures(k)), 2).unwrap()
    }

    #[test]
    fn test_recovers_exact_mixture() {
        let b = baseline(5);
        let truth = [0.5f32, 0.3, 0.2, 0.0, 0.0];
        let x = mixture_spectrum(b.signatures(), &truth);

        let w = b.decompose(&x).unwrap();
        for (got, want) in w.iter().zip(truth) {
            assert!((got - want).abs() < 1e-3, "got {w:?}");
        }
    }

    #[test]
    fn test_output_on_simplex() {
        let b = baseline(6);
        let x: Vec<f32> = (0..NUM_MUTATION_TYPES).map(|i| (i % 7) as f32 + 1.0).collect();
        let total: f32 = x.iter().sum();
        let x: Vec<f32> = x.iter().map(|v| v / total).collect();

        let w = b.decompose(&x).unwrap();
        assert!(w.iter().all(|v| *v >= 0.0));
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_dimension_error() {
        let b = baseline(3);
        assert_eq!(
            b.decompose(&[0.5, 0.5]),
            Err(SolverError::Dimension {
                expected: NUM_MUTATION_TYPES,
                got: 2
            })
        );
    }

    #[test]
    fn test_abort_policy_reports_first_failing_row() {
        let b = baseline(3);
        let good = vec![1.0 / NUM_MUTATION_TYPES as f32; NUM_MUTATION_TYPES];
        let mut bad = good.clone();
        bad[4] = f32::NAN;

        let err = b
            .decompose_batch(&[good.clone(), bad.clone(), bad], FailurePolicy::Abort)
            .unwrap_err();
        match err {
            BaselineError::Solver { row, source } => {
                assert_eq!(row, 1);
                assert_eq!(source, SolverError::NonFinite);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_uniform_policy_substitutes_and_reports() {
        let b = baseline(4);
        let good = vec![1.0 / NUM_MUTATION_TYPES as f32; NUM_MUTATION_TYPES];
        let mut bad = good.clone();
        bad[0] = f32::INFINITY;

        let result = b
            .decompose_batch(&[bad, good], FailurePolicy::Uniform)
            .unwrap();
        assert_eq!(result.fallback_rows, vec![0]);
        assert_eq!(result.weights[0], vec![0.25; 4]);
        assert!((result.weights[1].iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_not_converged_is_reported() {
        let b = baseline(5).with_settings(SolverSettings {
            max_iterations: 1,
            tolerance: 0.0,
        });
        let x = mixture_spectrum(b.signatures(), &[0.9, 0.1, 0.0, 0.0, 0.0]);
        assert!(matches!(
            b.decompose(&x),
            Err(SolverError::NotConverged { iterations: 1, .. })
        ));
    }
}
