//! Reference mutational signatures.
//!
//! The matrix is 96 × K: one row per mutation context, one column per
//! signature. It is loaded once at start-up and shared read-only (usually
//! behind an `Arc`) by the baseline decomposer and the reconstruction
//! metrics.

use std::path::Path;

use candle_core::{Device, Tensor};
use tracing::{info, warn};

use crate::{LabeledTable, Result, SignetError, NUM_MUTATION_TYPES};

#[derive(Debug, Clone)]
pub struct SignatureMatrix {
    mutation_types: Vec<String>,
    names: Vec<String>,
    /// Row-major, `NUM_MUTATION_TYPES` rows of `names.len()` values
    values: Vec<f32>,
}

impl SignatureMatrix {
    /// Build a matrix from 96 rows of K values.
    pub fn new(
        mutation_types: Vec<String>,
        names: Vec<String>,
        rows: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if rows.len() != NUM_MUTATION_TYPES || mutation_types.len() != NUM_MUTATION_TYPES {
            return Err(SignetError::shape(
                "signature matrix rows",
                NUM_MUTATION_TYPES,
                rows.len(),
            ));
        }
        if names.is_empty() {
            return Err(SignetError::InvalidInput(
                "signature matrix has no signatures".to_string(),
            ));
        }

        let k = names.len();
        let mut values = Vec::with_capacity(NUM_MUTATION_TYPES * k);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != k {
                return Err(SignetError::shape(format!("signature row {i}"), k, row.len()));
            }
            if row.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(SignetError::InvalidInput(format!(
                    "signature row {i} contains negative or non-finite values"
                )));
            }
            values.extend(row);
        }

        let matrix = Self {
            mutation_types,
            names,
            values,
        };

        for (j, name) in matrix.names.iter().enumerate() {
            let total: f32 = matrix.column(j).iter().sum();
            if (total - 1.0).abs() > 1e-3 {
                warn!(signature = %name, total, "signature does not sum to 1");
            }
        }
        Ok(matrix)
    }

    /// Load from a CSV table with mutation types as rows and signatures as columns.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let table = LabeledTable::read_csv(path.as_ref())?;
        let matrix = Self::new(table.row_labels, table.column_labels, table.values)?;
        info!(
            path = %path.as_ref().display(),
            signatures = matrix.num_signatures(),
            "loaded signature matrix"
        );
        Ok(matrix)
    }

    /// Number of reference signatures (K).
    pub fn num_signatures(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mutation_types(&self) -> &[String] {
        &self.mutation_types
    }

    /// Row-major 96 × K values.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// The 96 values of signature `j`.
    pub fn column(&self, j: usize) -> Vec<f32> {
        let k = self.num_signatures();
        (0..NUM_MUTATION_TYPES).map(|i| self.values[i * k + j]).collect()
    }

    /// Fail unless this matrix has exactly `num_classes` signatures.
    pub fn ensure_classes(&self, num_classes: usize) -> Result<()> {
        if self.num_signatures() != num_classes {
            return Err(SignetError::shape(
                "signature count vs model classes",
                num_classes,
                self.num_signatures(),
            ));
        }
        Ok(())
    }

    /// The matrix as a (96, K) tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(
            &self.values,
            (NUM_MUTATION_TYPES, self.num_signatures()),
            device,
        )?)
    }

    /// Reconstruct spectra from a (batch, K) exposure tensor: `weights · Sᵀ`.
    pub fn reconstruct(&self, weights: &Tensor) -> Result<Tensor> {
        let k = self.num_signatures();
        match weights.dims() {
            [_, cols] if *cols == k => {}
            dims => return Err(SignetError::shape("exposure batch", ("batch", k), dims)),
        }
        let s = self.to_tensor(weights.device())?;
        Ok(weights.matmul(&s.t()?.contiguous()?)?)
    }
}
