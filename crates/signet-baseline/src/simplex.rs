use ndarray::{Array1, ArrayView1};

/// Euclidean projection onto the probability simplex `{w : w ≥ 0, Σw = 1}`.
///
/// Sort-and-threshold method: find the largest `ρ` such that
/// `u_ρ − (Σ_{j≤ρ} u_j − 1)/ρ > 0` over the values sorted descending, then
/// shift every entry by that threshold and clip at zero.
pub fn project_onto_simplex(v: ArrayView1<f64>) -> Array1<f64> {
    let mut sorted: Vec<f64> = v.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumsum = 0.0;
    let mut theta = 0.0;
    for (j, u) in sorted.iter().enumerate() {
        cumsum += u;
        let candidate = (cumsum - 1.0) / (j + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    v.mapv(|x| (x - theta).max(0.0))
}
