use candle_core::Tensor;

use crate::Result;

/// Default weight below which a signature is folded into "unknown".
pub const DEFAULT_UNKNOWN_THRESHOLD: f32 = 0.01;

/// Zero every weight below `threshold` and append the removed mass as an
/// extra last column, turning (B, K) into (B, K + 1).
pub fn fold_into_unknown(weights: &Tensor, threshold: f32) -> Result<Tensor> {
    let keep = weights.ge(threshold)?.to_dtype(weights.dtype())?;
    let kept = (weights * &keep)?;
    let unknown = (weights - &kept)?.sum_keepdim(1)?;
    Ok(Tensor::cat(&[&kept, &unknown], 1)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_small_weights_move_to_unknown() {
        let w = Tensor::new(&[[0.5f32, 0.495, 0.005], [0.009, 0.001, 0.99]], &Device::Cpu).unwrap();
        let out = fold_into_unknown(&w, DEFAULT_UNKNOWN_THRESHOLD)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(out[0][..3], [0.5, 0.495, 0.0]);
        assert!((out[0][3] - 0.005).abs() < 1e-7);
        assert_eq!(out[1][..3], [0.0, 0.0, 0.99]);
        assert!((out[1][3] - 0.01).abs() < 1e-7);
    }

    #[test]
    fn test_mass_is_preserved() {
        let w = Tensor::new(&[[0.3f32, 0.3, 0.2, 0.1, 0.05, 0.05]], &Device::Cpu).unwrap();
        let out = fold_into_unknown(&w, 0.1).unwrap().to_vec2::<f32>().unwrap();
        assert!((out[0].iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((out[0][6] - 0.1).abs() < 1e-6);
    }
}
