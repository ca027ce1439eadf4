//! Inverted dropout driven by an explicit random context.

use candle_core::Tensor;

use super::ForwardMode;
use crate::error::TrainResult;

/// Dropout applied to pooled features before the classification head.
#[derive(Debug, Clone, Copy)]
pub struct HeadDropout {
    p: f32,
}

impl HeadDropout {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    /// Zero each element with probability `p` and rescale the rest by
    /// `1 / (1 - p)`. Identity in eval mode or when `p == 0`.
    pub fn apply(&self, xs: &Tensor, mode: &mut ForwardMode<'_>) -> TrainResult<Tensor> {
        match mode {
            ForwardMode::Train(rng) if self.p > 0.0 => {
                let mask = rng.dropout_mask(xs.elem_count(), self.p);
                let mask = Tensor::from_vec(mask, xs.shape(), xs.device())?.to_dtype(xs.dtype())?;
                Ok(xs.mul(&mask)?)
            }
            _ => Ok(xs.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use clone_detect_core::RandomContext;

    #[test]
    fn test_eval_is_identity() {
        let xs = Tensor::ones((4, 8), candle_core::DType::F32, &Device::Cpu).unwrap();
        let out = HeadDropout::new(0.5).apply(&xs, &mut ForwardMode::Eval).unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), xs.to_vec2::<f32>().unwrap());
    }

    #[test]
    fn test_train_masks_and_rescales() {
        let xs = Tensor::ones((4, 64), candle_core::DType::F32, &Device::Cpu).unwrap();
        let mut rng = RandomContext::new(9);
        let out = HeadDropout::new(0.5)
            .apply(&xs, &mut ForwardMode::Train(&mut rng))
            .unwrap();
        let values: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
        assert!(values.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        assert!(values.iter().any(|&v| v == 0.0));
        assert!(values.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_zero_rate_in_train_is_identity() {
        let xs = Tensor::ones((2, 3), candle_core::DType::F32, &Device::Cpu).unwrap();
        let mut rng = RandomContext::new(1);
        let out = HeadDropout::new(0.0)
            .apply(&xs, &mut ForwardMode::Train(&mut rng))
            .unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), vec![vec![1.0; 3]; 2]);
    }
}
