//! Two-pass consistency-regularized cross-entropy (R-Drop).
//!
//! ```text
//! logits₁ = f(x; dropout from child context 1)
//! logits₂ = f(x; dropout from child context 2)
//! D       = mean(KL(P₁‖P₂) + KL(P₂‖P₁))     over labeled rows
//! total   = (CE₁ + CE₂) / 2 + α · D
//! ```
//!
//! With dropout disabled both passes agree, so `D == 0` and `total == CE₁`.

use clone_detect_core::{Batch, RandomContext};
use tracing::debug;

use super::{
    labeled_rows, masked_cross_entropy, symmetric_kl, zero_loss, LossComponents, LossOutput,
    TrainingObjective,
};
use crate::error::TrainResult;
use crate::model::{ForwardMode, SequenceClassifier};

/// Default divergence weight.
pub const DEFAULT_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct RDropObjective {
    alpha: f64,
}

impl Default for RDropObjective {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl RDropObjective {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl TrainingObjective for RDropObjective {
    fn name(&self) -> &'static str {
        "rdrop"
    }

    fn compute_loss(
        &self,
        model: &mut dyn SequenceClassifier,
        batch: &Batch,
        rng: &mut RandomContext,
    ) -> TrainResult<LossOutput> {
        let rows = labeled_rows(batch)?;
        if rows.is_empty() {
            return Ok(LossOutput {
                loss: zero_loss(batch.device())?,
                components: LossComponents::default(),
                num_valid: 0,
            });
        }

        // Both children are forked before either pass so the two draws stay
        // independent of how much randomness a pass consumes.
        let mut first_rng = rng.fork();
        let mut second_rng = rng.fork();
        let logits_first = model.forward(batch, ForwardMode::Train(&mut first_rng))?;
        let logits_second = model.forward(batch, ForwardMode::Train(&mut second_rng))?;

        let ce_first = masked_cross_entropy(&logits_first, &rows)?;
        let ce_second = masked_cross_entropy(&logits_second, &rows)?;
        let divergence = symmetric_kl(&rows.select(&logits_first)?, &rows.select(&logits_second)?)?;

        let ce_mean = (&ce_first + &ce_second)?.affine(0.5, 0.0)?;
        let loss = (ce_mean + divergence.affine(self.alpha, 0.0)?)?;

        let components = LossComponents {
            ce_first: ce_first.to_scalar::<f32>()?,
            ce_second: Some(ce_second.to_scalar::<f32>()?),
            divergence: Some(divergence.to_scalar::<f32>()?),
            total: loss.to_scalar::<f32>()?,
        };
        debug!(
            ce_first = components.ce_first,
            ce_second = ?components.ce_second,
            divergence = ?components.divergence,
            total = components.total,
            "R-Drop loss"
        );
        Ok(LossOutput {
            loss,
            components,
            num_valid: rows.count,
        })
    }
}
