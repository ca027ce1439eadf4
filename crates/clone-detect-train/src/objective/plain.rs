//! Single-pass cross-entropy.

use clone_detect_core::{Batch, RandomContext};

use super::{labeled_rows, masked_cross_entropy, zero_loss, LossComponents, LossOutput, TrainingObjective};
use crate::error::TrainResult;
use crate::model::{ForwardMode, SequenceClassifier};

/// Cross-entropy over labeled examples of one training-mode pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainObjective;

impl TrainingObjective for PlainObjective {
    fn name(&self) -> &'static str {
        "cross_entropy"
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

        let logits = model.forward(batch, ForwardMode::Train(rng))?;
        let loss = masked_cross_entropy(&logits, &rows)?;
        let value = loss.to_scalar::<f32>()?;
        Ok(LossOutput {
            loss,
            components: LossComponents {
                ce_first: value,
                total: value,
                ..LossComponents::default()
            },
            num_valid: rows.count,
        })
    }
}
