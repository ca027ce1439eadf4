//! Training objectives.
//!
//! An objective runs the forward pass(es) it needs and returns a scalar loss
//! ready for `backward()`. The encoder-only family trains with two
//! dropout-perturbed passes and a symmetric divergence penalty
//! ([`RDropObjective`]); the other families use [`PlainObjective`].

mod loss;
mod plain;
mod rdrop;

pub use loss::{masked_cross_entropy, symmetric_kl, zero_loss, LabeledRows};
pub use plain::PlainObjective;
pub use rdrop::{RDropObjective, DEFAULT_ALPHA};

use candle_core::Tensor;
use clone_detect_core::{Batch, ModelFamily, RandomContext};

use crate::config::RDropConfig;
use crate::error::TrainResult;
use crate::model::SequenceClassifier;

/// Host-side values of one loss computation, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossComponents {
    /// Cross-entropy of the first pass.
    pub ce_first: f32,
    /// Cross-entropy of the second pass, when there is one.
    pub ce_second: Option<f32>,
    /// Divergence between the two passes, when there are two.
    pub divergence: Option<f32>,
    pub total: f32,
}

/// Result of [`TrainingObjective::compute_loss`].
#[derive(Debug, Clone)]
pub struct LossOutput {
    /// Scalar loss to backpropagate.
    pub loss: Tensor,
    pub components: LossComponents,
    /// Labeled examples that contributed. Zero means the step is a no-op.
    pub num_valid: usize,
}

impl LossOutput {
    pub fn is_empty(&self) -> bool {
        self.num_valid == 0
    }
}

/// Loss for one training batch.
pub trait TrainingObjective: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the training-mode forward pass(es) and compute the loss.
    ///
    /// Dropout masks are drawn from `rng`.
    fn compute_loss(
        &self,
        model: &mut dyn SequenceClassifier,
        batch: &Batch,
        rng: &mut RandomContext,
    ) -> TrainResult<LossOutput>;
}

/// Objective for a model family.
pub fn objective_for(family: ModelFamily, rdrop: &RDropConfig) -> Box<dyn TrainingObjective> {
    if family.uses_consistency_regularization() {
        Box::new(RDropObjective::new(rdrop.alpha))
    } else {
        Box::new(PlainObjective)
    }
}

/// Labeled rows of a batch; a batch without labels has none.
pub(crate) fn labeled_rows(batch: &Batch) -> TrainResult<LabeledRows> {
    match &batch.labels {
        Some(labels) => LabeledRows::from_labels(labels),
        None => {
            let empty = Tensor::zeros(0, candle_core::DType::I64, batch.device())?;
            LabeledRows::from_labels(&empty)
        }
    }
}
