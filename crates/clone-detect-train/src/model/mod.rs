//! Sequence-pair classifiers and their registry.
//!
//! Every backbone reduces a [`Batch`] to `[B, num_labels]` logits. Stochastic
//! regularization lives in the classifier head and draws its masks from the
//! [`RandomContext`] passed with [`ForwardMode::Train`], so two passes with
//! different contexts see independent dropout.

mod bert;
mod dropout;
mod mean_pool;
mod registry;
mod t5;
pub mod weights;

pub use bert::BertClassifier;
pub use dropout::HeadDropout;
pub use mean_pool::MeanPoolClassifier;
pub use registry::{ModelBuildContext, ModelBuilder, ModelRegistry};
pub use t5::T5Classifier;

use candle_core::{Tensor, D};
use candle_nn::VarMap;
use clone_detect_core::{Batch, RandomContext};

use crate::error::TrainResult;

/// Forward-pass mode.
pub enum ForwardMode<'a> {
    /// Dropout active, masks drawn from the given context.
    Train(&'a mut RandomContext),
    /// Deterministic.
    Eval,
}

/// A classifier over encoded code pairs.
pub trait SequenceClassifier {
    /// Registered variant name.
    fn name(&self) -> &str;

    /// Compute logits `[B, num_labels]`.
    fn forward(&mut self, batch: &Batch, mode: ForwardMode<'_>) -> TrainResult<Tensor>;

    /// Trainable parameters.
    fn varmap(&self) -> &VarMap;

    fn num_labels(&self) -> usize;
}

/// Mean of `hidden` `[B, L, H]` over positions where `mask` `[B, L]` is 1.
///
/// Rows with an all-zero mask pool to zeros.
pub fn masked_mean_pool(hidden: &Tensor, mask: &Tensor) -> TrainResult<Tensor> {
    let mask = mask.to_dtype(hidden.dtype())?.unsqueeze(D::Minus1)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.maximum(1.0)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Token-type ids for a batch, zeros when the batch carries none.
pub(crate) fn token_type_ids_or_zeros(batch: &Batch) -> TrainResult<Tensor> {
    match &batch.token_type_ids {
        Some(types) => Ok(types.clone()),
        None => Ok(batch.input_ids.zeros_like()?),
    }
}
