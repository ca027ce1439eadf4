//! Validation metrics for binary clone detection.

use std::fmt;

use candle_core::{Tensor, D};
use serde::{Deserialize, Serialize};

use crate::error::TrainResult;

/// Metrics over one validation pass. Class 1 ("clone") is positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub loss: f32,
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub examples: usize,
}

impl fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss={:.4} acc={:.4} p={:.4} r={:.4} f1={:.4} (n={})",
            self.loss, self.accuracy, self.precision, self.recall, self.f1, self.examples
        )
    }
}

/// Arg-max class per row of `[B, C]` logits.
pub fn argmax_predictions(logits: &Tensor) -> TrainResult<Vec<u32>> {
    Ok(logits.argmax(D::Minus1)?.to_vec1::<u32>()?)
}

/// Accuracy, precision, recall and F1 from paired predictions and labels.
///
/// Ratios with an empty denominator are 0. `loss` is left at 0 for the
/// caller to fill.
pub fn compute_metrics(predictions: &[u32], labels: &[u32]) -> EvalMetrics {
    let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
    for (&pred, &label) in predictions.iter().zip(labels) {
        if pred == label {
            correct += 1;
        }
        match (pred == 1, label == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f32 / den as f32 };
    let examples = predictions.len().min(labels.len());
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    EvalMetrics {
        loss: 0.0,
        accuracy: ratio(correct, examples),
        precision,
        recall,
        f1,
        examples,
    }
}
