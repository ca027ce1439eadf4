//! Loss primitives over `[B, C]` logits.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::ops::log_softmax;
use clone_detect_core::IGNORE_INDEX;

use crate::error::TrainResult;

/// Rows of a batch that carry a label.
#[derive(Debug, Clone)]
pub struct LabeledRows {
    /// Row indices, U32 `[N]`.
    pub index: Tensor,
    /// Class targets for those rows, U32 `[N]`.
    pub targets: Tensor,
    pub count: usize,
}

impl LabeledRows {
    /// Select rows whose label is not [`IGNORE_INDEX`].
    pub fn from_labels(labels: &Tensor) -> TrainResult<Self> {
        let values = labels.to_dtype(DType::I64)?.to_vec1::<i64>()?;
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for (i, &label) in values.iter().enumerate() {
            if label != IGNORE_INDEX {
                rows.push(i as u32);
                targets.push(label as u32);
            }
        }
        let count = rows.len();
        Ok(Self {
            index: Tensor::from_vec(rows, count, labels.device())?,
            targets: Tensor::from_vec(targets, count, labels.device())?,
            count,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The labeled rows of `xs`.
    pub fn select(&self, xs: &Tensor) -> TrainResult<Tensor> {
        Ok(xs.index_select(&self.index, 0)?)
    }
}

/// Scalar zero on `device`.
pub fn zero_loss(device: &Device) -> TrainResult<Tensor> {
    Ok(Tensor::zeros((), DType::F32, device)?)
}

/// Mean cross-entropy over labeled rows. Zero when no row is labeled.
pub fn masked_cross_entropy(logits: &Tensor, rows: &LabeledRows) -> TrainResult<Tensor> {
    if rows.is_empty() {
        return zero_loss(logits.device());
    }
    let selected = rows.select(logits)?;
    Ok(candle_nn::loss::cross_entropy(&selected, &rows.targets)?)
}

/// `mean(KL(P‖Q) + KL(Q‖P))` over rows, from log-softmax outputs.
///
/// Exactly zero when both logit tensors are identical.
pub fn symmetric_kl(p_logits: &Tensor, q_logits: &Tensor) -> TrainResult<Tensor> {
    if p_logits.dim(0)? == 0 {
        return zero_loss(p_logits.device());
    }
    let log_p = log_softmax(p_logits, D::Minus1)?;
    let log_q = log_softmax(q_logits, D::Minus1)?;
    let diff = (&log_p - &log_q)?;
    let kl_pq = log_p.exp()?.mul(&diff)?.sum(D::Minus1)?;
    let kl_qp = log_q.exp()?.mul(&diff.neg()?)?.sum(D::Minus1)?;
    Ok((kl_pq + kl_qp)?.mean_all()?)
}
