//! Right-padding collation of encoded examples into tensor batches.

use candle_core::{Device, Tensor};

use crate::config::{DataConfig, PaddingStrategy};
use crate::error::DataResult;
use crate::record::EncodedExample;

/// Label value excluded from the loss.
pub const IGNORE_INDEX: i64 = -100;

/// Padded tensors for one batch.
///
/// `input_ids`, `attention_mask` and `token_type_ids` are U32 `[B, L]`;
/// `labels` is I64 `[B]`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Option<Tensor>,
    pub labels: Option<Tensor>,
    batch_size: usize,
    seq_len: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.batch_size == 0
    }

    /// Padded sequence length.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn device(&self) -> &Device {
        self.input_ids.device()
    }
}

/// Pads examples to a common length.
#[derive(Debug, Clone)]
pub struct PaddingCollator {
    pad_token_id: u32,
    strategy: PaddingStrategy,
    max_length: usize,
    device: Device,
}

impl PaddingCollator {
    pub fn new(pad_token_id: u32, strategy: PaddingStrategy, max_length: usize, device: Device) -> Self {
        Self {
            pad_token_id,
            strategy,
            max_length,
            device,
        }
    }

    /// Collator matching a data config.
    pub fn from_config(config: &DataConfig, pad_token_id: u32, device: Device) -> Self {
        Self::new(pad_token_id, config.padding, config.max_input_length, device)
    }

    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    /// Stack examples into one batch.
    ///
    /// # Errors
    /// - `DataError::InvalidExample` when an example breaks the length invariants
    /// - `DataError::TensorError` when tensor construction fails
    pub fn collate(&self, examples: &[EncodedExample]) -> DataResult<Batch> {
        for (i, ex) in examples.iter().enumerate() {
            ex.check(i, self.max_length)?;
        }

        let batch_size = examples.len();
        let seq_len = if batch_size == 0 {
            0
        } else {
            match self.strategy {
                PaddingStrategy::Dynamic => examples.iter().map(EncodedExample::len).max().unwrap_or(0),
                PaddingStrategy::Fixed => self.max_length,
            }
        };

        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
        for ex in examples {
            let pad = seq_len - ex.len();
            input_ids.extend_from_slice(&ex.input_ids);
            input_ids.extend(std::iter::repeat(self.pad_token_id).take(pad));
            attention_mask.extend_from_slice(&ex.attention_mask);
            attention_mask.extend(std::iter::repeat(0u32).take(pad));
        }

        let token_type_ids = if batch_size > 0 && examples.iter().all(|ex| ex.token_type_ids.is_some()) {
            let mut types = Vec::with_capacity(batch_size * seq_len);
            for ex in examples {
                let pad = seq_len - ex.len();
                types.extend(ex.token_type_ids.iter().flatten().copied());
                types.extend(std::iter::repeat(self.pad_token_id).take(pad));
            }
            Some(Tensor::from_vec(types, (batch_size, seq_len), &self.device)?)
        } else {
            None
        };

        let labels = if examples.iter().any(|ex| ex.label.is_some()) {
            let values: Vec<i64> = examples
                .iter()
                .map(|ex| ex.label.map_or(IGNORE_INDEX, i64::from))
                .collect();
            Some(Tensor::from_vec(values, batch_size, &self.device)?)
        } else {
            None
        };

        Ok(Batch {
            input_ids: Tensor::from_vec(input_ids, (batch_size, seq_len), &self.device)?,
            attention_mask: Tensor::from_vec(attention_mask, (batch_size, seq_len), &self.device)?,
            token_type_ids,
            labels,
            batch_size,
            seq_len,
        })
    }
}
