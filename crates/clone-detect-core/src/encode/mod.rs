//! Family-specific pair encoders.
//!
//! Every encoder tokenizes `(code1, code2)` as one pair sequence through the
//! shared [`CodeTokenizer`], so the tokenizer's own special-token template
//! decides separators. Only the encoder-only family emits segment ids.

mod bart;
mod bert;
mod t5;

pub use bart::BartEncoder;
pub use bert::BertEncoder;
pub use t5::T5Encoder;

use std::sync::Arc;

use rayon::prelude::*;
use tokenizers::Encoding;
use tracing::warn;

use crate::config::DataConfig;
use crate::error::DataResult;
use crate::family::ModelFamily;
use crate::record::{CodePairRecord, EncodedExample};
use crate::tokenizer::CodeTokenizer;

/// Turns a code pair into model-ready token sequences.
pub trait PairEncoder: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Family whose conventions this encoder follows.
    fn family(&self) -> ModelFamily;

    /// Encode one record.
    fn encode(&self, record: &CodePairRecord) -> DataResult<EncodedExample>;

    /// Encode records in parallel, preserving order.
    fn encode_batch(&self, records: &[CodePairRecord]) -> DataResult<Vec<EncodedExample>> {
        records.par_iter().map(|r| self.encode(r)).collect()
    }
}

/// Encoder for a model family.
pub fn encoder_for(
    family: ModelFamily,
    tokenizer: Arc<CodeTokenizer>,
    config: &DataConfig,
) -> Box<dyn PairEncoder> {
    match family {
        ModelFamily::EncoderOnly => Box::new(BertEncoder::new(tokenizer)),
        ModelFamily::T5 => Box::new(T5Encoder::new(tokenizer, config.task_prefix.clone())),
        ModelFamily::Bart => Box::new(BartEncoder::new(tokenizer)),
    }
}

/// Build an example from a tokenizer encoding, clamping to `max_len`.
pub(crate) fn to_example(
    encoding: &Encoding,
    token_type_ids: Option<Vec<u32>>,
    label: Option<u8>,
    max_len: usize,
) -> EncodedExample {
    let mut example = EncodedExample {
        input_ids: encoding.get_ids().to_vec(),
        attention_mask: encoding.get_attention_mask().to_vec(),
        token_type_ids,
        label: label.map(u32::from),
    };
    if example.len() > max_len {
        warn!(len = example.len(), max_len, "Encoding exceeded max length; clamping");
        example.input_ids.truncate(max_len);
        example.attention_mask.truncate(max_len);
        if let Some(types) = example.token_type_ids.as_mut() {
            types.truncate(max_len);
        }
    }
    example
}
