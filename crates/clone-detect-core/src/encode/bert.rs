//! Encoder-only pair encoding with segment ids.

use std::sync::Arc;

use tracing::warn;

use super::{to_example, PairEncoder};
use crate::error::DataResult;
use crate::family::ModelFamily;
use crate::record::{CodePairRecord, EncodedExample};
use crate::tokenizer::CodeTokenizer;

/// `[CLS] code1 [SEP] code2 [SEP]` (or the tokenizer's own pair template).
///
/// Segment ids are derived from sequence membership: tokens of `code1` get
/// 0 and tokens of `code2` get 1. Special tokens are placed by their order in
/// the template: those that open the pair and close `code1` get 0, the rest
/// get 1. This gives exactly two contiguous runs for BERT and RoBERTa
/// templates alike, even when one side encodes to nothing.
#[derive(Debug, Clone)]
pub struct BertEncoder {
    tokenizer: Arc<CodeTokenizer>,
    first_segment_specials: usize,
}

impl BertEncoder {
    pub fn new(tokenizer: Arc<CodeTokenizer>) -> Self {
        let first_segment_specials = first_segment_specials(&tokenizer);
        Self {
            tokenizer,
            first_segment_specials,
        }
    }
}

/// Special tokens the pair template places before the second sequence,
/// measured on a reference pair.
fn first_segment_specials(tokenizer: &CodeTokenizer) -> usize {
    match tokenizer.encode_pair("x", Some("y")) {
        Ok(encoding) => encoding
            .get_sequence_ids()
            .into_iter()
            .take_while(|seq| *seq != Some(1))
            .filter(Option::is_none)
            .count(),
        Err(e) => {
            warn!(error = %e, "Could not measure pair template; assuming [CLS] a [SEP] b [SEP]");
            2
        }
    }
}

impl PairEncoder for BertEncoder {
    fn name(&self) -> &'static str {
        "bert"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::EncoderOnly
    }

    fn encode(&self, record: &CodePairRecord) -> DataResult<EncodedExample> {
        let encoding = self.tokenizer.encode_pair(&record.code1, Some(&record.code2))?;

        let mut specials_seen = 0usize;
        let type_ids: Vec<u32> = encoding
            .get_sequence_ids()
            .into_iter()
            .map(|seq| match seq {
                Some(seq) => u32::from(seq > 0),
                None => {
                    specials_seen += 1;
                    u32::from(specials_seen > self.first_segment_specials)
                }
            })
            .collect();

        Ok(to_example(
            &encoding,
            Some(type_ids),
            record.label,
            self.tokenizer.max_length(),
        ))
    }
}
