//! BART-style raw pair encoding.

use std::sync::Arc;

use super::{to_example, PairEncoder};
use crate::error::DataResult;
use crate::family::ModelFamily;
use crate::record::{CodePairRecord, EncodedExample};
use crate::tokenizer::CodeTokenizer;

/// Encodes `(code1, code2)` without a template (`<s> A </s></s> B </s>` for
/// BART). No segment ids.
#[derive(Debug, Clone)]
pub struct BartEncoder {
    tokenizer: Arc<CodeTokenizer>,
}

impl BartEncoder {
    pub fn new(tokenizer: Arc<CodeTokenizer>) -> Self {
        Self { tokenizer }
    }
}

impl PairEncoder for BartEncoder {
    fn name(&self) -> &'static str {
        "bart"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Bart
    }

    fn encode(&self, record: &CodePairRecord) -> DataResult<EncodedExample> {
        let encoding = self.tokenizer.encode_pair(&record.code1, Some(&record.code2))?;
        Ok(to_example(&encoding, None, record.label, self.tokenizer.max_length()))
    }
}
