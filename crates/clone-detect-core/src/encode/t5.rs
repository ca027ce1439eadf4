//! T5-style encoding with a textual task template.

use std::sync::Arc;

use super::{to_example, PairEncoder};
use crate::error::DataResult;
use crate::family::ModelFamily;
use crate::record::{CodePairRecord, EncodedExample};
use crate::tokenizer::CodeTokenizer;

/// Formats `"{prefix} code1: {code1}"` and `"code2: {code2}"` and encodes
/// them as a pair (`A </s> B </s>` for T5). No segment ids.
#[derive(Debug, Clone)]
pub struct T5Encoder {
    tokenizer: Arc<CodeTokenizer>,
    task_prefix: String,
}

impl T5Encoder {
    pub fn new(tokenizer: Arc<CodeTokenizer>, task_prefix: String) -> Self {
        Self {
            tokenizer,
            task_prefix,
        }
    }

    fn first_segment(&self, code1: &str) -> String {
        let prefix = self.task_prefix.trim();
        if prefix.is_empty() {
            format!("code1: {}", code1)
        } else {
            format!("{} code1: {}", prefix, code1)
        }
    }
}

impl PairEncoder for T5Encoder {
    fn name(&self) -> &'static str {
        "t5"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::T5
    }

    fn encode(&self, record: &CodePairRecord) -> DataResult<EncodedExample> {
        let first = self.first_segment(&record.code1);
        let second = format!("code2: {}", record.code2);
        let encoding = self.tokenizer.encode_pair(&first, Some(&second))?;
        Ok(to_example(&encoding, None, record.label, self.tokenizer.max_length()))
    }
}
