//! HuggingFace tokenizer wrapper with truncation configured once.

use std::path::Path;
use std::str::FromStr;

use tokenizers::{
    Encoding, Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy,
};
use tracing::{debug, warn};

use crate::config::TruncationSide;
use crate::error::{DataError, DataResult};

const PAD_CANDIDATES: &[&str] = &["[PAD]", "<pad>", "<|pad|>"];

/// Pair-encoding tokenizer shared read-only across encoding workers.
///
/// Truncation is longest-first across both segments, limited to
/// `max_length` including special tokens. Padding is left to the collator.
#[derive(Debug, Clone)]
pub struct CodeTokenizer {
    inner: Tokenizer,
    pad_id: u32,
    max_length: usize,
}

impl CodeTokenizer {
    /// Load `tokenizer.json` from disk.
    ///
    /// # Errors
    /// - `DataError::TokenizationError` when the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>, max_length: usize, side: TruncationSide) -> DataResult<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path).map_err(|e| {
            DataError::tokenization(format!("Failed to load tokenizer '{}': {}", path.display(), e))
        })?;
        Self::new(inner, max_length, side)
    }

    /// Parse a tokenizer from its JSON serialization.
    pub fn from_json_str(json: &str, max_length: usize, side: TruncationSide) -> DataResult<Self> {
        let inner = Tokenizer::from_str(json)
            .map_err(|e| DataError::tokenization(format!("Failed to parse tokenizer JSON: {}", e)))?;
        Self::new(inner, max_length, side)
    }

    /// Wrap an existing tokenizer, replacing its truncation and padding.
    pub fn new(mut inner: Tokenizer, max_length: usize, side: TruncationSide) -> DataResult<Self> {
        let direction = match side {
            TruncationSide::Right => TruncationDirection::Right,
            TruncationSide::Left => TruncationDirection::Left,
        };
        inner
            .with_truncation(Some(TruncationParams {
                max_length,
                strategy: TruncationStrategy::LongestFirst,
                direction,
                ..Default::default()
            }))
            .map_err(|e| DataError::tokenization(format!("Invalid truncation settings: {}", e)))?;
        inner.with_padding(None);

        let pad_id = resolve_pad_id(&inner);
        debug!(max_length, pad_id, vocab_size = inner.get_vocab_size(true), "Tokenizer ready");

        Ok(Self {
            inner,
            pad_id,
            max_length,
        })
    }

    /// Encode one sequence or a pair, adding the tokenizer's special tokens.
    pub fn encode_pair(&self, first: &str, second: Option<&str>) -> DataResult<Encoding> {
        let result = match second {
            Some(second) => self.inner.encode((first, second), true),
            None => self.inner.encode(first, true),
        };
        result.map_err(|e| DataError::tokenization(e.to_string()))
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    /// Vocabulary size including added tokens.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

fn resolve_pad_id(tokenizer: &Tokenizer) -> u32 {
    if let Some(id) = PAD_CANDIDATES.iter().find_map(|t| tokenizer.token_to_id(t)) {
        return id;
    }
    warn!("Tokenizer has no pad token; padding with id 0");
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use clone_detect_test_utils::fixtures;

    #[test]
    fn test_pad_ids_per_convention() {
        let bert = CodeTokenizer::new(fixtures::bert_tokenizer(), 64, TruncationSide::Right).unwrap();
        assert_eq!(bert.pad_id(), bert.token_to_id("[PAD]").unwrap());

        let t5 = CodeTokenizer::new(fixtures::t5_tokenizer(), 64, TruncationSide::Right).unwrap();
        assert_eq!(t5.pad_id(), t5.token_to_id("<pad>").unwrap());
    }

    #[test]
    fn test_pair_encoding_truncates() {
        let tok = CodeTokenizer::new(fixtures::bert_tokenizer(), 10, TruncationSide::Right).unwrap();
        let long = "x = x + 1 ".repeat(20);
        let enc = tok.encode_pair(&long, Some(&long)).unwrap();
        assert!(enc.get_ids().len() <= 10, "got {}", enc.get_ids().len());
        assert_eq!(enc.get_ids().len(), enc.get_attention_mask().len());
    }

    #[test]
    fn test_from_json_roundtrip() {
        let json = fixtures::bert_tokenizer_json();
        let tok = CodeTokenizer::from_json_str(&json, 32, TruncationSide::Left).unwrap();
        assert!(tok.vocab_size() > 10);
        assert_eq!(tok.max_length(), 32);
    }

    #[test]
    fn test_missing_file_is_tokenization_error() {
        let err = CodeTokenizer::from_file("/nonexistent/tokenizer.json", 32, TruncationSide::Right)
            .unwrap_err();
        assert!(matches!(err, DataError::TokenizationError { .. }));
    }
}
