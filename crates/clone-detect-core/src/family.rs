//! Model family resolution.
//!
//! The pretrained identifier is inspected exactly once, here. Every other
//! component receives the resulting [`ModelFamily`] so preprocessing, encoding
//! and objective choice can never disagree within a run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Architecture family of the configured pretrained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Bidirectional encoder only (BERT, RoBERTa, CodeBERT, GraphCodeBERT).
    EncoderOnly,
    /// T5-style encoder-decoder (T5, CodeT5).
    T5,
    /// BART-style encoder-decoder (BART, PLBART).
    Bart,
}

impl ModelFamily {
    /// All families, in dispatch precedence order.
    pub const ALL: [ModelFamily; 3] = [Self::EncoderOnly, Self::T5, Self::Bart];

    /// Resolve a family from a pretrained identifier such as
    /// `microsoft/codebert-base` or `t5-small`.
    ///
    /// Matching is a case-insensitive substring test with precedence
    /// `bert` > `t5` > `bart`.
    ///
    /// # Errors
    /// - `DataError::UnknownModelFamily` when no family name occurs in the identifier
    pub fn from_identifier(identifier: &str) -> DataResult<Self> {
        let lowered = identifier.to_lowercase();
        if lowered.contains("bert") {
            Ok(Self::EncoderOnly)
        } else if lowered.contains("t5") {
            Ok(Self::T5)
        } else if lowered.contains("bart") {
            Ok(Self::Bart)
        } else {
            Err(DataError::UnknownModelFamily {
                identifier: identifier.to_string(),
            })
        }
    }

    /// Short stable name, used as a registry key and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EncoderOnly => "encoder_only",
            Self::T5 => "t5",
            Self::Bart => "bart",
        }
    }

    /// Whether encoded examples carry segment (token-type) ids.
    pub fn uses_segment_ids(self) -> bool {
        matches!(self, Self::EncoderOnly)
    }

    /// Whether training uses the two-pass consistency-regularized objective.
    pub fn uses_consistency_regularization(self) -> bool {
        matches!(self, Self::EncoderOnly)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
