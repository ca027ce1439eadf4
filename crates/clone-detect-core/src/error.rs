//! Error types for data preparation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving, loading, encoding or collating code pairs.
#[derive(Debug, Error)]
pub enum DataError {
    /// The pretrained identifier does not name a supported model family.
    #[error("Unrecognized model family for identifier '{identifier}': expected a name containing 'bert', 't5' or 'bart'")]
    UnknownModelFamily {
        /// Identifier as configured
        identifier: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the offending value
        message: String,
    },

    /// Tokenizer could not be loaded or failed to encode.
    #[error("Tokenization error: {message}")]
    TokenizationError {
        /// Underlying tokenizer message
        message: String,
    },

    /// An encoded example broke the length invariants.
    #[error("Invalid encoded example at index {index}: {message}")]
    InvalidExample {
        /// Position of the example in its batch
        index: usize,
        /// What was wrong
        message: String,
    },

    /// A record in a dataset file could not be parsed.
    #[error("Failed to parse record {line} in {path}: {message}")]
    RecordParseError {
        /// Source file
        path: PathBuf,
        /// 1-based line or row number
        line: usize,
        /// Parser message
        message: String,
    },

    /// Dataset file or directory is missing.
    #[error("Dataset not found: {path}")]
    DatasetNotFound {
        /// Path that was probed
        path: PathBuf,
    },

    /// Tensor construction failed.
    #[error("Tensor error: {0}")]
    TensorError(#[from] candle_core::Error),

    /// CSV read/write failed.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DataError {
    /// Create a ConfigError.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a TokenizationError.
    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::TokenizationError {
            message: message.into(),
        }
    }

    /// Create an InvalidExample error.
    pub fn invalid_example(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidExample {
            index,
            message: message.into(),
        }
    }
}

/// Result type for data operations.
pub type DataResult<T> = Result<T, DataError>;
