//! Error types for model construction, training and inference.

use std::path::PathBuf;

use clone_detect_core::{DataError, ModelFamily};
use thiserror::Error;

/// Errors raised by the training crate.
#[derive(Debug, Error)]
pub enum TrainError {
    /// Data preparation failed.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Tensor operation failed.
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the offending value
        message: String,
    },

    /// No model variant registered under the requested key.
    #[error("No model variant '{name}' registered for family '{family}'")]
    UnknownModel {
        /// Resolved family
        family: ModelFamily,
        /// Requested variant
        name: String,
    },

    /// Pretrained weights or checkpoint could not be loaded.
    #[error("Failed to load model from {path}: {message}")]
    ModelLoad {
        /// File or directory involved
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// The training loss became NaN or infinite.
    #[error("Non-finite loss {value} at step {step}")]
    NonFiniteLoss {
        /// Optimizer step at which the loss was observed
        step: usize,
        /// Offending value
        value: f32,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrainError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a ModelLoad error.
    pub fn model_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for training operations.
pub type TrainResult<T> = Result<T, TrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = TrainError::UnknownModel {
            family: ModelFamily::T5,
            name: "large".into(),
        };
        assert_eq!(err.to_string(), "No model variant 'large' registered for family 't5'");

        let err = TrainError::NonFiniteLoss {
            step: 7,
            value: f32::NAN,
        };
        assert!(err.to_string().contains("step 7"));
    }

    #[test]
    fn test_data_error_is_transparent() {
        let err: TrainError = DataError::UnknownModelFamily {
            identifier: "gpt2".into(),
        }
        .into();
        assert!(err.to_string().contains("gpt2"));
        assert!(matches!(err, TrainError::Data(_)));
    }
}
