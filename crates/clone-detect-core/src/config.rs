//! Data preparation configuration: the `[data]` section.
//!
//! ```toml
//! [data]
//! max_input_length = 512
//! truncation_side = "right"
//! padding = "dynamic"
//! max_code_chars = 4000
//! num_workers = 0
//! task_prefix = "clone detection"
//! ```

use serde::{Deserialize, Serialize};

use crate::preprocess::{LengthFilter, DEFAULT_MAX_CODE_CHARS};

/// Smallest accepted `max_input_length`; pair templates add up to four
/// special tokens.
pub const MIN_INPUT_LENGTH: usize = 8;

// ============================================================================
// PADDING STRATEGY
// ============================================================================

/// Padding policy applied by the collator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaddingStrategy {
    /// Pad to the longest example in the batch.
    #[default]
    Dynamic,

    /// Pad every batch to `max_input_length`.
    Fixed,
}

impl PaddingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaddingStrategy::Dynamic => "dynamic",
            PaddingStrategy::Fixed => "fixed",
        }
    }
}

// ============================================================================
// TRUNCATION SIDE
// ============================================================================

/// Side tokens are removed from when a pair exceeds the length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TruncationSide {
    /// Keep the beginning of each snippet.
    #[default]
    Right,

    /// Keep the end of each snippet.
    Left,
}

// ============================================================================
// DATA CONFIG
// ============================================================================

/// Tokenization, truncation, padding and filtering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Maximum encoded length, special tokens included.
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    #[serde(default)]
    pub truncation_side: TruncationSide,

    #[serde(default)]
    pub padding: PaddingStrategy,

    /// Training records with a snippet at least this many characters long
    /// are dropped. 0 disables the filter.
    #[serde(default = "default_max_code_chars")]
    pub max_code_chars: usize,

    /// Rayon threads for preprocessing and encoding. 0 uses all CPUs.
    #[serde(default)]
    pub num_workers: usize,

    /// Leading task phrase for T5-style inputs.
    #[serde(default = "default_task_prefix")]
    pub task_prefix: String,
}

fn default_max_input_length() -> usize {
    512
}

fn default_max_code_chars() -> usize {
    DEFAULT_MAX_CODE_CHARS
}

fn default_task_prefix() -> String {
    "clone detection".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            max_input_length: default_max_input_length(),
            truncation_side: TruncationSide::default(),
            padding: PaddingStrategy::default(),
            max_code_chars: default_max_code_chars(),
            num_workers: 0,
            task_prefix: default_task_prefix(),
        }
    }
}

impl DataConfig {
    /// Validate the section. The error string is prefixed by the caller.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_input_length < MIN_INPUT_LENGTH {
            return Err(format!(
                "max_input_length must be >= {}, got {}",
                MIN_INPUT_LENGTH, self.max_input_length
            ));
        }
        Ok(())
    }

    /// Length filter for training data, if enabled.
    pub fn length_filter(&self) -> Option<LengthFilter> {
        (self.max_code_chars > 0).then(|| LengthFilter::new(self.max_code_chars))
    }
}
