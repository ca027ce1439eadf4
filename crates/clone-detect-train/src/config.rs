//! Root configuration for training and inference.
//!
//! # TOML Structure
//!
//! ```toml
//! [model]
//! plm = "microsoft/codebert-base"
//! pretrained_dir = "./models/codebert-base"
//! model_name = "base"
//! dropout_rate = 0.1
//!
//! [data]
//! max_input_length = 512
//! padding = "dynamic"
//!
//! [training]
//! epochs = 3
//! batch_size = 16
//! learning_rate = 2e-5
//! do_all = false
//! num_folds = 5
//!
//! [rdrop]
//! alpha = 1.0
//!
//! [inference]
//! batch_size = 32
//! output_file = "submission.csv"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Invalid values are rejected by [`CloneDetectConfig::validate`], never
//! silently replaced.

use std::env;
use std::path::{Path, PathBuf};

use clone_detect_core::DataConfig;
use serde::{Deserialize, Serialize};

use crate::error::{TrainError, TrainResult};

// ============================================================================
// MODEL CONFIG
// ============================================================================

/// Pretrained backbone and classifier head settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Pretrained model identifier; decides the model family.
    #[serde(default = "default_plm")]
    pub plm: String,

    /// Directory holding `config.json`, `model.safetensors` and
    /// `tokenizer.json` of the pretrained model.
    #[serde(default)]
    pub pretrained_dir: Option<PathBuf>,

    /// Explicit tokenizer file. Defaults to `{pretrained_dir}/tokenizer.json`.
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    /// Registered classifier variant.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Dropout before the classification head.
    #[serde(default = "default_dropout_rate")]
    pub dropout_rate: f32,

    #[serde(default = "default_num_labels")]
    pub num_labels: usize,

    /// Hidden size of the embedding-only `mean_pool` variant.
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
}

fn default_plm() -> String {
    "microsoft/codebert-base".to_string()
}

fn default_model_name() -> String {
    "base".to_string()
}

fn default_dropout_rate() -> f32 {
    0.1
}

fn default_num_labels() -> usize {
    2
}

fn default_hidden_size() -> usize {
    256
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            plm: default_plm(),
            pretrained_dir: None,
            tokenizer_path: None,
            model_name: default_model_name(),
            dropout_rate: default_dropout_rate(),
            num_labels: default_num_labels(),
            hidden_size: default_hidden_size(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.plm.trim().is_empty() {
            return Err("plm cannot be empty".to_string());
        }
        if self.model_name.trim().is_empty() {
            return Err("model_name cannot be empty".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(format!("dropout_rate must be in [0, 1), got {}", self.dropout_rate));
        }
        if self.num_labels < 2 {
            return Err(format!("num_labels must be >= 2, got {}", self.num_labels));
        }
        if self.hidden_size == 0 {
            return Err("hidden_size must be > 0".to_string());
        }
        Ok(())
    }

    /// Tokenizer file to load, if one can be determined.
    pub fn resolved_tokenizer_path(&self) -> Option<PathBuf> {
        self.tokenizer_path
            .clone()
            .or_else(|| self.pretrained_dir.as_ref().map(|d| d.join("tokenizer.json")))
    }
}

// ============================================================================
// TRAINING CONFIG
// ============================================================================

/// Optimization schedule, data selection and output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Stop after this many optimizer steps, overriding `epochs`.
    #[serde(default)]
    pub max_steps: Option<usize>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_eval_batch_size")]
    pub eval_batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,

    /// Fraction of total steps spent in linear warmup.
    #[serde(default = "default_warmup_ratio")]
    pub warmup_ratio: f64,

    /// Global gradient-norm clip. 0 disables clipping.
    #[serde(default = "default_max_grad_norm")]
    pub max_grad_norm: f64,

    #[serde(default = "default_logging_steps")]
    pub logging_steps: usize,

    /// Evaluate every N steps; evaluation also runs after the last step.
    #[serde(default)]
    pub eval_steps: Option<usize>,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Train once on `all/` instead of each `fold_{k}/`.
    #[serde(default = "default_do_all")]
    pub do_all: bool,

    #[serde(default = "default_num_folds")]
    pub num_folds: usize,

    /// Resample the training split to this many records, with replacement.
    #[serde(default)]
    pub train_samples: Option<usize>,

    /// Resample the validation split to this many records, with replacement.
    #[serde(default)]
    pub val_samples: Option<usize>,
}

fn default_epochs() -> usize {
    3
}

fn default_batch_size() -> usize {
    16
}

fn default_eval_batch_size() -> usize {
    32
}

fn default_learning_rate() -> f64 {
    2e-5
}

fn default_weight_decay() -> f64 {
    0.01
}

fn default_warmup_ratio() -> f64 {
    0.1
}

fn default_max_grad_norm() -> f64 {
    1.0
}

fn default_logging_steps() -> usize {
    50
}

fn default_seed() -> u64 {
    42
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_do_all() -> bool {
    true
}

fn default_num_folds() -> usize {
    5
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            max_steps: None,
            batch_size: default_batch_size(),
            eval_batch_size: default_eval_batch_size(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            warmup_ratio: default_warmup_ratio(),
            max_grad_norm: default_max_grad_norm(),
            logging_steps: default_logging_steps(),
            eval_steps: None,
            seed: default_seed(),
            output_dir: default_output_dir(),
            data_dir: default_data_dir(),
            do_all: default_do_all(),
            num_folds: default_num_folds(),
            train_samples: None,
            val_samples: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.epochs == 0 && self.max_steps.is_none() {
            return Err("epochs must be > 0 when max_steps is unset".to_string());
        }
        if self.max_steps == Some(0) {
            return Err("max_steps must be > 0 when set".to_string());
        }
        if self.batch_size == 0 || self.eval_batch_size == 0 {
            return Err("batch_size and eval_batch_size must be > 0".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.weight_decay < 0.0 {
            return Err(format!("weight_decay must be >= 0, got {}", self.weight_decay));
        }
        if !(0.0..=1.0).contains(&self.warmup_ratio) {
            return Err(format!("warmup_ratio must be in [0, 1], got {}", self.warmup_ratio));
        }
        if self.max_grad_norm < 0.0 {
            return Err(format!("max_grad_norm must be >= 0, got {}", self.max_grad_norm));
        }
        if self.logging_steps == 0 {
            return Err("logging_steps must be > 0".to_string());
        }
        if self.eval_steps == Some(0) {
            return Err("eval_steps must be > 0 when set".to_string());
        }
        if !self.do_all && self.num_folds == 0 {
            return Err("num_folds must be > 0 for k-fold training".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// RDROP CONFIG
// ============================================================================

/// Consistency regularization for the encoder-only family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RDropConfig {
    /// Weight of the symmetric KL term.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_alpha() -> f64 {
    crate::objective::DEFAULT_ALPHA
}

impl Default for RDropConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
        }
    }
}

impl RDropConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(format!("alpha must be a finite value >= 0, got {}", self.alpha));
        }
        Ok(())
    }
}

// ============================================================================
// INFERENCE CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_eval_batch_size")]
    pub batch_size: usize,

    /// Submission file name, relative to the output directory.
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("submission.csv")
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_eval_batch_size(),
            output_file: default_output_file(),
        }
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

/// Root configuration aggregating every section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloneDetectConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub rdrop: RDropConfig,

    #[serde(default)]
    pub inference: InferenceConfig,
}

impl CloneDetectConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `TrainError::Config` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> TrainResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrainError::config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            TrainError::config(format!("Failed to parse TOML in '{}': {}", path.display(), e))
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> TrainResult<Self> {
        toml::from_str(toml).map_err(|e| TrainError::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> TrainResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TrainError::config(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Validate every section, returning the first error prefixed by its
    /// section name.
    pub fn validate(&self) -> TrainResult<()> {
        self.model
            .validate()
            .map_err(|e| TrainError::config(format!("[model] {}", e)))?;
        self.data
            .validate()
            .map_err(|e| TrainError::config(format!("[data] {}", e)))?;
        self.training
            .validate()
            .map_err(|e| TrainError::config(format!("[training] {}", e)))?;
        self.rdrop
            .validate()
            .map_err(|e| TrainError::config(format!("[rdrop] {}", e)))?;
        self.inference
            .validate()
            .map_err(|e| TrainError::config(format!("[inference] {}", e)))?;
        Ok(())
    }

    /// Apply `CLONE_DETECT_*` environment overrides.
    ///
    /// | Variable | Config Path |
    /// |----------|-------------|
    /// | `CLONE_DETECT_PLM` | `model.plm` |
    /// | `CLONE_DETECT_MODEL_NAME` | `model.model_name` |
    /// | `CLONE_DETECT_PRETRAINED_DIR` | `model.pretrained_dir` |
    /// | `CLONE_DETECT_MAX_LENGTH` | `data.max_input_length` |
    /// | `CLONE_DETECT_BATCH_SIZE` | `training.batch_size` |
    /// | `CLONE_DETECT_LEARNING_RATE` | `training.learning_rate` |
    /// | `CLONE_DETECT_EPOCHS` | `training.epochs` |
    /// | `CLONE_DETECT_SEED` | `training.seed` |
    /// | `CLONE_DETECT_RDROP_ALPHA` | `rdrop.alpha` |
    /// | `CLONE_DETECT_OUTPUT_DIR` | `training.output_dir` |
    /// | `CLONE_DETECT_DATA_DIR` | `training.data_dir` |
    ///
    /// Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("CLONE_DETECT_PLM") {
            self.model.plm = val;
        }
        if let Some(val) = lookup("CLONE_DETECT_MODEL_NAME") {
            self.model.model_name = val;
        }
        if let Some(val) = lookup("CLONE_DETECT_PRETRAINED_DIR") {
            self.model.pretrained_dir = Some(PathBuf::from(val));
        }
        if let Some(n) = lookup("CLONE_DETECT_MAX_LENGTH").and_then(|v| v.parse().ok()) {
            self.data.max_input_length = n;
        }
        if let Some(n) = lookup("CLONE_DETECT_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.training.batch_size = n;
        }
        if let Some(lr) = lookup("CLONE_DETECT_LEARNING_RATE").and_then(|v| v.parse().ok()) {
            self.training.learning_rate = lr;
        }
        if let Some(n) = lookup("CLONE_DETECT_EPOCHS").and_then(|v| v.parse().ok()) {
            self.training.epochs = n;
        }
        if let Some(seed) = lookup("CLONE_DETECT_SEED").and_then(|v| v.parse().ok()) {
            self.training.seed = seed;
        }
        if let Some(alpha) = lookup("CLONE_DETECT_RDROP_ALPHA").and_then(|v| v.parse().ok()) {
            self.rdrop.alpha = alpha;
        }
        if let Some(val) = lookup("CLONE_DETECT_OUTPUT_DIR") {
            self.training.output_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("CLONE_DETECT_DATA_DIR") {
            self.training.data_dir = PathBuf::from(val);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CloneDetectConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.model.plm, "microsoft/codebert-base");
        assert_eq!(config.model.num_labels, 2);
        assert!((config.rdrop.alpha - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_toml_is_valid() {
        let config = CloneDetectConfig::from_toml_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.data.max_input_length, 512);
    }

    #[test]
    fn test_partial_toml() {
        let config = CloneDetectConfig::from_toml_str(
            r#"
            [model]
            plm = "t5-small"

            [training]
            max_steps = 10
            do_all = false
            num_folds = 3

            [rdrop]
            alpha = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.model.plm, "t5-small");
        assert_eq!(config.model.model_name, "base");
        assert_eq!(config.training.max_steps, Some(10));
        assert_eq!(config.training.num_folds, 3);
        assert!((config.rdrop.alpha - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validation_prefixes_section() {
        let mut config = CloneDetectConfig::default();
        config.rdrop.alpha = -1.0;
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("[rdrop]"), "got: {msg}");

        let mut config = CloneDetectConfig::default();
        config.data.max_input_length = 2;
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("[data]"), "got: {msg}");

        let mut config = CloneDetectConfig::default();
        config.model.dropout_rate = 1.0;
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("[model]"), "got: {msg}");
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = CloneDetectConfig::default();
        config.model.pretrained_dir = Some(PathBuf::from("/models/codebert"));
        config.training.train_samples = Some(1000);
        let text = config.to_toml_string().unwrap();
        let parsed = CloneDetectConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.model.pretrained_dir, config.model.pretrained_dir);
        assert_eq!(parsed.training.train_samples, Some(1000));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CLONE_DETECT_PLM", "facebook/bart-base"),
            ("CLONE_DETECT_MAX_LENGTH", "256"),
            ("CLONE_DETECT_LEARNING_RATE", "0.001"),
            ("CLONE_DETECT_SEED", "not-a-number"),
            ("CLONE_DETECT_RDROP_ALPHA", "2.5"),
        ]
        .into_iter()
        .collect();
        let config = CloneDetectConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.model.plm, "facebook/bart-base");
        assert_eq!(config.data.max_input_length, 256);
        assert!((config.training.learning_rate - 0.001).abs() < 1e-12);
        assert_eq!(config.training.seed, 42, "unparseable values are ignored");
        assert!((config.rdrop.alpha - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tokenizer_path_resolution() {
        let mut model = ModelConfig::default();
        assert!(model.resolved_tokenizer_path().is_none());
        model.pretrained_dir = Some(PathBuf::from("/m"));
        assert_eq!(model.resolved_tokenizer_path(), Some(PathBuf::from("/m/tokenizer.json")));
        model.tokenizer_path = Some(PathBuf::from("/t.json"));
        assert_eq!(model.resolved_tokenizer_path(), Some(PathBuf::from("/t.json")));
    }
}
