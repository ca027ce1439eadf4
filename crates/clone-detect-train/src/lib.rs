//! Classifiers, objectives and the training/inference pipeline for code
//! clone detection.
//!
//! # Architecture
//!
//! ```text
//! CloneDetectConfig ──> Pipeline::new ──> ModelFamily (resolved once)
//!                            │
//!        ┌───────────────────┼──────────────────────┐
//!        │                   │                      │
//!  PreprocessChain     PairEncoder         TrainingObjective
//!        │                   │              (R-Drop | CE)
//!        └──> PaddingCollator ──> Batch ──> SequenceClassifier
//!                                                   │
//!                                     Trainer (AdamW, warmup, clip)
//! ```
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with env overrides
//! - [`model`]: backbones, weight loading and the variant registry
//! - [`objective`]: cross-entropy and two-pass consistency objectives
//! - [`optimizer`]: AdamW with linear schedule and gradient clipping
//! - [`trainer`]: the training loop
//! - [`evaluation`]: accuracy, precision, recall, F1
//! - [`pipeline`]: family-resolved orchestration of all of the above

pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod objective;
pub mod optimizer;
pub mod pipeline;
pub mod trainer;

pub use config::{CloneDetectConfig, InferenceConfig, ModelConfig, RDropConfig, TrainingConfig};
pub use error::{TrainError, TrainResult};
pub use evaluation::EvalMetrics;
pub use model::{ForwardMode, ModelRegistry, SequenceClassifier};
pub use objective::{objective_for, LossOutput, PlainObjective, RDropObjective, TrainingObjective};
pub use pipeline::Pipeline;
pub use trainer::{TrainSummary, Trainer};
