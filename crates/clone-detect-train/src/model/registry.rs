//! Classifier variants keyed by `(family, name)`.

use std::collections::HashMap;
use std::path::Path;

use candle_core::Device;
use clone_detect_core::ModelFamily;
use tracing::info;

use super::{BertClassifier, MeanPoolClassifier, SequenceClassifier, T5Classifier};
use crate::config::ModelConfig;
use crate::error::{TrainError, TrainResult};

/// Inputs available to a model builder.
pub struct ModelBuildContext<'a> {
    pub config: &'a ModelConfig,
    /// Tokenizer vocabulary size, including added tokens.
    pub vocab_size: usize,
    pub device: &'a Device,
}

impl ModelBuildContext<'_> {
    fn pretrained_dir(&self) -> TrainResult<&Path> {
        self.config.pretrained_dir.as_deref().ok_or_else(|| {
            TrainError::config(format!(
                "model.pretrained_dir is required for variant '{}'",
                self.config.model_name
            ))
        })
    }
}

/// Constructor for a registered variant.
pub type ModelBuilder = fn(&ModelBuildContext<'_>) -> TrainResult<Box<dyn SequenceClassifier>>;

/// Lookup table from `(family, model_name)` to a builder.
pub struct ModelRegistry {
    builders: HashMap<(ModelFamily, String), ModelBuilder>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ModelRegistry {
    /// Registry with no variants.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with the built-in variants.
    ///
    /// | family        | `base`                         | `mean_pool`          |
    /// |---------------|--------------------------------|----------------------|
    /// | encoder_only  | BERT/RoBERTa, `[CLS]` head     | random embeddings    |
    /// | t5            | T5 encoder, mean pooling       | random embeddings    |
    /// | bart          | shared embeddings, mean pooling| random embeddings    |
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(ModelFamily::EncoderOnly, "base", build_bert);
        registry.register(ModelFamily::T5, "base", build_t5);
        registry.register(ModelFamily::Bart, "base", build_bart);
        for family in ModelFamily::ALL {
            registry.register(family, "mean_pool", build_mean_pool);
        }
        registry
    }

    /// Add or replace a variant.
    pub fn register(&mut self, family: ModelFamily, name: impl Into<String>, builder: ModelBuilder) {
        self.builders.insert((family, name.into()), builder);
    }

    pub fn contains(&self, family: ModelFamily, name: &str) -> bool {
        self.builders.contains_key(&(family, name.to_string()))
    }

    /// Registered names for a family, sorted.
    pub fn names(&self, family: ModelFamily) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .builders
            .keys()
            .filter(|(f, _)| *f == family)
            .map(|(_, n)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Build the variant named by `ctx.config.model_name`.
    ///
    /// # Errors
    /// - `TrainError::UnknownModel` when nothing is registered under the key
    /// - whatever the builder returns
    pub fn build(
        &self,
        family: ModelFamily,
        ctx: &ModelBuildContext<'_>,
    ) -> TrainResult<Box<dyn SequenceClassifier>> {
        let name = ctx.config.model_name.as_str();
        let builder = self
            .builders
            .get(&(family, name.to_string()))
            .ok_or_else(|| TrainError::UnknownModel {
                family,
                name: name.to_string(),
            })?;
        let model = builder(ctx)?;
        info!(
            family = %family,
            variant = name,
            classifier = model.name(),
            parameters = model.varmap().all_vars().len(),
            "Built classifier"
        );
        Ok(model)
    }
}

fn build_bert(ctx: &ModelBuildContext<'_>) -> TrainResult<Box<dyn SequenceClassifier>> {
    let model = BertClassifier::from_pretrained(
        ctx.pretrained_dir()?,
        ctx.config.num_labels,
        ctx.config.dropout_rate,
        ctx.device,
    )?;
    Ok(Box::new(model))
}

fn build_t5(ctx: &ModelBuildContext<'_>) -> TrainResult<Box<dyn SequenceClassifier>> {
    let model = T5Classifier::from_pretrained(
        ctx.pretrained_dir()?,
        ctx.config.num_labels,
        ctx.config.dropout_rate,
        ctx.device,
    )?;
    Ok(Box::new(model))
}

fn build_bart(ctx: &ModelBuildContext<'_>) -> TrainResult<Box<dyn SequenceClassifier>> {
    let model = MeanPoolClassifier::from_bart_pretrained(
        ctx.pretrained_dir()?,
        ctx.config.num_labels,
        ctx.config.dropout_rate,
        ctx.device,
    )?;
    Ok(Box::new(model))
}

fn build_mean_pool(ctx: &ModelBuildContext<'_>) -> TrainResult<Box<dyn SequenceClassifier>> {
    let model = MeanPoolClassifier::new(
        ctx.vocab_size,
        ctx.config.hidden_size,
        ctx.config.num_labels,
        ctx.config.dropout_rate,
        ctx.device,
    )?;
    Ok(Box::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_every_family() {
        let registry = ModelRegistry::with_builtins();
        for family in ModelFamily::ALL {
            assert!(registry.contains(family, "base"));
            assert_eq!(registry.names(family), vec!["base", "mean_pool"]);
        }
        assert!(!registry.contains(ModelFamily::T5, "large"));
    }

    #[test]
    fn test_unknown_variant() {
        let registry = ModelRegistry::with_builtins();
        let config = ModelConfig {
            model_name: "siamese".to_string(),
            ..ModelConfig::default()
        };
        let ctx = ModelBuildContext {
            config: &config,
            vocab_size: 10,
            device: &Device::Cpu,
        };
        let err = registry.build(ModelFamily::Bart, &ctx).err().unwrap();
        assert!(matches!(err, TrainError::UnknownModel { family: ModelFamily::Bart, .. }));
    }

    #[test]
    fn test_base_requires_pretrained_dir() {
        let registry = ModelRegistry::with_builtins();
        let config = ModelConfig::default();
        let ctx = ModelBuildContext {
            config: &config,
            vocab_size: 10,
            device: &Device::Cpu,
        };
        let err = registry.build(ModelFamily::EncoderOnly, &ctx).err().unwrap();
        assert!(matches!(err, TrainError::Config { .. }));
    }

    #[test]
    fn test_mean_pool_variant_builds() {
        let registry = ModelRegistry::with_builtins();
        let config = ModelConfig {
            model_name: "mean_pool".to_string(),
            hidden_size: 8,
            ..ModelConfig::default()
        };
        let ctx = ModelBuildContext {
            config: &config,
            vocab_size: 20,
            device: &Device::Cpu,
        };
        let model = registry.build(ModelFamily::T5, &ctx).unwrap();
        assert_eq!(model.name(), "mean_pool");
        assert_eq!(model.num_labels(), 2);
    }
}
