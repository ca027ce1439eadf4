//! Embedding-bag classifier: token embeddings, masked mean, linear head.
//!
//! Serves the BART family, whose shared input embeddings initialize the
//! table, and the family-agnostic `mean_pool` variant, which starts from
//! random embeddings.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{embedding, linear, Embedding, Linear, Module, VarBuilder, VarMap};
use clone_detect_core::Batch;
use serde::Deserialize;
use tracing::info;

use super::weights::{load_pretrained, read_safetensors};
use super::{masked_mean_pool, ForwardMode, HeadDropout, SequenceClassifier};
use crate::error::{TrainError, TrainResult};

/// Names under which BART checkpoints store the shared token embeddings.
const SHARED_EMBEDDING_NAMES: &[&str] = &[
    "model.shared.weight",
    "shared.weight",
    "model.encoder.embed_tokens.weight",
];

#[derive(Debug, Deserialize)]
struct EmbeddingShape {
    vocab_size: usize,
    d_model: usize,
}

/// Mean of token embeddings over the attention mask, then a linear head.
pub struct MeanPoolClassifier {
    embeddings: Embedding,
    classifier: Linear,
    dropout: HeadDropout,
    num_labels: usize,
    varmap: VarMap,
}

impl MeanPoolClassifier {
    pub fn new(
        vocab_size: usize,
        hidden_size: usize,
        num_labels: usize,
        dropout: f32,
        device: &Device,
    ) -> TrainResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let embeddings = embedding(vocab_size, hidden_size, vb.pp("embeddings"))?;
        let classifier = linear(hidden_size, num_labels, vb.pp("classifier"))?;
        Ok(Self {
            embeddings,
            classifier,
            dropout: HeadDropout::new(dropout),
            num_labels,
            varmap,
        })
    }

    /// Initialize the embedding table from a pretrained BART directory.
    ///
    /// Reads `vocab_size` and `d_model` from `config.json` and the shared
    /// embedding matrix from `model.safetensors`.
    pub fn from_bart_pretrained(
        dir: &Path,
        num_labels: usize,
        dropout: f32,
        device: &Device,
    ) -> TrainResult<Self> {
        let config_path = dir.join("config.json");
        let shape: EmbeddingShape = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| TrainError::model_load(&config_path, e.to_string()))?;

        let weights_path = dir.join("model.safetensors");
        let mut tensors = read_safetensors(&weights_path, device)?;
        let shared = SHARED_EMBEDDING_NAMES
            .iter()
            .find_map(|name| tensors.remove(*name))
            .ok_or_else(|| TrainError::model_load(&weights_path, "no shared token embeddings found"))?;

        let model = Self::new(shape.vocab_size, shape.d_model, num_labels, dropout, device)?;
        let renamed = HashMap::from([("embeddings.weight".to_string(), shared)]);
        let report = load_pretrained(&model.varmap, &renamed, &weights_path)?;
        info!(
            dir = %dir.display(),
            loaded = report.loaded,
            d_model = shape.d_model,
            "Loaded shared embeddings for mean pooling"
        );
        Ok(model)
    }
}

impl SequenceClassifier for MeanPoolClassifier {
    fn name(&self) -> &str {
        "mean_pool"
    }

    fn forward(&mut self, batch: &Batch, mut mode: ForwardMode<'_>) -> TrainResult<Tensor> {
        let hidden = self.embeddings.forward(&batch.input_ids)?;
        let pooled = masked_mean_pool(&hidden, &batch.attention_mask)?;
        let pooled = self.dropout.apply(&pooled, &mut mode)?;
        Ok(self.classifier.forward(&pooled)?)
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn num_labels(&self) -> usize {
        self.num_labels
    }
}
