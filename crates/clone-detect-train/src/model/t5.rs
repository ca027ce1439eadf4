//! Encoder-decoder family: the T5 encoder stack with mean pooling.
//!
//! Only the encoder half of the pretrained model is instantiated; decoder
//! tensors in the weight file are ignored on load.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Init, Linear, Module, VarBuilder, VarMap};
use candle_transformers::models::t5::{Config as T5Config, T5EncoderModel};
use clone_detect_core::Batch;
use tracing::info;

use super::weights::{load_pretrained, read_safetensors};
use super::{masked_mean_pool, ForwardMode, HeadDropout, SequenceClassifier};
use crate::error::{TrainError, TrainResult};

/// T5 encoder, masked mean pooling, dropout, linear head.
pub struct T5Classifier {
    encoder: T5EncoderModel,
    classifier: Linear,
    dropout: HeadDropout,
    num_labels: usize,
    varmap: VarMap,
}

impl T5Classifier {
    pub fn new(config: &T5Config, num_labels: usize, dropout: f32, device: &Device) -> TrainResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        // The encoder looks for `shared.weight` and otherwise falls back to the
        // decoder embeddings, so the shared table has to exist up front.
        vb.get_with_hints(
            (config.vocab_size, config.d_model),
            "shared.weight",
            Init::Randn {
                mean: 0.0,
                stdev: 1.0,
            },
        )?;
        let encoder = T5EncoderModel::load(vb.clone(), config)?;
        let classifier = linear(config.d_model, num_labels, vb.pp("classifier"))?;

        Ok(Self {
            encoder,
            classifier,
            dropout: HeadDropout::new(dropout),
            num_labels,
            varmap,
        })
    }

    /// Load `config.json` and `model.safetensors` from a pretrained directory.
    pub fn from_pretrained(dir: &Path, num_labels: usize, dropout: f32, device: &Device) -> TrainResult<Self> {
        let config_path = dir.join("config.json");
        let config: T5Config = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| TrainError::model_load(&config_path, e.to_string()))?;

        let weights_path = dir.join("model.safetensors");
        let tensors = read_safetensors(&weights_path, device)?;
        let model = Self::new(&config, num_labels, dropout, device)?;
        let report = load_pretrained(&model.varmap, &tensors, &weights_path)?;
        info!(
            dir = %dir.display(),
            loaded = report.loaded,
            d_model = config.d_model,
            "Loaded T5 encoder backbone"
        );
        Ok(model)
    }
}

impl SequenceClassifier for T5Classifier {
    fn name(&self) -> &str {
        "t5"
    }

    fn forward(&mut self, batch: &Batch, mut mode: ForwardMode<'_>) -> TrainResult<Tensor> {
        let hidden = self.encoder.forward(&batch.input_ids)?;
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
