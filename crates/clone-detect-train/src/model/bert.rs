//! Encoder-only backbone with a `[CLS]` classification head.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use clone_detect_core::Batch;
use tracing::info;

use super::weights::{detect_prefix, load_pretrained, read_safetensors};
use super::{token_type_ids_or_zeros, ForwardMode, HeadDropout, SequenceClassifier};
use crate::error::{TrainError, TrainResult};

const WEIGHT_PREFIXES: &[&str] = &["bert", "roberta"];

/// BERT / RoBERTa encoder, `[CLS]` pooling, dropout, linear head.
pub struct BertClassifier {
    bert: BertModel,
    classifier: Linear,
    dropout: HeadDropout,
    zero_type_ids: bool,
    num_labels: usize,
    varmap: VarMap,
}

impl BertClassifier {
    /// Build a randomly initialized classifier from a backbone config.
    ///
    /// `prefix` places backbone parameters under `"{prefix}."`, matching the
    /// layout of the weights that will be loaded into it.
    pub fn new(
        config: &BertConfig,
        prefix: Option<&str>,
        num_labels: usize,
        dropout: f32,
        device: &Device,
    ) -> TrainResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let backbone_vb = match prefix {
            Some(p) => vb.pp(p),
            None => vb.clone(),
        };
        let bert = BertModel::load(backbone_vb, config)?;
        let classifier = linear(config.hidden_size, num_labels, vb.pp("classifier"))?;

        Ok(Self {
            bert,
            classifier,
            dropout: HeadDropout::new(dropout),
            zero_type_ids: config.type_vocab_size <= 1,
            num_labels,
            varmap,
        })
    }

    /// Load `config.json` and `model.safetensors` from a pretrained directory.
    pub fn from_pretrained(dir: &Path, num_labels: usize, dropout: f32, device: &Device) -> TrainResult<Self> {
        let config_path = dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| TrainError::model_load(&config_path, e.to_string()))?;

        let weights_path = dir.join("model.safetensors");
        let tensors = read_safetensors(&weights_path, device)?;
        let prefix = detect_prefix(tensors.keys(), WEIGHT_PREFIXES);

        let model = Self::new(&config, prefix.as_deref(), num_labels, dropout, device)?;
        let report = load_pretrained(&model.varmap, &tensors, &weights_path)?;
        info!(
            dir = %dir.display(),
            prefix = prefix.as_deref().unwrap_or("<root>"),
            loaded = report.loaded,
            hidden_size = config.hidden_size,
            "Loaded encoder-only backbone"
        );
        Ok(model)
    }
}

impl SequenceClassifier for BertClassifier {
    fn name(&self) -> &str {
        "bert"
    }

    fn forward(&mut self, batch: &Batch, mut mode: ForwardMode<'_>) -> TrainResult<Tensor> {
        let type_ids = if self.zero_type_ids {
            batch.input_ids.zeros_like()?
        } else {
            token_type_ids_or_zeros(batch)?
        };
        let hidden = self
            .bert
            .forward(&batch.input_ids, &type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let cls = self.dropout.apply(&cls, &mut mode)?;
        Ok(self.classifier.forward(&cls)?)
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn num_labels(&self) -> usize {
        self.num_labels
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use clone_detect_core::{
        BertEncoder, CodePairRecord, CodeTokenizer, PaddingCollator, PaddingStrategy, PairEncoder,
        TruncationSide,
    };
    use clone_detect_test_utils::fixtures;

    /// Two-layer BERT small enough for unit tests.
    fn tiny_config(vocab_size: usize) -> BertConfig {
        serde_json::from_value(serde_json::json!({
            "vocab_size": vocab_size,
            "hidden_size": 16,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "intermediate_size": 32,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.1,
            "max_position_embeddings": 64,
            "type_vocab_size": 2,
            "initializer_range": 0.02,
            "layer_norm_eps": 1e-12,
            "pad_token_id": 0
        }))
        .unwrap()
    }

    #[test]
    fn test_forward_shape_and_eval_determinism() {
        let tok = Arc::new(CodeTokenizer::new(fixtures::bert_tokenizer(), 32, TruncationSide::Right).unwrap());
        let encoder = BertEncoder::new(tok.clone());
        let examples = encoder
            .encode_batch(&[
                CodePairRecord::labeled("def f(x): return x", "def g(y): return y", 1),
                CodePairRecord::labeled("x = 1", "print(x)", 0),
            ])
            .unwrap();
        let batch = PaddingCollator::new(tok.pad_id(), PaddingStrategy::Dynamic, 32, Device::Cpu)
            .collate(&examples)
            .unwrap();

        let mut model = BertClassifier::new(&tiny_config(tok.vocab_size()), None, 2, 0.1, &Device::Cpu).unwrap();
        let a = model.forward(&batch, ForwardMode::Eval).unwrap();
        let b = model.forward(&batch, ForwardMode::Eval).unwrap();
        assert_eq!(a.dims(), &[2, 2]);
        assert_eq!(a.to_vec2::<f32>().unwrap(), b.to_vec2::<f32>().unwrap());
        assert!(model.varmap().all_vars().len() > 4);
    }

    #[test]
    fn test_prefixed_parameters() {
        let model = BertClassifier::new(&tiny_config(50), Some("roberta"), 2, 0.0, &Device::Cpu).unwrap();
        let data = model.varmap().data().lock().unwrap();
        assert!(data.keys().any(|k| k.starts_with("roberta.embeddings.")));
        assert!(data.contains_key("classifier.weight"));
    }
}
