//! Loss behavior of the training objectives on real forward passes.

use std::sync::Arc;

use candle_core::Device;
use candle_transformers::models::bert::Config as BertConfig;
use clone_detect_core::{
    encoder_for, Batch, CodePairRecord, CodeTokenizer, DataConfig, EncodedExample, ModelFamily,
    PaddingCollator, PaddingStrategy, PreprocessChain, RandomContext, TruncationSide,
};
use clone_detect_test_utils::bert_tokenizer;
use clone_detect_train::model::{BertClassifier, MeanPoolClassifier};
use clone_detect_train::{PlainObjective, RDropObjective, SequenceClassifier, TrainingObjective};

fn tiny_bert(vocab_size: usize, dropout: f32) -> BertClassifier {
    let config: BertConfig = serde_json::from_value(serde_json::json!({
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
    .unwrap();
    BertClassifier::new(&config, None, 2, dropout, &Device::Cpu).unwrap()
}

/// The canonical pair, preprocessed and encoded the encoder-only way.
fn codebert_batch() -> (Batch, usize) {
    let family = ModelFamily::from_identifier("microsoft/codebert-base").unwrap();
    let tokenizer = Arc::new(CodeTokenizer::new(bert_tokenizer(), 64, TruncationSide::Right).unwrap());
    let records = PreprocessChain::for_family(family).transform(&[
        CodePairRecord::labeled("def f(x): return x+1", "def f(y): return y + 1", 1),
        CodePairRecord::labeled("x = 1\nprint(x)", "def g(a, b): return a * b", 0),
    ]);
    let examples = encoder_for(family, tokenizer.clone(), &DataConfig::default())
        .encode_batch(&records)
        .unwrap();
    let batch = PaddingCollator::new(tokenizer.pad_id(), PaddingStrategy::Dynamic, 64, Device::Cpu)
        .collate(&examples)
        .unwrap();
    (batch, tokenizer.vocab_size())
}

#[test]
fn test_rdrop_without_dropout_has_zero_divergence() {
    let (batch, vocab) = codebert_batch();
    let mut model = tiny_bert(vocab, 0.0);
    let out = RDropObjective::new(1.0)
        .compute_loss(&mut model, &batch, &mut RandomContext::new(7))
        .unwrap();

    assert_eq!(out.num_valid, 2);
    assert_eq!(out.components.divergence, Some(0.0));
    assert_eq!(out.components.ce_second, Some(out.components.ce_first));
    assert_eq!(out.components.total, out.components.ce_first);
    println!("[PASS] dropout disabled: D = 0 and total = CE of the first pass");
}

#[test]
fn test_rdrop_with_dropout_has_positive_divergence() {
    let (batch, vocab) = codebert_batch();
    let mut model = tiny_bert(vocab, 0.3);
    let out = RDropObjective::new(1.0)
        .compute_loss(&mut model, &batch, &mut RandomContext::new(7))
        .unwrap();

    let divergence = out.components.divergence.unwrap();
    assert!(divergence > 0.0, "divergence {divergence}");
    assert!(out.components.total.is_finite());
    assert!(out.components.total >= 0.0);
    assert_eq!(out.loss.to_scalar::<f32>().unwrap(), out.components.total);
}

#[test]
fn test_rdrop_is_reproducible_from_seed() {
    let (batch, vocab) = codebert_batch();
    let mut model = tiny_bert(vocab, 0.3);
    let objective = RDropObjective::new(0.5);
    let a = objective.compute_loss(&mut model, &batch, &mut RandomContext::new(11)).unwrap();
    let b = objective.compute_loss(&mut model, &batch, &mut RandomContext::new(11)).unwrap();
    assert_eq!(a.components, b.components);
}

#[test]
fn test_unlabeled_batch_yields_zero_loss() {
    let examples = vec![EncodedExample {
        input_ids: vec![2, 5, 3],
        attention_mask: vec![1, 1, 1],
        token_type_ids: None,
        label: None,
    }];
    let batch = PaddingCollator::new(0, PaddingStrategy::Dynamic, 8, Device::Cpu)
        .collate(&examples)
        .unwrap();
    let mut model = MeanPoolClassifier::new(10, 4, 2, 0.1, &Device::Cpu).unwrap();
    let mut rng = RandomContext::new(0);

    for objective in [&RDropObjective::default() as &dyn TrainingObjective, &PlainObjective] {
        let out = objective.compute_loss(&mut model, &batch, &mut rng).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.loss.to_scalar::<f32>().unwrap(), 0.0);
    }
}

#[test]
fn test_plain_objective_single_pass() {
    let (batch, vocab) = codebert_batch();
    let mut model = tiny_bert(vocab, 0.1);
    let out = PlainObjective
        .compute_loss(&mut model, &batch, &mut RandomContext::new(1))
        .unwrap();
    assert_eq!(out.components.ce_second, None);
    assert_eq!(out.components.divergence, None);
    assert_eq!(out.components.total, out.components.ce_first);
    assert!(out.components.total > 0.0);
    assert_eq!(model.num_labels(), 2);
}
