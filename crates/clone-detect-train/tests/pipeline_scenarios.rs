//! Family selection and full train/infer runs through the pipeline.

use std::path::Path;

use candle_core::Device;
use clone_detect_core::dataset::{load_csv, write_jsonl, write_submission};
use clone_detect_core::{CodePairRecord, DataError, FoldSelection, ModelFamily, RandomContext};
use clone_detect_test_utils::{bart_tokenizer, bert_tokenizer, sample_code_pairs, t5_tokenizer};
use clone_detect_train::pipeline::{CHECKPOINT_FILE, CONFIG_FILE, SUMMARY_FILE};
use clone_detect_train::{CloneDetectConfig, Pipeline, TrainError};
use tempfile::TempDir;

fn mean_pool_config(plm: &str, root: &Path) -> CloneDetectConfig {
    let mut config = CloneDetectConfig::default();
    config.model.plm = plm.to_string();
    config.model.model_name = "mean_pool".to_string();
    config.model.hidden_size = 8;
    config.data.max_input_length = 64;
    config.training.batch_size = 2;
    config.training.epochs = 2;
    config.training.learning_rate = 0.01;
    config.training.logging_steps = 1;
    config.training.data_dir = root.join("data");
    config.training.output_dir = root.join("out");
    config
}

fn labeled_records() -> Vec<CodePairRecord> {
    sample_code_pairs()
        .into_iter()
        .map(|(a, b, label)| CodePairRecord::labeled(a, b, label))
        .collect()
}

fn write_split(root: &Path, fold: &str, records: &[CodePairRecord]) {
    let dir = root.join("data").join(fold);
    write_jsonl(dir.join("train.jsonl"), records).unwrap();
    write_jsonl(dir.join("val.jsonl"), &records[..2]).unwrap();
}

#[test]
fn test_family_selection() {
    let dir = TempDir::new().unwrap();

    let codebert = Pipeline::new(
        mean_pool_config("microsoft/codebert-base", dir.path()),
        bert_tokenizer(),
        Device::Cpu,
    )
    .unwrap();
    assert_eq!(codebert.family(), ModelFamily::EncoderOnly);
    assert_eq!(codebert.preprocessor_names(), vec!["function", "annotation"]);
    assert_eq!(codebert.encoder_name(), "bert");
    assert_eq!(codebert.objective_name(), "rdrop");

    let t5 = Pipeline::new(mean_pool_config("t5-small", dir.path()), t5_tokenizer(), Device::Cpu).unwrap();
    assert_eq!(t5.family(), ModelFamily::T5);
    assert_eq!(t5.preprocessor_names(), vec!["base"]);
    assert_eq!(t5.encoder_name(), "t5");
    assert_eq!(t5.objective_name(), "cross_entropy");

    let bart = Pipeline::new(
        mean_pool_config("facebook/bart-base", dir.path()),
        bart_tokenizer(),
        Device::Cpu,
    )
    .unwrap();
    assert_eq!(bart.encoder_name(), "bart");
    assert_eq!(bart.objective_name(), "cross_entropy");

    let err = Pipeline::new(mean_pool_config("gpt2", dir.path()), bert_tokenizer(), Device::Cpu)
        .err()
        .unwrap();
    assert!(matches!(err, TrainError::Data(DataError::UnknownModelFamily { .. })));
    println!("[PASS] codebert/t5-small/bart-base resolve; gpt2 is rejected");
}

#[test]
fn test_invalid_config_rejected_before_data() {
    let dir = TempDir::new().unwrap();
    let mut config = mean_pool_config("t5-small", dir.path());
    config.training.batch_size = 0;
    let err = Pipeline::new(config, t5_tokenizer(), Device::Cpu).err().unwrap();
    assert!(err.to_string().contains("[training]"), "got: {err}");
}

#[test]
fn test_train_then_infer_encoder_only() {
    let dir = TempDir::new().unwrap();
    write_split(dir.path(), "all", &labeled_records());
    let config = mean_pool_config("microsoft/codebert-base", dir.path());
    let pipeline = Pipeline::new(config, bert_tokenizer(), Device::Cpu).unwrap();

    let runs = pipeline.run_all(&mut RandomContext::new(42)).unwrap();
    assert_eq!(runs.len(), 1);
    let (selection, summary) = &runs[0];
    assert_eq!(*selection, FoldSelection::All);
    assert_eq!(summary.steps, 6);
    assert!(summary.last_train_loss.unwrap().is_finite());
    assert_eq!(summary.final_metrics().unwrap().examples, 2);

    let run_dir = dir.path().join("out").join("all");
    for file in [CHECKPOINT_FILE, CONFIG_FILE, SUMMARY_FILE] {
        assert!(run_dir.join(file).is_file(), "missing {file}");
    }
    let saved = CloneDetectConfig::from_file(run_dir.join(CONFIG_FILE)).unwrap();
    assert_eq!(saved.model.plm, "microsoft/codebert-base");

    let inputs = vec![
        CodePairRecord::unlabeled("p-1", "def f(x): return x", "def g(y): return y"),
        CodePairRecord::labeled("x = 1", "print(x)", 0),
    ];
    let predictions = pipeline.infer(&run_dir, &inputs).unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0].pair_id, "p-1");
    assert_eq!(predictions[1].pair_id, "1");
    assert!(predictions.iter().all(|p| p.similar <= 1));

    let submission = dir.path().join("out").join("submission.csv");
    write_submission(&submission, &predictions).unwrap();
    let text = std::fs::read_to_string(&submission).unwrap();
    assert!(text.starts_with("pair_id,similar\n"));
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_kfold_runs_each_fold() {
    let dir = TempDir::new().unwrap();
    let records = labeled_records();
    write_split(dir.path(), "fold_1", &records);
    write_split(dir.path(), "fold_2", &records[..4]);

    let mut config = mean_pool_config("Salesforce/codet5-base", dir.path());
    config.training.do_all = false;
    config.training.num_folds = 2;
    config.training.train_samples = Some(3);
    let pipeline = Pipeline::new(config, t5_tokenizer(), Device::Cpu).unwrap();

    let runs = pipeline.run_all(&mut RandomContext::new(5)).unwrap();
    let folds: Vec<FoldSelection> = runs.iter().map(|(s, _)| *s).collect();
    assert_eq!(folds, vec![FoldSelection::Fold(1), FoldSelection::Fold(2)]);
    for (selection, summary) in &runs {
        assert_eq!(summary.steps, 4, "3 samples, batch 2, 2 epochs");
        assert!(dir
            .path()
            .join("out")
            .join(selection.dir_name())
            .join(CHECKPOINT_FILE)
            .is_file());
    }
}

#[test]
fn test_missing_fold_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut config = mean_pool_config("t5-small", dir.path());
    config.training.do_all = false;
    config.training.num_folds = 1;
    let pipeline = Pipeline::new(config, t5_tokenizer(), Device::Cpu).unwrap();
    let err = pipeline.run_all(&mut RandomContext::new(0)).err().unwrap();
    assert!(matches!(err, TrainError::Data(DataError::DatasetNotFound { .. })));
}

#[test]
fn test_csv_input_predictions_keep_order() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("test.csv");
    std::fs::write(
        &input,
        "pair_id,code1,code2\nb,def f(x): return x,x = 1\na,print(1),print(2)\n",
    )
    .unwrap();
    let records = load_csv(&input).unwrap();

    let config = mean_pool_config("facebook/bart-base", dir.path());
    let pipeline = Pipeline::new(config, bart_tokenizer(), Device::Cpu).unwrap();
    let mut model = pipeline.build_model().unwrap();
    let predictions = pipeline.predict(model.as_mut(), &records).unwrap();
    let ids: Vec<&str> = predictions.iter().map(|p| p.pair_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}
