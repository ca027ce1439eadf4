//! Orchestrator wiring family-specific components.
//!
//! The model family is resolved once in [`Pipeline::new`]; preprocessing
//! chain, pair encoder, collator, objective and classifier are all chosen
//! from it. Configuration problems surface there, before any data is read.

use std::path::Path;
use std::sync::Arc;

use candle_core::Device;
use clone_detect_core::dataset::{assign_row_ids, subsample};
use clone_detect_core::{
    encoder_for, CodePairRecord, CodeTokenizer, DatasetSource, EncodedExample, FoldSelection,
    ModelFamily, PaddingCollator, PairEncoder, Prediction, PreprocessChain, RandomContext, Split,
};
use rayon::ThreadPool;
use tokenizers::Tokenizer;
use tracing::info;

use crate::config::CloneDetectConfig;
use crate::error::{TrainError, TrainResult};
use crate::model::weights::{load_checkpoint, save_checkpoint};
use crate::model::{ModelBuildContext, ModelRegistry, SequenceClassifier};
use crate::objective::{objective_for, TrainingObjective};
use crate::trainer::{predict_labels, TrainSummary, Trainer};

/// File names inside a run's output directory.
pub const CHECKPOINT_FILE: &str = "model.safetensors";
pub const CONFIG_FILE: &str = "config.toml";
pub const SUMMARY_FILE: &str = "training_summary.json";

/// Family-resolved components for one configuration.
pub struct Pipeline {
    config: CloneDetectConfig,
    family: ModelFamily,
    tokenizer: Arc<CodeTokenizer>,
    chain: PreprocessChain,
    encoder: Box<dyn PairEncoder>,
    collator: PaddingCollator,
    objective: Box<dyn TrainingObjective>,
    registry: ModelRegistry,
    pool: Option<ThreadPool>,
    device: Device,
}

impl Pipeline {
    /// Wire a pipeline with the built-in model registry.
    ///
    /// # Errors
    /// - `TrainError::Config` for invalid configuration values
    /// - `DataError::UnknownModelFamily` when `model.plm` names no known family
    /// - `TrainError::UnknownModel` when `model.model_name` is not registered
    pub fn new(config: CloneDetectConfig, tokenizer: Tokenizer, device: Device) -> TrainResult<Self> {
        Self::with_registry(config, tokenizer, device, ModelRegistry::with_builtins())
    }

    pub fn with_registry(
        config: CloneDetectConfig,
        tokenizer: Tokenizer,
        device: Device,
        registry: ModelRegistry,
    ) -> TrainResult<Self> {
        config.validate()?;
        let family = ModelFamily::from_identifier(&config.model.plm)?;
        if !registry.contains(family, &config.model.model_name) {
            return Err(TrainError::UnknownModel {
                family,
                name: config.model.model_name.clone(),
            });
        }

        let tokenizer = Arc::new(CodeTokenizer::new(
            tokenizer,
            config.data.max_input_length,
            config.data.truncation_side,
        )?);
        let chain = PreprocessChain::for_family(family);
        let encoder = encoder_for(family, Arc::clone(&tokenizer), &config.data);
        let collator = PaddingCollator::from_config(&config.data, tokenizer.pad_id(), device.clone());
        let objective = objective_for(family, &config.rdrop);
        let pool = match config.data.num_workers {
            0 => None,
            n => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| TrainError::config(format!("failed to build worker pool: {}", e)))?,
            ),
        };

        info!(
            plm = %config.model.plm,
            family = %family,
            preprocessors = ?chain.names(),
            encoder = encoder.name(),
            objective = objective.name(),
            variant = %config.model.model_name,
            "Resolved model family"
        );

        Ok(Self {
            config,
            family,
            tokenizer,
            chain,
            encoder,
            collator,
            objective,
            registry,
            pool,
            device,
        })
    }

    /// Load the tokenizer named by the configuration and wire a pipeline.
    pub fn from_config(config: CloneDetectConfig, device: Device) -> TrainResult<Self> {
        config.validate()?;
        ModelFamily::from_identifier(&config.model.plm)?;
        let path = config.model.resolved_tokenizer_path().ok_or_else(|| {
            TrainError::config("[model] either tokenizer_path or pretrained_dir must be set")
        })?;
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| TrainError::model_load(&path, format!("failed to load tokenizer: {}", e)))?;
        Self::new(config, tokenizer, device)
    }

    pub fn config(&self) -> &CloneDetectConfig {
        &self.config
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn tokenizer(&self) -> &CodeTokenizer {
        &self.tokenizer
    }

    pub fn preprocessor_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    pub fn encoder_name(&self) -> &'static str {
        self.encoder.name()
    }

    pub fn objective_name(&self) -> &'static str {
        self.objective.name()
    }

    pub fn collator(&self) -> &PaddingCollator {
        &self.collator
    }

    fn run_parallel<T: Send>(&self, f: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Preprocess and encode records, preserving order.
    pub fn prepare(&self, records: &[CodePairRecord]) -> TrainResult<Vec<EncodedExample>> {
        let chain = &self.chain;
        let encoder = &self.encoder;
        let examples = self.run_parallel(|| {
            let cleaned = chain.transform(records);
            encoder.encode_batch(&cleaned)
        })?;
        Ok(examples)
    }

    /// Apply the length filter, then [`prepare`](Self::prepare). Used for
    /// both training and validation splits.
    pub fn prepare_training(&self, records: Vec<CodePairRecord>) -> TrainResult<Vec<EncodedExample>> {
        let records = match self.config.data.length_filter() {
            Some(filter) => filter.apply(records),
            None => records,
        };
        self.prepare(&records)
    }

    /// Build the configured classifier variant.
    pub fn build_model(&self) -> TrainResult<Box<dyn SequenceClassifier>> {
        let ctx = ModelBuildContext {
            config: &self.config.model,
            vocab_size: self.tokenizer.vocab_size(),
            device: &self.device,
        };
        self.registry.build(self.family, &ctx)
    }

    /// Train `model` on raw records.
    pub fn train(
        &self,
        model: &mut dyn SequenceClassifier,
        train: Vec<CodePairRecord>,
        val: Vec<CodePairRecord>,
        rng: &mut RandomContext,
    ) -> TrainResult<TrainSummary> {
        let train = self.prepare_training(train)?;
        let val = self.prepare_training(val)?;
        Trainer::new(&self.config.training, self.objective.as_ref(), &self.collator).train(model, &train, &val, rng)
    }

    /// Load one fold, train a fresh model and write its artifacts under
    /// `{output_dir}/{fold}`.
    pub fn run_training(&self, selection: FoldSelection, rng: &mut RandomContext) -> TrainResult<TrainSummary> {
        let training = &self.config.training;
        let source = DatasetSource::new(&training.data_dir);
        let train = source.load(selection, Split::Train)?;
        let val = source.load(selection, Split::Validation)?;
        let train = subsample(&train, training.train_samples, rng);
        let val = subsample(&val, training.val_samples, rng);

        let mut model = self.build_model()?;
        let summary = self.train(model.as_mut(), train, val, rng)?;

        let run_dir = training.output_dir.join(selection.dir_name());
        self.save_run(model.as_ref(), &summary, &run_dir)?;
        Ok(summary)
    }

    /// Train on `all/` or on every fold, per `training.do_all`.
    ///
    /// Each run draws from its own fork of `rng`.
    pub fn run_all(&self, rng: &mut RandomContext) -> TrainResult<Vec<(FoldSelection, TrainSummary)>> {
        let selections: Vec<FoldSelection> = if self.config.training.do_all {
            vec![FoldSelection::All]
        } else {
            (1..=self.config.training.num_folds).map(FoldSelection::Fold).collect()
        };

        let mut results = Vec::with_capacity(selections.len());
        for selection in selections {
            let mut run_rng = rng.fork();
            info!(fold = %selection.dir_name(), seed = run_rng.seed(), "Starting run");
            let summary = self.run_training(selection, &mut run_rng)?;
            results.push((selection, summary));
        }
        Ok(results)
    }

    /// Write weights, the effective configuration and the run summary.
    pub fn save_run(&self, model: &dyn SequenceClassifier, summary: &TrainSummary, dir: &Path) -> TrainResult<()> {
        std::fs::create_dir_all(dir)?;
        save_checkpoint(model.varmap(), &dir.join(CHECKPOINT_FILE))?;
        std::fs::write(dir.join(CONFIG_FILE), self.config.to_toml_string()?)?;
        std::fs::write(dir.join(SUMMARY_FILE), serde_json::to_string_pretty(summary)?)?;
        info!(dir = %dir.display(), "Saved run artifacts");
        Ok(())
    }

    /// Build the configured variant and restore fine-tuned weights from
    /// `{dir}/model.safetensors`.
    pub fn load_trained(&self, dir: &Path) -> TrainResult<Box<dyn SequenceClassifier>> {
        let model = self.build_model()?;
        load_checkpoint(model.varmap(), &dir.join(CHECKPOINT_FILE), &self.device)?;
        Ok(model)
    }

    /// Arg-max predictions in input order.
    ///
    /// Records without an identifier are keyed by their row index.
    pub fn predict(
        &self,
        model: &mut dyn SequenceClassifier,
        records: &[CodePairRecord],
    ) -> TrainResult<Vec<Prediction>> {
        let mut records = records.to_vec();
        assign_row_ids(&mut records);
        let examples = self.prepare(&records)?;
        let labels = predict_labels(model, &examples, &self.collator, self.config.inference.batch_size)?;

        let predictions: Vec<Prediction> = records
            .into_iter()
            .zip(labels)
            .map(|(record, similar)| Prediction {
                pair_id: record.id.unwrap_or_default(),
                similar,
            })
            .collect();
        info!(records = predictions.len(), "Predicted");
        Ok(predictions)
    }

    /// Restore a checkpoint and predict.
    pub fn infer(&self, checkpoint_dir: &Path, records: &[CodePairRecord]) -> TrainResult<Vec<Prediction>> {
        let mut model = self.load_trained(checkpoint_dir)?;
        self.predict(model.as_mut(), records)
    }
}
