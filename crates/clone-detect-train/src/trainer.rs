//! Training loop.
//!
//! ```text
//! shuffle ─> collate ─> objective.compute_loss ─> backward ─> clip ─> AdamW
//!                              │                                  │
//!                    no labels: skip step          every eval_steps: evaluate
//! ```

use clone_detect_core::{EncodedExample, PaddingCollator, RandomContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::error::{TrainError, TrainResult};
use crate::evaluation::{argmax_predictions, compute_metrics, EvalMetrics};
use crate::model::{ForwardMode, SequenceClassifier};
use crate::objective::{labeled_rows, masked_cross_entropy, TrainingObjective};
use crate::optimizer::ScheduledOptimizer;

/// Outcome of a training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainSummary {
    /// Optimizer updates applied.
    pub steps: usize,
    /// Full passes over the training set.
    pub epochs: usize,
    /// Batches skipped for lacking labels.
    pub skipped_batches: usize,
    /// Mean training loss over the last logging window.
    pub last_train_loss: Option<f32>,
    /// `(step, metrics)` for every evaluation.
    pub evaluations: Vec<(usize, EvalMetrics)>,
}

impl TrainSummary {
    /// Metrics of the last evaluation.
    pub fn final_metrics(&self) -> Option<&EvalMetrics> {
        self.evaluations.last().map(|(_, m)| m)
    }
}

/// Drives an objective over encoded examples.
pub struct Trainer<'a> {
    config: &'a TrainingConfig,
    objective: &'a dyn TrainingObjective,
    collator: &'a PaddingCollator,
}

impl<'a> Trainer<'a> {
    pub fn new(
        config: &'a TrainingConfig,
        objective: &'a dyn TrainingObjective,
        collator: &'a PaddingCollator,
    ) -> Self {
        Self {
            config,
            objective,
            collator,
        }
    }

    /// Optimizer updates the run will attempt.
    pub fn total_steps(&self, num_examples: usize) -> usize {
        let per_epoch = num_examples.div_ceil(self.config.batch_size);
        self.config
            .max_steps
            .unwrap_or(per_epoch * self.config.epochs)
    }

    /// Train `model` in place.
    ///
    /// # Errors
    /// - `TrainError::NonFiniteLoss` when a step's loss is NaN or infinite
    /// - tensor and collation errors
    pub fn train(
        &self,
        model: &mut dyn SequenceClassifier,
        train: &[EncodedExample],
        val: &[EncodedExample],
        rng: &mut RandomContext,
    ) -> TrainResult<TrainSummary> {
        let mut summary = TrainSummary::default();
        let total_steps = self.total_steps(train.len());
        if train.is_empty() || total_steps == 0 {
            warn!(examples = train.len(), "Nothing to train on");
            return Ok(summary);
        }

        let mut optimizer = ScheduledOptimizer::new(model.varmap().all_vars(), self.config, total_steps)?;
        info!(
            objective = self.objective.name(),
            model = model.name(),
            examples = train.len(),
            total_steps,
            warmup_steps = optimizer.schedule().warmup_steps,
            "Starting training"
        );

        let mut window_loss = 0f32;
        let mut window_steps = 0usize;
        'epochs: loop {
            if self.config.max_steps.is_none() && summary.epochs >= self.config.epochs {
                break;
            }
            let steps_before = summary.steps;
            let mut order: Vec<usize> = (0..train.len()).collect();
            rng.shuffle(&mut order);

            for chunk in order.chunks(self.config.batch_size) {
                if summary.steps >= total_steps {
                    break 'epochs;
                }
                let examples: Vec<EncodedExample> = chunk.iter().map(|&i| train[i].clone()).collect();
                let batch = self.collator.collate(&examples)?;
                let output = self.objective.compute_loss(model, &batch, rng)?;
                if output.is_empty() {
                    summary.skipped_batches += 1;
                    debug!(batch = examples.len(), "Skipping batch without labels");
                    continue;
                }

                let total = output.components.total;
                if !total.is_finite() {
                    return Err(TrainError::NonFiniteLoss {
                        step: summary.steps + 1,
                        value: total,
                    });
                }

                let grad_norm = optimizer.backward_step(&output.loss)?;
                summary.steps += 1;
                window_loss += total;
                window_steps += 1;

                if summary.steps % self.config.logging_steps == 0 {
                    let mean = window_loss / window_steps as f32;
                    summary.last_train_loss = Some(mean);
                    info!(
                        step = summary.steps,
                        epoch = summary.epochs,
                        loss = mean,
                        ce_first = output.components.ce_first,
                        ce_second = ?output.components.ce_second,
                        divergence = ?output.components.divergence,
                        grad_norm,
                        lr = optimizer.learning_rate(),
                        "Training step"
                    );
                    window_loss = 0.0;
                    window_steps = 0;
                }

                if let Some(every) = self.config.eval_steps {
                    if summary.steps % every == 0 && summary.steps < total_steps && !val.is_empty() {
                        let metrics = self.evaluate(model, val)?;
                        info!(step = summary.steps, %metrics, "Evaluation");
                        summary.evaluations.push((summary.steps, metrics));
                    }
                }
            }

            summary.epochs += 1;
            if summary.steps == steps_before {
                warn!(epoch = summary.epochs, "Epoch produced no updates; stopping");
                break;
            }
        }

        if window_steps > 0 {
            summary.last_train_loss = Some(window_loss / window_steps as f32);
        }
        if !val.is_empty() {
            let metrics = self.evaluate(model, val)?;
            info!(step = summary.steps, %metrics, "Final evaluation");
            summary.evaluations.push((summary.steps, metrics));
        }
        info!(
            steps = summary.steps,
            epochs = summary.epochs,
            skipped = summary.skipped_batches,
            "Training finished"
        );
        Ok(summary)
    }

    /// Eval-mode loss and classification metrics over labeled examples.
    pub fn evaluate(&self, model: &mut dyn SequenceClassifier, examples: &[EncodedExample]) -> TrainResult<EvalMetrics> {
        let mut predictions = Vec::new();
        let mut labels = Vec::new();
        let mut loss_sum = 0f32;

        for chunk in examples.chunks(self.config.eval_batch_size) {
            let batch = self.collator.collate(chunk)?;
            let rows = labeled_rows(&batch)?;
            if rows.is_empty() {
                continue;
            }
            let logits = model.forward(&batch, ForwardMode::Eval)?;
            let loss = masked_cross_entropy(&logits, &rows)?.to_scalar::<f32>()?;
            loss_sum += loss * rows.count as f32;
            predictions.extend(argmax_predictions(&rows.select(&logits)?)?);
            labels.extend(rows.targets.to_vec1::<u32>()?);
        }

        let mut metrics = compute_metrics(&predictions, &labels);
        if metrics.examples > 0 {
            metrics.loss = loss_sum / metrics.examples as f32;
        }
        Ok(metrics)
    }
}

/// Arg-max class for every example, in order.
pub fn predict_labels(
    model: &mut dyn SequenceClassifier,
    examples: &[EncodedExample],
    collator: &PaddingCollator,
    batch_size: usize,
) -> TrainResult<Vec<u32>> {
    let mut predictions = Vec::with_capacity(examples.len());
    for chunk in examples.chunks(batch_size.max(1)) {
        let batch = collator.collate(chunk)?;
        let logits = model.forward(&batch, ForwardMode::Eval)?;
        predictions.extend(argmax_predictions(&logits)?);
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MeanPoolClassifier;
    use crate::objective::{PlainObjective, RDropObjective};
    use candle_core::Device;
    use clone_detect_core::PaddingStrategy;

    fn example(ids: &[u32], label: Option<u32>) -> EncodedExample {
        EncodedExample {
            input_ids: ids.to_vec(),
            attention_mask: vec![1; ids.len()],
            token_type_ids: None,
            label,
        }
    }

    /// Label 1 iff token 2 occurs: separable by a mean-pooled linear model.
    fn toy_set() -> Vec<EncodedExample> {
        (0..24)
            .map(|i| {
                if i % 2 == 0 {
                    example(&[2, 3, 2, 3], Some(1))
                } else {
                    example(&[4, 5, 4], Some(0))
                }
            })
            .collect()
    }

    fn collator() -> PaddingCollator {
        PaddingCollator::new(0, PaddingStrategy::Dynamic, 16, Device::Cpu)
    }

    #[test]
    fn test_total_steps() {
        let config = TrainingConfig {
            batch_size: 4,
            epochs: 2,
            ..TrainingConfig::default()
        };
        let objective = PlainObjective;
        let collator = collator();
        let trainer = Trainer::new(&config, &objective, &collator);
        assert_eq!(trainer.total_steps(10), 6);

        let config = TrainingConfig {
            max_steps: Some(7),
            ..config
        };
        let trainer = Trainer::new(&config, &objective, &collator);
        assert_eq!(trainer.total_steps(10), 7);
    }

    #[test]
    fn test_training_learns_separable_task() {
        let config = TrainingConfig {
            batch_size: 4,
            epochs: 15,
            learning_rate: 0.05,
            warmup_ratio: 0.0,
            weight_decay: 0.0,
            logging_steps: 10,
            eval_steps: Some(30),
            ..TrainingConfig::default()
        };
        let objective = RDropObjective::new(1.0);
        let collator = collator();
        let trainer = Trainer::new(&config, &objective, &collator);
        let mut model = MeanPoolClassifier::new(8, 8, 2, 0.1, &Device::Cpu).unwrap();
        let data = toy_set();
        let mut rng = RandomContext::new(3);

        let summary = trainer.train(&mut model, &data, &data, &mut rng).unwrap();
        assert_eq!(summary.steps, 90);
        assert_eq!(summary.epochs, 15);
        assert!(summary.evaluations.len() >= 2);
        let metrics = summary.final_metrics().unwrap();
        assert_eq!(metrics.examples, 24);
        assert!(metrics.accuracy > 0.99, "accuracy {}", metrics.accuracy);

        let predictions = predict_labels(&mut model, &data[..2], &collator, 8).unwrap();
        assert_eq!(predictions, vec![1, 0]);
    }

    #[test]
    fn test_unlabeled_batches_are_skipped() {
        let config = TrainingConfig {
            batch_size: 2,
            max_steps: Some(5),
            ..TrainingConfig::default()
        };
        let objective = PlainObjective;
        let collator = collator();
        let trainer = Trainer::new(&config, &objective, &collator);
        let mut model = MeanPoolClassifier::new(8, 4, 2, 0.0, &Device::Cpu).unwrap();
        let data = vec![example(&[1, 2], None), example(&[3], None)];

        let summary = trainer.train(&mut model, &data, &[], &mut RandomContext::new(0)).unwrap();
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.skipped_batches, 1);
        assert!(summary.evaluations.is_empty());
    }
}
