//! AdamW with a linear warmup/decay schedule and global-norm clipping.

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};

use crate::config::TrainingConfig;
use crate::error::TrainResult;

/// Linear warmup from 0 to `base_lr`, then linear decay to 0 at `total_steps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSchedule {
    pub base_lr: f64,
    pub warmup_steps: usize,
    pub total_steps: usize,
}

impl LinearSchedule {
    pub fn new(base_lr: f64, warmup_ratio: f64, total_steps: usize) -> Self {
        let warmup_steps = (total_steps as f64 * warmup_ratio).ceil() as usize;
        Self {
            base_lr,
            warmup_steps: warmup_steps.min(total_steps),
            total_steps,
        }
    }

    /// Learning rate for the update that follows `step` completed updates.
    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.base_lr * step as f64 / self.warmup_steps as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let remaining = self.total_steps.saturating_sub(step);
        self.base_lr * (remaining as f64 / decay_steps as f64).max(0.0)
    }
}

/// AdamW over a fixed parameter set, driven by a [`LinearSchedule`].
pub struct ScheduledOptimizer {
    inner: AdamW,
    vars: Vec<Var>,
    schedule: LinearSchedule,
    max_grad_norm: f64,
    step: usize,
}

impl ScheduledOptimizer {
    pub fn new(vars: Vec<Var>, config: &TrainingConfig, total_steps: usize) -> TrainResult<Self> {
        let schedule = LinearSchedule::new(config.learning_rate, config.warmup_ratio, total_steps);
        let params = ParamsAdamW {
            lr: schedule.lr_at(0),
            weight_decay: config.weight_decay,
            ..ParamsAdamW::default()
        };
        Ok(Self {
            inner: AdamW::new(vars.clone(), params)?,
            vars,
            schedule,
            max_grad_norm: config.max_grad_norm,
            step: 0,
        })
    }

    /// Completed updates.
    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }

    pub fn schedule(&self) -> &LinearSchedule {
        &self.schedule
    }

    /// Backpropagate `loss`, clip, and apply one update.
    ///
    /// Returns the gradient norm before clipping.
    pub fn backward_step(&mut self, loss: &Tensor) -> TrainResult<f32> {
        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&mut grads, &self.vars, self.max_grad_norm)?;
        self.inner.set_learning_rate(self.schedule.lr_at(self.step));
        self.inner.step(&grads)?;
        self.step += 1;
        Ok(norm)
    }
}

/// Scale gradients so their global L2 norm is at most `max_norm`.
///
/// Returns the norm before scaling. `max_norm <= 0` only measures.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> TrainResult<f32> {
    let mut sum_sq = 0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            sum_sq += f64::from(grad.sqr()?.sum_all()?.to_scalar::<f32>()?);
        }
    }
    let norm = sum_sq.sqrt();

    if max_norm > 0.0 && norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars {
            if let Some(grad) = grads.get(var.as_tensor()) {
                let scaled = grad.affine(scale, 0.0)?;
                grads.insert(var.as_tensor(), scaled);
            }
        }
    }
    Ok(norm as f32)
}
