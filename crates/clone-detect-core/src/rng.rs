//! Seeded random context threaded through every stochastic component.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Explicit random generator.
///
/// Shuffling, subsampling and dropout masks all draw from a `RandomContext`
/// passed in by the caller, so a run is reproducible from its seed alone.
#[derive(Debug, Clone)]
pub struct RandomContext {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomContext {
    /// Create a context from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed this context was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent child context.
    ///
    /// Advances the parent, so two consecutive forks never share a stream.
    pub fn fork(&mut self) -> Self {
        let child_seed: u64 = self.rng.gen();
        Self::new(child_seed)
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Draw `count` indices from `0..len` with replacement.
    pub fn sample_indices(&mut self, len: usize, count: usize) -> Vec<usize> {
        if len == 0 {
            return Vec::new();
        }
        (0..count).map(|_| self.rng.gen_range(0..len)).collect()
    }

    /// Inverted-dropout keep mask: each entry is `0.0` with probability `p`,
    /// otherwise `1 / (1 - p)`.
    ///
    /// `p <= 0` yields all ones; `p >= 1` yields all zeros.
    pub fn dropout_mask(&mut self, len: usize, p: f32) -> Vec<f32> {
        if p <= 0.0 {
            return vec![1.0; len];
        }
        if p >= 1.0 {
            return vec![0.0; len];
        }
        let scale = 1.0 / (1.0 - p);
        (0..len)
            .map(|_| if self.rng.gen::<f32>() < p { 0.0 } else { scale })
            .collect()
    }
}
