//! Row and column subsampling for boosting rounds.
//!
//! Both samplers draw without replacement using a partial Fisher-Yates
//! shuffle and return sorted indices, so downstream loops walk memory in order.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Draw `k` of `0..n` without replacement, sorted.
fn draw(n: usize, k: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<u32> {
    let mut indices: Vec<u32> = (0..n as u32).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    let mut sampled = indices[..k].to_vec();
    sampled.sort_unstable();
    sampled
}

fn sample_size(n: usize, rate: f64) -> usize {
    ((n as f64 * rate).ceil() as usize).clamp(1.min(n), n)
}

/// Fraction of rows used to grow each tree.
#[derive(Debug, Clone)]
pub struct RowSampler {
    rate: f64,
    rng: Xoshiro256PlusPlus,
}

impl RowSampler {
    pub fn new(rate: f64, seed: u64) -> Self {
        Self {
            rate,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rate < 1.0
    }

    /// Rows for the next round.
    pub fn sample(&mut self, n_rows: usize) -> Vec<u32> {
        if !self.is_enabled() || n_rows == 0 {
            return (0..n_rows as u32).collect();
        }
        draw(n_rows, sample_size(n_rows, self.rate), &mut self.rng)
    }
}

/// Fraction of features considered by each tree.
#[derive(Debug, Clone)]
pub struct ColumnSampler {
    rate: f64,
    rng: Xoshiro256PlusPlus,
}

impl ColumnSampler {
    pub fn new(rate: f64, seed: u64) -> Self {
        Self {
            rate,
            // Decorrelate from the row sampler sharing the same seed.
            rng: Xoshiro256PlusPlus::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Features for the next tree.
    pub fn sample(&mut self, n_features: usize) -> Vec<usize> {
        if self.rate >= 1.0 || n_features == 0 {
            return (0..n_features).collect();
        }
        draw(n_features, sample_size(n_features, self.rate), &mut self.rng)
            .into_iter()
            .map(|f| f as usize)
            .collect()
    }
}
