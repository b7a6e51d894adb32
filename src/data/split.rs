//! Seeded row splits: hold-out and k-fold.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn shuffled(n_rows: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

/// Split `0..n_rows` into `(train, holdout)` index sets.
///
/// The hold-out receives `round(n_rows * fraction)` rows, but never all rows.
/// Both index sets are sorted.
pub fn holdout_split(n_rows: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let n_holdout = ((n_rows as f64 * fraction).round() as usize).min(n_rows.saturating_sub(1));
    let indices = shuffled(n_rows, seed);
    let (holdout, train) = indices.split_at(n_holdout);

    let mut train = train.to_vec();
    let mut holdout = holdout.to_vec();
    train.sort_unstable();
    holdout.sort_unstable();
    (train, holdout)
}

/// Shuffled k-fold splitter.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// `(train, validation)` index pairs. The first `n_rows % k` folds get
    /// one extra row.
    pub fn split(&self, n_rows: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let k = self.n_splits.max(1);
        let indices = shuffled(n_rows, self.seed);
        let base = n_rows / k;
        let extra = n_rows % k;

        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let mut valid = indices[start..start + size].to_vec();
            let mut train: Vec<usize> = indices[..start]
                .iter()
                .chain(&indices[start + size..])
                .copied()
                .collect();
            valid.sort_unstable();
            train.sort_unstable();
            folds.push((train, valid));
            start += size;
        }
        folds
    }
}
