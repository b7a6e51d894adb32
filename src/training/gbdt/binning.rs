//! Quantile binning of raw features.
//!
//! Each feature gets up to `max_bins - 1` ascending cut points. A value's bin
//! is the number of cuts strictly below it, so `bin <= b` is equivalent to
//! `value <= cuts[b]`: split thresholds found on bins apply unchanged to raw
//! values at prediction time. Missing values land in bin 0, i.e. they go left.

use ndarray::ArrayView2;

use crate::utils::Parallelism;

/// Cut points of every feature.
#[derive(Debug, Clone, PartialEq)]
pub struct BinCuts {
    cuts: Vec<Vec<f64>>,
}

impl BinCuts {
    /// Compute cut points from training data.
    pub fn from_data(x: ArrayView2<'_, f64>, max_bins: usize, parallelism: Parallelism) -> Self {
        let max_bins = max_bins.clamp(2, 256);
        let cuts = parallelism.maybe_par_map(0..x.ncols(), |f| {
            let column: Vec<f64> = x.column(f).iter().copied().collect();
            feature_cuts(&column, max_bins)
        });
        Self { cuts }
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    pub fn feature_cuts(&self, feature: usize) -> &[f64] {
        &self.cuts[feature]
    }

    /// Number of bins of a feature (cuts + 1).
    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Raw-value threshold equivalent to "bin <= `bin`".
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.cuts[feature][bin]
    }

    #[inline]
    pub fn bin_of(&self, feature: usize, value: f64) -> u8 {
        if value.is_nan() {
            return 0;
        }
        self.cuts[feature].partition_point(|&c| c < value) as u8
    }
}

fn feature_cuts(values: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut uniques = sorted.clone();
    uniques.dedup();
    if uniques.len() <= 1 {
        return Vec::new();
    }

    if uniques.len() <= max_bins {
        // One bin per distinct value, cut halfway between neighbours.
        return uniques.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect();
    }

    let n = sorted.len();
    let mut cuts: Vec<f64> = (1..max_bins).map(|j| sorted[(j * n) / max_bins]).collect();
    cuts.dedup();
    // A cut at the maximum would leave the last bin empty.
    if cuts.last() == uniques.last() {
        cuts.pop();
    }
    cuts
}

/// Column-major matrix of bin indices.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Vec<u8>,
    n_rows: usize,
    n_features: usize,
}

impl BinnedMatrix {
    pub fn new(x: ArrayView2<'_, f64>, cuts: &BinCuts, parallelism: Parallelism) -> Self {
        let (n_rows, n_features) = x.dim();
        let columns = parallelism.maybe_par_map(0..n_features, |f| {
            x.column(f).iter().map(|&v| cuts.bin_of(f, v)).collect::<Vec<u8>>()
        });
        Self {
            bins: columns.concat(),
            n_rows,
            n_features,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Bins of one feature for every row.
    #[inline]
    pub fn feature(&self, feature: usize) -> &[u8] {
        &self.bins[feature * self.n_rows..(feature + 1) * self.n_rows]
    }
}
