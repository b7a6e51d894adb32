//! Gradient histograms over binned features.

use super::binning::BinnedMatrix;
use crate::utils::Parallelism;

/// Per-bin gradient/hessian sums and counts of one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureHistogram {
    pub grad: Vec<f64>,
    pub hess: Vec<f64>,
    pub count: Vec<u32>,
}

impl FeatureHistogram {
    pub fn zeros(n_bins: usize) -> Self {
        Self {
            grad: vec![0.0; n_bins],
            hess: vec![0.0; n_bins],
            count: vec![0; n_bins],
        }
    }

    pub fn n_bins(&self) -> usize {
        self.grad.len()
    }

    /// `self - other`, bin by bin. Used to derive a sibling from its parent.
    pub fn subtract(&self, other: &FeatureHistogram) -> FeatureHistogram {
        FeatureHistogram {
            grad: self.grad.iter().zip(&other.grad).map(|(a, b)| a - b).collect(),
            hess: self.hess.iter().zip(&other.hess).map(|(a, b)| a - b).collect(),
            count: self
                .count
                .iter()
                .zip(&other.count)
                .map(|(a, b)| a.saturating_sub(*b))
                .collect(),
        }
    }
}

/// Histograms of a node: one slot per feature, `None` for features not
/// sampled for the current tree.
pub type NodeHistograms = Vec<Option<FeatureHistogram>>;

/// Build histograms of the rows of one node.
pub fn build_histograms(
    binned: &BinnedMatrix,
    n_bins: &[usize],
    features: &[usize],
    rows: &[u32],
    grad: &[f64],
    hess: &[f64],
    parallelism: Parallelism,
) -> NodeHistograms {
    let built = parallelism.maybe_par_map(features.to_vec(), |f| {
        let bins = binned.feature(f);
        let mut hist = FeatureHistogram::zeros(n_bins[f]);
        for &row in rows {
            let r = row as usize;
            let b = bins[r] as usize;
            hist.grad[b] += grad[r];
            hist.hess[b] += hess[r];
            hist.count[b] += 1;
        }
        (f, hist)
    });

    let mut out: NodeHistograms = vec![None; binned.n_features()];
    for (f, hist) in built {
        out[f] = Some(hist);
    }
    out
}

/// Sibling histograms from parent minus the smaller child.
pub fn subtract_histograms(parent: &NodeHistograms, child: &NodeHistograms) -> NodeHistograms {
    parent
        .iter()
        .zip(child)
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(p.subtract(c)),
            _ => None,
        })
        .collect()
}
