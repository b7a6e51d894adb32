//! Split gain, leaf weights and best-split search over histograms.

use super::binning::BinCuts;
use super::histogram::{FeatureHistogram, NodeHistograms};
use crate::config::BoostingConfig;

// =============================================================================
// Gain Parameters
// =============================================================================

/// Regularization and splitting constraints, fixed for a training run.
#[derive(Clone, Debug)]
pub struct GainParams {
    /// L2 regularization (lambda).
    pub reg_lambda: f64,
    /// L1 regularization (alpha).
    pub reg_alpha: f64,
    /// Minimum split gain (gamma).
    pub min_gain: f64,
    /// Minimum sum of hessians per child.
    pub min_child_weight: f64,
    /// Minimum samples per child.
    pub min_samples_leaf: u32,
}

impl Default for GainParams {
    fn default() -> Self {
        Self {
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            min_gain: 0.0,
            min_child_weight: 1.0,
            min_samples_leaf: 1,
        }
    }
}

impl From<&BoostingConfig> for GainParams {
    fn from(config: &BoostingConfig) -> Self {
        Self {
            reg_lambda: config.reg_lambda,
            reg_alpha: config.reg_alpha,
            min_gain: config.min_gain,
            min_child_weight: config.min_child_weight,
            min_samples_leaf: config.min_samples_leaf,
        }
    }
}

impl GainParams {
    /// Soft-thresholded gradient sum used by both score and weight.
    #[inline]
    fn threshold_l1(&self, grad: f64) -> f64 {
        if self.reg_alpha == 0.0 {
            grad
        } else if grad > self.reg_alpha {
            grad - self.reg_alpha
        } else if grad < -self.reg_alpha {
            grad + self.reg_alpha
        } else {
            0.0
        }
    }

    /// Structure score of a node: `T(G)² / (H + λ)`.
    #[inline]
    pub fn node_score(&self, grad: f64, hess: f64) -> f64 {
        let g = self.threshold_l1(grad);
        g * g / (hess + self.reg_lambda)
    }

    /// Split gain:
    ///
    /// ```text
    /// gain = 0.5 * [score(L) + score(R) - score(P)] - γ
    /// ```
    #[inline]
    pub fn split_gain(&self, left: (f64, f64), right: (f64, f64), parent: (f64, f64)) -> f64 {
        0.5 * (self.node_score(left.0, left.1) + self.node_score(right.0, right.1)
            - self.node_score(parent.0, parent.1))
            - self.min_gain
    }

    #[inline]
    pub fn is_valid_split(&self, hess_left: f64, hess_right: f64, n_left: u32, n_right: u32) -> bool {
        hess_left >= self.min_child_weight
            && hess_right >= self.min_child_weight
            && n_left >= self.min_samples_leaf
            && n_right >= self.min_samples_leaf
    }

    /// Newton step with L1 soft thresholding: `-T(G) / (H + λ)`.
    #[inline]
    pub fn leaf_weight(&self, grad: f64, hess: f64) -> f64 {
        let denom = hess + self.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -self.threshold_l1(grad) / denom
    }
}

// =============================================================================
// Split search
// =============================================================================

/// Totals of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    pub grad: f64,
    pub hess: f64,
    pub count: u32,
}

impl NodeStats {
    pub fn from_histogram(hist: &FeatureHistogram) -> Self {
        Self {
            grad: hist.grad.iter().sum(),
            hess: hist.hess.iter().sum(),
            count: hist.count.iter().sum(),
        }
    }

    pub fn from_rows(rows: &[u32], grad: &[f64], hess: &[f64]) -> Self {
        let mut stats = Self::default();
        for &r in rows {
            stats.grad += grad[r as usize];
            stats.hess += hess[r as usize];
        }
        stats.count = rows.len() as u32;
        stats
    }

    #[inline]
    fn as_pair(&self) -> (f64, f64) {
        (self.grad, self.hess)
    }
}

/// Best split of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitCandidate {
    pub feature: usize,
    /// Rows with `bin <= bin` go left.
    pub bin: usize,
    pub threshold: f64,
    pub gain: f64,
    pub left: NodeStats,
    pub right: NodeStats,
}

/// Scan every sampled feature for the split with the highest positive gain.
///
/// Ties keep the lowest feature index and bin.
pub fn find_best_split(
    hists: &NodeHistograms,
    parent: NodeStats,
    cuts: &BinCuts,
    params: &GainParams,
) -> Option<SplitCandidate> {
    let mut best: Option<SplitCandidate> = None;

    for (feature, hist) in hists.iter().enumerate() {
        let Some(hist) = hist else { continue };
        let mut left = NodeStats::default();
        for bin in 0..hist.n_bins().saturating_sub(1) {
            left.grad += hist.grad[bin];
            left.hess += hist.hess[bin];
            left.count += hist.count[bin];
            let right = NodeStats {
                grad: parent.grad - left.grad,
                hess: parent.hess - left.hess,
                count: parent.count - left.count,
            };
            if !params.is_valid_split(left.hess, right.hess, left.count, right.count) {
                continue;
            }
            let gain = params.split_gain(left.as_pair(), right.as_pair(), parent.as_pair());
            if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    bin,
                    threshold: cuts.threshold(feature, bin),
                    gain,
                    left,
                    right,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::gbdt::binning::BinnedMatrix;
    use crate::training::gbdt::histogram::build_histograms;
    use crate::utils::Parallelism;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_gain_formula() {
        let params = GainParams {
            reg_lambda: 1.0,
            ..Default::default()
        };
        // score(L) = 100/11, score(R) = 100/11, score(P) = 0
        let gain = params.split_gain((-10.0, 10.0), (10.0, 10.0), (0.0, 20.0));
        assert_abs_diff_eq!(gain, 100.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_leaf_weight_with_l1() {
        let params = GainParams {
            reg_lambda: 1.0,
            reg_alpha: 2.0,
            ..Default::default()
        };
        assert_abs_diff_eq!(params.leaf_weight(-10.0, 3.0), 2.0);
        assert_abs_diff_eq!(params.leaf_weight(1.5, 3.0), 0.0);
    }

    #[test]
    fn test_min_child_constraints() {
        let params = GainParams {
            min_samples_leaf: 2,
            ..Default::default()
        };
        assert!(!params.is_valid_split(5.0, 5.0, 1, 9));
        assert!(params.is_valid_split(5.0, 5.0, 2, 2));
    }

    #[test]
    fn test_finds_separating_threshold() {
        // Targets jump between x=2 and x=3; gradients at a zero prediction are -y.
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let grad = [-1.0, -1.0, -10.0, -10.0];
        let hess = [1.0; 4];
        let cuts = BinCuts::from_data(x.view(), 256, Parallelism::Sequential);
        let binned = BinnedMatrix::new(x.view(), &cuts, Parallelism::Sequential);
        let rows = [0u32, 1, 2, 3];
        let hists = build_histograms(
            &binned,
            &[cuts.n_bins(0)],
            &[0],
            &rows,
            &grad,
            &hess,
            Parallelism::Sequential,
        );
        let parent = NodeStats::from_rows(&rows, &grad, &hess);
        let split = find_best_split(&hists, parent, &cuts, &GainParams::default()).unwrap();
        assert_eq!(split.feature, 0);
        assert_abs_diff_eq!(split.threshold, 2.5);
        assert_eq!(split.left.count, 2);
        assert_eq!(split.right.count, 2);
    }
}
