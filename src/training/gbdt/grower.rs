//! Tree growth for the three tree families.
//!
//! All strategies share the same machinery: rows are partitioned per node,
//! the smaller child's histograms are built from its rows and the larger
//! child's histograms come from subtracting them from the parent. They only
//! differ in which open node is expanded next and with which split:
//!
//! - [`GrowthStrategy::DepthWise`]: level by level, up to a depth limit.
//! - [`GrowthStrategy::LeafWise`]: always the open leaf with the highest gain,
//!   up to a leaf budget.
//! - [`GrowthStrategy::Oblivious`]: every node of a level uses the same
//!   `(feature, threshold)`, chosen by the summed gain over the level.

use serde::{Deserialize, Serialize};

use super::binning::{BinCuts, BinnedMatrix};
use super::histogram::{build_histograms, subtract_histograms, FeatureHistogram, NodeHistograms};
use super::split::{find_best_split, GainParams, NodeStats, SplitCandidate};
use crate::repr::{Tree, TreeBuilder};
use crate::utils::Parallelism;

/// How a tree is grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrowthStrategy {
    DepthWise { max_depth: u32 },
    LeafWise { max_leaves: u32, max_depth: u32 },
    Oblivious { depth: u32 },
}

/// Gradients and sampled features of one boosting round.
#[derive(Clone, Copy)]
pub struct RoundInputs<'a> {
    pub grad: &'a [f64],
    pub hess: &'a [f64],
    pub features: &'a [usize],
}

/// An open node: its rows, histograms and totals.
struct NodeState {
    node: usize,
    depth: u32,
    rows: Vec<u32>,
    hists: NodeHistograms,
    stats: NodeStats,
}

/// Grows one tree per call over a fixed binned matrix.
pub struct TreeGrower<'a> {
    binned: &'a BinnedMatrix,
    cuts: &'a BinCuts,
    n_bins: Vec<usize>,
    params: GainParams,
    strategy: GrowthStrategy,
    learning_rate: f64,
    parallelism: Parallelism,
}

impl<'a> TreeGrower<'a> {
    pub fn new(
        binned: &'a BinnedMatrix,
        cuts: &'a BinCuts,
        params: GainParams,
        strategy: GrowthStrategy,
        learning_rate: f64,
        parallelism: Parallelism,
    ) -> Self {
        let n_bins = (0..cuts.n_features()).map(|f| cuts.n_bins(f)).collect();
        Self {
            binned,
            cuts,
            n_bins,
            params,
            strategy,
            learning_rate,
            parallelism,
        }
    }

    /// Grow a tree on `rows`. Leaf values include the learning rate.
    pub fn grow(&self, rows: &[u32], inputs: RoundInputs<'_>) -> Tree {
        if rows.is_empty() {
            return Tree::leaf(0.0);
        }
        let root = NodeState {
            node: 0,
            depth: 0,
            rows: rows.to_vec(),
            hists: self.histograms(rows, inputs),
            stats: NodeStats::from_rows(rows, inputs.grad, inputs.hess),
        };

        match self.strategy {
            GrowthStrategy::DepthWise { max_depth } => {
                self.grow_greedy(root, inputs, max_depth, usize::MAX, false)
            }
            GrowthStrategy::LeafWise {
                max_leaves,
                max_depth,
            } => self.grow_greedy(root, inputs, max_depth, max_leaves as usize, true),
            GrowthStrategy::Oblivious { depth } => self.grow_oblivious(root, inputs, depth),
        }
    }

    fn histograms(&self, rows: &[u32], inputs: RoundInputs<'_>) -> NodeHistograms {
        build_histograms(
            self.binned,
            &self.n_bins,
            inputs.features,
            rows,
            inputs.grad,
            inputs.hess,
            self.parallelism,
        )
    }

    #[inline]
    fn leaf_value(&self, stats: &NodeStats) -> f64 {
        self.params.leaf_weight(stats.grad, stats.hess) * self.learning_rate
    }

    /// Split `state` at `bin` of `feature` and return the two children.
    fn split_node(
        &self,
        state: NodeState,
        feature: usize,
        bin: usize,
        gain: f64,
        builder: &mut TreeBuilder,
        inputs: RoundInputs<'_>,
    ) -> (NodeState, NodeState) {
        let bins = self.binned.feature(feature);
        let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = state
            .rows
            .into_iter()
            .partition(|&r| bins[r as usize] as usize <= bin);

        let threshold = self.cuts.threshold(feature, bin);
        let (left, right) = builder.split(state.node, feature, threshold, gain);

        let (left_hists, right_hists) = if left_rows.len() <= right_rows.len() {
            let small = self.histograms(&left_rows, inputs);
            let large = subtract_histograms(&state.hists, &small);
            (small, large)
        } else {
            let small = self.histograms(&right_rows, inputs);
            let large = subtract_histograms(&state.hists, &small);
            (large, small)
        };

        let depth = state.depth + 1;
        let make = |node, rows: Vec<u32>, hists| NodeState {
            node,
            depth,
            stats: NodeStats::from_rows(&rows, inputs.grad, inputs.hess),
            rows,
            hists,
        };
        (make(left, left_rows, left_hists), make(right, right_rows, right_hists))
    }

    // =========================================================================
    // Depth-wise / leaf-wise
    // =========================================================================

    fn grow_greedy(
        &self,
        root: NodeState,
        inputs: RoundInputs<'_>,
        max_depth: u32,
        max_leaves: usize,
        best_first: bool,
    ) -> Tree {
        let mut builder = TreeBuilder::new();
        let mut open: Vec<(NodeState, SplitCandidate)> = Vec::new();
        self.open_or_close(root, max_depth, &mut open, &mut builder);

        let mut n_leaves = 1usize;
        while n_leaves < max_leaves && !open.is_empty() {
            let pick = if best_first {
                // First maximum wins ties.
                let mut best = 0;
                for (i, (_, split)) in open.iter().enumerate().skip(1) {
                    if split.gain > open[best].1.gain {
                        best = i;
                    }
                }
                best
            } else {
                0
            };
            let (state, split) = open.remove(pick);
            let (left, right) =
                self.split_node(state, split.feature, split.bin, split.gain, &mut builder, inputs);
            n_leaves += 1;
            self.open_or_close(left, max_depth, &mut open, &mut builder);
            self.open_or_close(right, max_depth, &mut open, &mut builder);
        }

        for (state, _) in open {
            builder.set_leaf(state.node, self.leaf_value(&state.stats));
        }
        builder.build()
    }

    /// Queue a node for expansion if it has a useful split, else finalize it.
    fn open_or_close(
        &self,
        state: NodeState,
        max_depth: u32,
        open: &mut Vec<(NodeState, SplitCandidate)>,
        builder: &mut TreeBuilder,
    ) {
        let split = if state.depth < max_depth {
            find_best_split(&state.hists, state.stats, self.cuts, &self.params)
        } else {
            None
        };
        match split {
            Some(split) => open.push((state, split)),
            None => builder.set_leaf(state.node, self.leaf_value(&state.stats)),
        }
    }

    // =========================================================================
    // Oblivious
    // =========================================================================

    fn grow_oblivious(&self, root: NodeState, inputs: RoundInputs<'_>, depth: u32) -> Tree {
        let mut builder = TreeBuilder::new();
        let mut level = vec![root];

        for _ in 0..depth {
            let Some((feature, bin)) = self.best_level_split(&level, inputs.features) else {
                break;
            };
            let mut next = Vec::with_capacity(level.len() * 2);
            for state in level {
                let gain = state.hists[feature]
                    .as_ref()
                    .and_then(|hist| self.bin_gains(hist, state.stats)[bin])
                    .unwrap_or(0.0)
                    .max(0.0);
                let (left, right) = self.split_node(state, feature, bin, gain, &mut builder, inputs);
                next.push(left);
                next.push(right);
            }
            level = next;
        }

        for state in level {
            builder.set_leaf(state.node, self.leaf_value(&state.stats));
        }
        builder.build()
    }

    /// Split gain at every bin boundary of one node, `None` where the
    /// children would violate the size constraints.
    fn bin_gains(&self, hist: &FeatureHistogram, parent: NodeStats) -> Vec<Option<f64>> {
        let mut left = NodeStats::default();
        (0..hist.n_bins().saturating_sub(1))
            .map(|bin| {
                left.grad += hist.grad[bin];
                left.hess += hist.hess[bin];
                left.count += hist.count[bin];
                let right = NodeStats {
                    grad: parent.grad - left.grad,
                    hess: parent.hess - left.hess,
                    count: parent.count.saturating_sub(left.count),
                };
                self.params
                    .is_valid_split(left.hess, right.hess, left.count, right.count)
                    .then(|| {
                        self.params.split_gain(
                            (left.grad, left.hess),
                            (right.grad, right.hess),
                            (parent.grad, parent.hess),
                        )
                    })
            })
            .collect()
    }

    /// `(feature, bin)` with the highest positive gain summed over the level.
    fn best_level_split(&self, level: &[NodeState], features: &[usize]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for &feature in features {
            let n_cuts = self.n_bins[feature].saturating_sub(1);
            let mut totals = vec![0.0; n_cuts];
            let mut usable = vec![false; n_cuts];
            for state in level {
                let Some(hist) = state.hists[feature].as_ref() else { continue };
                for (bin, gain) in self.bin_gains(hist, state.stats).into_iter().enumerate() {
                    if let Some(gain) = gain {
                        totals[bin] += gain;
                        usable[bin] = true;
                    }
                }
            }
            for bin in 0..n_cuts {
                let total = totals[bin];
                if usable[bin] && total > 0.0 && best.map_or(true, |(_, _, g)| total > g) {
                    best = Some((feature, bin, total));
                }
            }
        }
        best.map(|(feature, bin, _)| (feature, bin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::Node;
    use ndarray::Array2;

    /// Two informative features: y = 10 * [x0 > 0.5] + [x1 > 0.5].
    fn data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((64, 2), |(i, f)| ((i >> f) & 1) as f64);
        let y = (0..64)
            .map(|i| 10.0 * (i & 1) as f64 + ((i >> 1) & 1) as f64)
            .collect();
        (x, y)
    }

    fn grow(strategy: GrowthStrategy) -> (Tree, Array2<f64>, Vec<f64>) {
        let (x, y) = data();
        let cuts = BinCuts::from_data(x.view(), 256, Parallelism::Sequential);
        let binned = BinnedMatrix::new(x.view(), &cuts, Parallelism::Sequential);
        // Zero prediction: grad = -y, hess = 1.
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let params = GainParams {
            reg_lambda: 0.0,
            min_child_weight: 0.0,
            ..Default::default()
        };
        let grower = TreeGrower::new(&binned, &cuts, params, strategy, 1.0, Parallelism::Sequential);
        let rows: Vec<u32> = (0..64).collect();
        let tree = grower.grow(
            &rows,
            RoundInputs {
                grad: &grad,
                hess: &hess,
                features: &[0, 1],
            },
        );
        (tree, x, y)
    }

    fn assert_fits_exactly(tree: &Tree, x: &Array2<f64>, y: &[f64]) {
        for (i, target) in y.iter().enumerate() {
            let pred = tree.predict_row(|f| x[[i, f]]);
            assert!((pred - target).abs() < 1e-9, "row {i}: {pred} vs {target}");
        }
    }

    #[test]
    fn test_depthwise_depth_two_fits_exactly() {
        let (tree, x, y) = grow(GrowthStrategy::DepthWise { max_depth: 2 });
        assert_eq!(tree.n_leaves(), 4);
        assert!(tree.validate(2).is_ok());
        assert_fits_exactly(&tree, &x, &y);
    }

    #[test]
    fn test_depthwise_stump_uses_strongest_feature() {
        let (tree, _, _) = grow(GrowthStrategy::DepthWise { max_depth: 1 });
        match tree.nodes()[0] {
            Node::Split { feature, .. } => assert_eq!(feature, 0),
            Node::Leaf { .. } => panic!("root should split"),
        }
    }

    #[test]
    fn test_leafwise_respects_leaf_budget() {
        let (tree, _, _) = grow(GrowthStrategy::LeafWise {
            max_leaves: 3,
            max_depth: 8,
        });
        assert_eq!(tree.n_leaves(), 3);

        let (tree, x, y) = grow(GrowthStrategy::LeafWise {
            max_leaves: 31,
            max_depth: 8,
        });
        assert_eq!(tree.n_leaves(), 4);
        assert_fits_exactly(&tree, &x, &y);
    }

    #[test]
    fn test_oblivious_levels_share_split() {
        let (tree, x, y) = grow(GrowthStrategy::Oblivious { depth: 2 });
        let level_two: Vec<(u32, f64)> = tree.nodes()[1..3]
            .iter()
            .filter_map(|n| match *n {
                Node::Split {
                    feature, threshold, ..
                } => Some((feature, threshold)),
                Node::Leaf { .. } => None,
            })
            .collect();
        assert_eq!(level_two.len(), 2);
        assert_eq!(level_two[0], level_two[1]);
        assert_fits_exactly(&tree, &x, &y);
    }

    #[test]
    fn test_empty_rows_give_zero_leaf() {
        let x = Array2::<f64>::zeros((2, 1));
        let cuts = BinCuts::from_data(x.view(), 256, Parallelism::Sequential);
        let binned = BinnedMatrix::new(x.view(), &cuts, Parallelism::Sequential);
        let grower = TreeGrower::new(
            &binned,
            &cuts,
            GainParams::default(),
            GrowthStrategy::DepthWise { max_depth: 3 },
            0.1,
            Parallelism::Sequential,
        );
        let tree = grower.grow(
            &[],
            RoundInputs {
                grad: &[0.0, 0.0],
                hess: &[1.0, 1.0],
                features: &[0],
            },
        );
        assert_eq!(tree.predict_row(|_| 0.0), 0.0);
    }
}
