//! Additive tree ensemble produced by the boosting loop.

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::tree::{Tree, TreeValidationError};
use crate::utils::Parallelism;

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ForestValidationError {
    NonFiniteBaseScore(f64),
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// `prediction = base_score + sum(tree outputs)`. Leaf values already
/// include the learning rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    base_score: f64,
    n_features: usize,
    trees: Vec<Tree>,
}

impl Forest {
    pub fn new(base_score: f64, n_features: usize) -> Self {
        Self {
            base_score,
            n_features,
            trees: Vec::new(),
        }
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Keep only the first `n_trees` trees (e.g. up to the best early-stopping round).
    pub fn truncate(&mut self, n_trees: usize) {
        self.trees.truncate(n_trees);
    }

    #[inline]
    pub fn predict_row(&self, row: impl Fn(usize) -> f64 + Copy) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    /// Predict every row of `x`. The caller checks the column count.
    pub fn predict(&self, x: ArrayView2<'_, f64>, parallelism: Parallelism) -> Array1<f64> {
        let mut out = vec![0.0; x.nrows()];
        parallelism.maybe_par_fill(&mut out, |i, v| {
            let row = x.row(i);
            *v = self.predict_row(|f| row[f]);
        });
        Array1::from(out)
    }

    /// Total split gain per feature.
    pub fn feature_gain(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.accumulate_gain(&mut importance);
        }
        importance
    }

    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if !self.base_score.is_finite() {
            return Err(ForestValidationError::NonFiniteBaseScore(self.base_score));
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }
}
