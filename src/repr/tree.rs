//! Binary regression tree with raw-value thresholds.

use serde::{Deserialize, Serialize};

/// One tree node. Children are indices into the owning tree's node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// `x[feature] <= threshold` (or missing) goes left.
    Split {
        feature: u32,
        threshold: f64,
        left: u32,
        right: u32,
        gain: f64,
    },
    Leaf { value: f64 },
}

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValidationError {
    Empty,
    ChildOutOfBounds { node: usize, child: u32 },
    FeatureOutOfRange { node: usize, feature: u32, n_features: usize },
    NonForwardChild { node: usize, child: u32 },
}

/// Regression tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// A tree that predicts a constant.
    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Route one row to its leaf value.
    #[inline]
    pub fn predict_row(&self, row: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    // NaN fails `>` and goes left.
                    idx = if row(feature as usize) > threshold {
                        right as usize
                    } else {
                        left as usize
                    };
                }
            }
        }
    }

    /// Add each split's gain to `importance[feature]`.
    pub fn accumulate_gain(&self, importance: &mut [f64]) {
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                if let Some(slot) = importance.get_mut(*feature as usize) {
                    *slot += gain;
                }
            }
        }
    }

    /// Children must point forward and in bounds, so traversal always ends.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        if self.nodes.is_empty() {
            return Err(TreeValidationError::Empty);
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature as usize >= n_features {
                    return Err(TreeValidationError::FeatureOutOfRange {
                        node: i,
                        feature,
                        n_features,
                    });
                }
                for child in [left, right] {
                    if child as usize >= self.nodes.len() {
                        return Err(TreeValidationError::ChildOutOfBounds { node: i, child });
                    }
                    if child as usize <= i {
                        return Err(TreeValidationError::NonForwardChild { node: i, child });
                    }
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TreeBuilder
// =============================================================================

/// Grows a tree by turning leaves into splits.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// Start from a single root leaf.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Leaf { value: 0.0 }],
        }
    }

    /// Split leaf `node`, returning the indices of the new `(left, right)` leaves.
    pub fn split(&mut self, node: usize, feature: usize, threshold: f64, gain: f64) -> (usize, usize) {
        let left = self.nodes.len();
        let right = left + 1;
        self.nodes.push(Node::Leaf { value: 0.0 });
        self.nodes.push(Node::Leaf { value: 0.0 });
        self.nodes[node] = Node::Split {
            feature: feature as u32,
            threshold,
            left: left as u32,
            right: right as u32,
            gain,
        };
        (left, right)
    }

    pub fn set_leaf(&mut self, node: usize, value: f64) {
        self.nodes[node] = Node::Leaf { value };
    }

    pub fn build(self) -> Tree {
        Tree { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        let mut builder = TreeBuilder::new();
        let (l, r) = builder.split(0, 1, 10.0, 3.5);
        builder.set_leaf(l, -1.0);
        builder.set_leaf(r, 1.0);
        builder.build()
    }

    #[test]
    fn test_predict_routes_by_threshold() {
        let tree = stump();
        assert_eq!(tree.predict_row(|f| [0.0, 5.0][f]), -1.0);
        assert_eq!(tree.predict_row(|f| [0.0, 10.0][f]), -1.0);
        assert_eq!(tree.predict_row(|f| [0.0, 10.5][f]), 1.0);
        assert_eq!(tree.predict_row(|f| [0.0, f64::NAN][f]), -1.0);
    }

    #[test]
    fn test_validate_and_importance() {
        let tree = stump();
        assert!(tree.validate(2).is_ok());
        assert!(matches!(
            tree.validate(1),
            Err(TreeValidationError::FeatureOutOfRange { .. })
        ));

        let mut importance = vec![0.0; 2];
        tree.accumulate_gain(&mut importance);
        assert_eq!(importance, vec![0.0, 3.5]);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_serde_tagged_nodes() {
        let json = serde_json::to_string(&stump()).unwrap();
        assert!(json.contains("\"type\":\"split\""));
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stump());
    }
}
