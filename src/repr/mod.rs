//! Serializable model representations.

mod forest;
mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{Node, Tree, TreeBuilder, TreeValidationError};
