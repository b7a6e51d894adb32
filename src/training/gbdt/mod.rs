//! Histogram-based gradient boosted decision trees.

pub mod binning;
pub mod grower;
pub mod histogram;
pub mod split;
mod trainer;

pub use grower::GrowthStrategy;
pub use split::GainParams;
pub use trainer::{GbdtParams, GbdtTrainer, TrainingSummary};
