//! Regressor families behind a single trainer interface.
//!
//! - [`ModelKind`]: which family to train
//! - [`Regressor`]: the strategy trait the families implement
//! - [`ModelTrainer`]: validation, timing, importance, cross-validation and persistence

mod kind;
mod regressor;
mod trainer;

pub use kind::ModelKind;
pub use regressor::{FittedModel, GbdtRegressor, LinearRegressor, Regressor, ValidSet};
pub use trainer::{CvScores, ModelArtifact, ModelTrainer};
