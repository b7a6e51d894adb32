//! flatprice: flat price prediction for tabular listings.
//!
//! A reproducible preprocessing pipeline feeds an ensemble of histogram
//! gradient-boosted regressors whose blending weights are tuned on a
//! validation split. Fitted artifacts are plain JSON and can be served over
//! HTTP or used from the CLI.
//!
//! # Key Types
//!
//! - [`PreprocessingPipeline`] - cleaning, feature engineering and encoding
//! - [`ModelTrainer`] / [`ModelKind`] - one regressor family
//! - [`EnsembleTrainer`] - weighted ensemble with grid-searched weights
//! - [`Metrics`] - regression metrics from [`evaluation::evaluate`]
//! - [`ModelBundle`] - everything needed to predict, saved as one directory
//!
//! # Training
//!
//! Load a frame with [`data::load_csv`], then call [`workflow::train`] with a
//! [`PipelineConfig`] and save the returned bundle.

pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod model;
pub mod preprocessing;
pub mod repr;
pub mod serving;
pub mod training;
pub mod utils;
pub mod workflow;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{BoostingConfig, CleaningConfig, PipelineConfig, SplitConfig};
pub use data::{Frame, PropertyRecord};
pub use ensemble::EnsembleTrainer;
pub use error::{ConfigError, Error, FieldError, Result};
pub use evaluation::Metrics;
pub use io::ModelBundle;
pub use model::{ModelKind, ModelTrainer};
pub use preprocessing::{FeatureMatrix, PreprocessingPipeline};
pub use utils::{run_with_threads, Parallelism};
