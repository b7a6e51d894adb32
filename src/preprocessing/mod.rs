//! Preprocessing: validation and cleaning, feature engineering,
//! categorical encoding and the fit/transform pipeline that composes them.

pub mod cleaning;
pub mod encoding;
pub mod features;
mod pipeline;

pub use cleaning::{validate, Cleaner, ValidationReport};
pub use encoding::{CategoricalEncoder, CategoryEncoding};
pub use features::{engineer, ENGINEERED_FEATURES, REFERENCE_YEAR};
pub use pipeline::{reconcile, FeatureMatrix, PipelineState, PreprocessingPipeline};
