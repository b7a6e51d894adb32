//! Artifact persistence.

mod bundle;
mod store;

pub use bundle::{FeatureNames, ModelBundle, ModelMetadata, SummaryMetrics};
pub use store::{
    model_file, ArtifactStore, ENSEMBLE_WEIGHTS_FILE, FEATURE_NAMES_FILE, LABEL_ENCODERS_FILE,
    METADATA_FILE, PIPELINE_STATE_FILE,
};
