//! Everything needed to serve predictions, saved as one directory.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{
    ArtifactStore, FEATURE_NAMES_FILE, LABEL_ENCODERS_FILE, METADATA_FILE, PIPELINE_STATE_FILE,
};
use crate::ensemble::EnsembleTrainer;
use crate::error::{Error, Result};
use crate::evaluation::Metrics;
use crate::preprocessing::{CategoricalEncoder, PipelineState, PreprocessingPipeline};

/// `feature_names.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNames {
    pub features: Vec<String>,
}

/// Headline test-set scores of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: Option<f64>,
}

impl From<&Metrics> for SummaryMetrics {
    fn from(m: &Metrics) -> Self {
        Self {
            r2: m.r2,
            rmse: m.rmse,
            mae: m.mae,
            mape: m.mape,
        }
    }
}

/// `model_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    /// Member ids in ensemble order.
    pub components: Vec<String>,
    /// Serialized as RFC 3339.
    pub training_date: DateTime<Utc>,
    /// Rows in the input dataset.
    pub dataset_size: usize,
    pub n_features: usize,
    pub test_size: f64,
    pub chosen_weights: BTreeMap<String, f64>,
    /// Keyed by member id, plus `"ensemble"`.
    pub summary_metrics: BTreeMap<String, SummaryMetrics>,
}

/// Fitted pipeline + ensemble + metadata.
#[derive(Debug)]
pub struct ModelBundle {
    pub pipeline: PreprocessingPipeline,
    pub ensemble: EnsembleTrainer,
    pub metadata: ModelMetadata,
}

impl ModelBundle {
    /// Write every artifact into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`Error::NotFitted`] if the pipeline or a member is not fitted.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let state = self.pipeline.state().ok_or(Error::NotFitted("pipeline"))?;
        let store = ArtifactStore::create(dir.as_ref())?;

        self.ensemble.save(store.dir())?;
        store.write_json(PIPELINE_STATE_FILE, state)?;
        store.write_json(LABEL_ENCODERS_FILE, &state.encoder)?;
        store.write_json(
            FEATURE_NAMES_FILE,
            &FeatureNames {
                features: state.feature_names.clone(),
            },
        )?;
        store.write_json(METADATA_FILE, &self.metadata)?;
        tracing::info!(dir = %store.dir().display(), "saved model bundle");
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::Artifact`] if any file is missing, malformed or
    /// inconsistent with the others.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let store = ArtifactStore::open(dir.as_ref());

        let state: PipelineState = store.read_json(PIPELINE_STATE_FILE)?;
        let encoders: CategoricalEncoder = store.read_json(LABEL_ENCODERS_FILE)?;
        let names: FeatureNames = store.read_json(FEATURE_NAMES_FILE)?;
        if names.features != state.feature_names {
            return Err(Error::artifact(
                store.path(FEATURE_NAMES_FILE),
                "feature names disagree with the pipeline state",
            ));
        }
        if encoders != state.encoder {
            return Err(Error::artifact(
                store.path(LABEL_ENCODERS_FILE),
                "label encoders disagree with the pipeline state",
            ));
        }

        let pipeline = PreprocessingPipeline::from_state(state)
            .map_err(|e| Error::artifact(store.path(PIPELINE_STATE_FILE), e))?;
        let ensemble = EnsembleTrainer::load(store.dir())?;
        let metadata: ModelMetadata = store.read_json(METADATA_FILE)?;

        let n_features = names.features.len();
        if let Some((id, member)) = ensemble
            .members()
            .find(|(_, m)| m.n_features() != Some(n_features))
        {
            return Err(Error::artifact(
                store.path(&super::store::model_file(id)),
                format!(
                    "model expects {:?} features, pipeline produces {n_features}",
                    member.n_features()
                ),
            ));
        }

        tracing::info!(
            dir = %store.dir().display(),
            components = ?metadata.components,
            n_features,
            "loaded model bundle"
        );
        Ok(Self {
            pipeline,
            ensemble,
            metadata,
        })
    }
}
