//! The fit/transform contract between raw frames and model input.
//!
//! `fit_transform` learns every piece of state (fill statistics, encodings,
//! column order) exactly once; `transform` replays it. Models only ever see
//! the resulting [`FeatureMatrix`], so column position encodes feature identity.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::cleaning::{validate, Cleaner};
use super::encoding::CategoricalEncoder;
use super::features::{engineer, ENGINEERED_FEATURES};
use crate::config::CleaningConfig;
use crate::data::schema::{CATEGORICAL_FEATURES, NON_FEATURE_COLUMNS, NUMERIC_FEATURES};
use crate::data::{Column, Frame};
use crate::error::{ConfigError, Error, Result};

// =============================================================================
// FeatureMatrix
// =============================================================================

/// Ordered numeric features, one row per record.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(Error::schema(format!(
                "{} feature names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Values of one named column.
    pub fn column(&self, name: &str) -> Option<ndarray::ArrayView1<'_, f64>> {
        let i = self.names.iter().position(|n| n == name)?;
        Some(self.values.column(i))
    }
}

/// Align `frame` to `names`: reorder, zero-fill absent columns, drop the rest.
///
/// # Errors
///
/// [`Error::Schema`] if a requested column is present but not numeric.
pub fn reconcile(frame: &Frame, names: &[String]) -> Result<FeatureMatrix> {
    let n_rows = frame.n_rows();
    let mut values = Array2::<f64>::zeros((n_rows, names.len()));
    let mut filled = Vec::new();

    for (j, name) in names.iter().enumerate() {
        match frame.column(name) {
            Some(Column::Numeric(column)) => {
                for (dst, &src) in values.column_mut(j).iter_mut().zip(column) {
                    *dst = src;
                }
            }
            Some(Column::Categorical(_)) => {
                return Err(Error::schema(format!(
                    "feature column '{name}' is not numeric"
                )));
            }
            None => filled.push(name.as_str()),
        }
    }
    if !filled.is_empty() {
        tracing::warn!(columns = ?filled, "zero-filled missing feature columns");
    }

    FeatureMatrix::new(names.to_vec(), values)
}

// =============================================================================
// PreprocessingPipeline
// =============================================================================

/// Everything `transform` needs, learned by `fit_transform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub cleaner: Cleaner,
    pub encoder: CategoricalEncoder,
    pub feature_names: Vec<String>,
}

/// Cleaning, feature engineering, encoding and column alignment behind one
/// fit/transform pair.
#[derive(Debug, Clone, Default)]
pub struct PreprocessingPipeline {
    config: CleaningConfig,
    state: Option<PipelineState>,
}

impl PreprocessingPipeline {
    pub fn new(config: CleaningConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Restore a fitted pipeline from persisted state.
    pub fn from_state(state: PipelineState) -> Result<Self> {
        if state.feature_names.is_empty() || !state.encoder.is_fitted() {
            return Err(Error::schema("pipeline state is incomplete"));
        }
        Ok(Self {
            config: CleaningConfig::default(),
            state: Some(state),
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&PipelineState> {
        self.state.as_ref()
    }

    /// Column order frozen at fit time.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.state.as_ref().map(|s| s.feature_names.as_slice())
    }

    /// Fit on `frame` and return the training matrix with its target.
    ///
    /// Rows with a missing target are dropped before anything is learned.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyFitted`] if called twice
    /// - [`Error::Schema`] if the target or a required raw field is missing
    pub fn fit_transform(
        &mut self,
        frame: &Frame,
        target: &str,
    ) -> Result<(FeatureMatrix, Array1<f64>)> {
        if self.is_fitted() {
            return Err(ConfigError::AlreadyFitted("preprocessing pipeline").into());
        }
        let prices = frame
            .numeric(target)
            .ok_or_else(|| Error::schema(format!("missing numeric target column '{target}'")))?;
        check_required(frame)?;

        let labelled: Vec<usize> = (0..frame.n_rows()).filter(|&i| !prices[i].is_nan()).collect();
        let frame = if labelled.len() < frame.n_rows() {
            tracing::warn!(
                dropped = frame.n_rows() - labelled.len(),
                "dropping rows without a target value"
            );
            frame.take_rows(&labelled)
        } else {
            frame.clone()
        };
        if frame.is_empty() {
            return Err(Error::schema("no labelled rows to fit on"));
        }

        validate(&frame).log();

        let cleaner = Cleaner::fit(&frame, &self.config);
        let cleaned = cleaner.clean(&frame);
        let engineered = engineer(&cleaned);

        let mut encoder = CategoricalEncoder::new();
        encoder.fit(&engineered, &CATEGORICAL_FEATURES)?;
        let encoded = encoder.transform(&engineered)?;

        let mut dropped: Vec<&str> = NON_FEATURE_COLUMNS.to_vec();
        dropped.push(target);
        let features = encoded.without_columns(&dropped);
        let feature_names = feature_order(&features);

        let matrix = reconcile(&features, &feature_names)?;
        let y = Array1::from(
            cleaned
                .numeric(target)
                .ok_or_else(|| Error::schema("target column lost during cleaning"))?
                .to_vec(),
        );

        tracing::info!(
            rows = matrix.n_rows(),
            features = matrix.n_features(),
            "preprocessing pipeline fitted"
        );
        self.state = Some(PipelineState {
            cleaner,
            encoder,
            feature_names,
        });
        Ok((matrix, y))
    }

    /// Apply the fitted state to new data. Row count and order are preserved.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFitted`] before `fit_transform`
    /// - [`Error::Schema`] if a required raw field is missing
    pub fn transform(&self, frame: &Frame) -> Result<FeatureMatrix> {
        let state = self
            .state
            .as_ref()
            .ok_or(Error::NotFitted("preprocessing pipeline"))?;
        check_required(frame)?;

        let imputed = state.cleaner.impute(frame);
        let engineered = engineer(&imputed);
        let encoded = state.encoder.transform(&engineered)?;
        reconcile(&encoded, &state.feature_names)
    }
}

fn check_required(frame: &Frame) -> Result<()> {
    let missing: Vec<&str> = NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .copied()
        .filter(|name| !frame.has_column(name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::schema(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Canonical feature order: raw numerics, encoded categoricals, engineered.
fn feature_order(frame: &Frame) -> Vec<String> {
    NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .chain(ENGINEERED_FEATURES.iter())
        .filter(|name| frame.has_column(name))
        .map(|name| name.to_string())
        .collect()
}
