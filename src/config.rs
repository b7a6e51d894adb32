//! Immutable configuration passed into the pipeline, trainers and ensemble.
//!
//! [`BoostingConfig`] holds regressor hyperparameters and is built with the
//! `bon` builder, validated at `build()` time:
//!
//! ```
//! use flatprice::config::BoostingConfig;
//!
//! let config = BoostingConfig::builder()
//!     .n_rounds(150)
//!     .max_depth(6)
//!     .learning_rate(0.05)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.n_rounds, 150);
//!
//! assert!(BoostingConfig::builder().subsample(0.0).build().is_err());
//! ```
//!
//! [`PipelineConfig`] groups everything a training run needs and can be
//! loaded from a JSON file. Missing keys fall back to defaults.

use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::model::ModelKind;
use crate::training::Verbosity;

// =============================================================================
// BoostingConfig
// =============================================================================

/// Hyperparameters shared by every regressor family.
///
/// Tree families read the growth limit relevant to their strategy
/// (`max_depth`, `max_leaves` or `oblivious_depth`). The linear family reads
/// `n_rounds` as its coordinate-descent epoch cap plus the regularization terms.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(default)]
pub struct BoostingConfig {
    // === Boosting ===
    /// Number of boosting rounds. Default: 200.
    #[builder(default = 200)]
    pub n_rounds: u32,

    /// Shrinkage applied to each tree. Default: 0.05.
    #[builder(default = 0.05)]
    pub learning_rate: f64,

    // === Tree shape ===
    /// Depth limit for depth-wise trees. Default: 7.
    #[builder(default = 7)]
    pub max_depth: u32,

    /// Leaf budget for leaf-wise trees. Default: 31.
    #[builder(default = 31)]
    pub max_leaves: u32,

    /// Depth of symmetric (oblivious) trees. Default: 6.
    #[builder(default = 6)]
    pub oblivious_depth: u32,

    /// Maximum histogram bins per feature. Default: 256.
    #[builder(default = 256)]
    pub max_bins: u16,

    // === Regularization ===
    /// L2 regularization on leaf weights. Default: 1.0.
    #[builder(default = 1.0)]
    pub reg_lambda: f64,

    /// L1 regularization on leaf weights. Default: 0.0.
    #[builder(default = 0.0)]
    pub reg_alpha: f64,

    /// Minimum gain required to split. Default: 0.0.
    #[builder(default = 0.0)]
    pub min_gain: f64,

    /// Minimum hessian sum per child. Default: 1.0.
    #[builder(default = 1.0)]
    pub min_child_weight: f64,

    /// Minimum number of rows per child. Default: 1.
    #[builder(default = 1)]
    pub min_samples_leaf: u32,

    // === Sampling ===
    /// Row subsample ratio per round. Default: 0.8.
    #[builder(default = 0.8)]
    pub subsample: f64,

    /// Column subsample ratio per tree. Default: 0.8.
    #[builder(default = 0.8)]
    pub colsample: f64,

    // === Early stopping ===
    /// Rounds without validation improvement before stopping. `0` disables.
    #[builder(default = 50)]
    pub early_stopping_rounds: u32,

    // === Resources and reproducibility ===
    /// Thread count: 0 = auto, 1 = sequential.
    #[builder(default = 0)]
    pub n_threads: usize,

    /// Random seed. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Training log verbosity.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: boosting_config_builder::IsComplete> BoostingConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for non-positive learning rates, zero rounds,
    /// sampling ratios outside (0, 1], negative regularization or tree
    /// limits outside their supported range.
    pub fn build(self) -> Result<BoostingConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl BoostingConfig {
    /// Validate a configuration obtained without the builder (e.g. from JSON).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if self.n_rounds == 0 {
            return Err(ConfigError::InvalidRounds);
        }

        for (field, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidSamplingRatio { field, value });
            }
        }

        for (field, value) in [
            ("reg_lambda", self.reg_lambda),
            ("reg_alpha", self.reg_alpha),
            ("min_gain", self.min_gain),
            ("min_child_weight", self.min_child_weight),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::InvalidRegularization { field, value });
            }
        }

        check_range("max_depth", self.max_depth as f64, 1.0, 32.0)?;
        check_range("max_leaves", self.max_leaves as f64, 2.0, 65_536.0)?;
        check_range("oblivious_depth", self.oblivious_depth as f64, 1.0, 16.0)?;
        check_range("max_bins", self.max_bins as f64, 2.0, 256.0)?;
        check_range(
            "min_samples_leaf",
            self.min_samples_leaf as f64,
            1.0,
            u32::MAX as f64,
        )?;

        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max || value.is_nan() {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

// =============================================================================
// Cleaning / Split
// =============================================================================

/// Destructive cleaning options applied at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Drop exact duplicate rows.
    pub remove_duplicates: bool,
    /// Drop IQR outliers. Off unless explicitly requested.
    pub remove_outliers: bool,
    /// IQR fence multiplier.
    pub outlier_multiplier: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            remove_outliers: false,
            outlier_multiplier: 3.0,
        }
    }
}

/// Hold-out and cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for the final test evaluation.
    pub test_size: f64,
    /// Fraction of all rows used for early stopping and weight search.
    pub validation_size: f64,
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            validation_size: 0.1,
            cv_folds: 5,
            seed: 42,
        }
    }
}

// =============================================================================
// PipelineConfig
// =============================================================================

/// Everything a training run needs, passed explicitly into constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cleaning: CleaningConfig,
    pub split: SplitConfig,
    pub boosting: BoostingConfig,
    /// Ensemble member model types, in ensemble order.
    pub models: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig::default(),
            split: SplitConfig::default(),
            boosting: BoostingConfig::default(),
            models: vec![
                "xgboost".to_string(),
                "lightgbm".to_string(),
                "catboost".to_string(),
            ],
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::artifact(path, format!("cannot read config: {e}")))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every nested group plus the model list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.boosting.validate()?;

        let split = &self.split;
        check_range("test_size", split.test_size, 0.0, 0.9)?;
        check_range("validation_size", split.validation_size, 0.0, 0.9)?;
        if split.test_size + split.validation_size >= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "test_size + validation_size",
                min: 0.0,
                max: 1.0,
                value: split.test_size + split.validation_size,
            });
        }
        check_range("cv_folds", split.cv_folds as f64, 2.0, 100.0)?;

        if !(self.cleaning.outlier_multiplier > 0.0) {
            return Err(ConfigError::InvalidRegularization {
                field: "outlier_multiplier",
                value: self.cleaning.outlier_multiplier,
            });
        }

        self.model_kinds().map(|_| ())
    }

    /// Parse the configured model list.
    pub fn model_kinds(&self) -> Result<Vec<ModelKind>, ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::InvalidMembers("at least one model is required".into()));
        }
        self.models.iter().map(|m| m.parse()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_match_documented_hyperparameters() {
        let config = BoostingConfig::default();
        assert_eq!(config.n_rounds, 200);
        assert_eq!(config.max_depth, 7);
        assert_eq!(config.early_stopping_rounds, 50);
        assert_eq!(config.seed, 42);
        assert!((config.learning_rate - 0.05).abs() < 1e-12);
        assert!((config.subsample - 0.8).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::zero_lr(BoostingConfig::builder().learning_rate(0.0).build())]
    #[case::nan_lr(BoostingConfig::builder().learning_rate(f64::NAN).build())]
    #[case::zero_rounds(BoostingConfig::builder().n_rounds(0).build())]
    #[case::subsample(BoostingConfig::builder().subsample(1.5).build())]
    #[case::colsample(BoostingConfig::builder().colsample(0.0).build())]
    #[case::lambda(BoostingConfig::builder().reg_lambda(-1.0).build())]
    #[case::depth(BoostingConfig::builder().max_depth(0).build())]
    #[case::bins(BoostingConfig::builder().max_bins(1).build())]
    fn test_builder_rejects_invalid(#[case] result: Result<BoostingConfig, ConfigError>) {
        assert!(result.is_err());
    }

    #[test]
    fn test_pipeline_config_rejects_unknown_model() {
        let config = PipelineConfig {
            models: vec!["xgboost".into(), "randomforest".into()],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownModel("randomforest".into()))
        );
    }

    #[test]
    fn test_pipeline_config_rejects_oversized_splits() {
        let mut config = PipelineConfig::default();
        config.split.test_size = 0.6;
        config.split.validation_size = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "boosting": { "n_rounds": 10 }, "models": ["linear"] }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.boosting.n_rounds, 10);
        assert_eq!(config.boosting.max_depth, 7);
        assert_eq!(config.split.cv_folds, 5);
        assert!(!config.cleaning.remove_outliers);
        assert!(config.validate().is_ok());
    }
}
