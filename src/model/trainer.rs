//! [`ModelTrainer`]: one regressor family plus its training bookkeeping.

use std::time::{Duration, Instant};

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::kind::ModelKind;
use super::regressor::{FittedModel, GbdtRegressor, LinearRegressor, Regressor, ValidSet};
use crate::config::BoostingConfig;
use crate::data::KFold;
use crate::error::{ConfigError, Error, Result};
use crate::evaluation::r2_score;
use crate::training::{GbdtParams, LinearParams, TrainingSummary};
use crate::utils::{mean, run_with_threads, std_dev, Parallelism};

/// Cross-validated R².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    pub mean: f64,
    /// Population standard deviation over folds.
    pub std: f64,
    pub fold_scores: Vec<f64>,
}

/// Persisted form of a trained member (`{id}_model.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_type: ModelKind,
    pub config: BoostingConfig,
    pub n_features: usize,
    pub training_seconds: Option<f64>,
    pub model: FittedModel,
}

fn build_regressor(kind: ModelKind, config: &BoostingConfig) -> Box<dyn Regressor> {
    match kind.growth(config) {
        Some(strategy) => Box::new(GbdtRegressor::new(
            GbdtParams::from_config(config, strategy),
            kind.id(),
        )),
        None => Box::new(LinearRegressor::new(LinearParams::from_config(config))),
    }
}

fn check_xy(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, what: &str) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(Error::schema(format!(
            "{what} features have {} rows but targets have {}",
            x.nrows(),
            y.len()
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::schema(format!("{what} targets must be finite")));
    }
    Ok(())
}

/// Trains, predicts with and explains one regressor.
///
/// ```
/// use flatprice::config::BoostingConfig;
/// use flatprice::model::{ModelKind, ModelTrainer};
/// use ndarray::{array, Array2};
///
/// let config = BoostingConfig::builder().n_rounds(20).build().unwrap();
/// let mut trainer = ModelTrainer::new(ModelKind::DepthWise, config).unwrap();
///
/// let x = Array2::from_shape_fn((40, 2), |(i, f)| (i * (f + 1)) as f64);
/// let y = x.column(0).mapv(|v| 2.0 * v);
/// trainer.train(x.view(), y.view(), None).unwrap();
///
/// let pred = trainer.predict(array![[10.0, 20.0]].view()).unwrap();
/// assert_eq!(pred.len(), 1);
/// ```
pub struct ModelTrainer {
    kind: ModelKind,
    config: BoostingConfig,
    regressor: Box<dyn Regressor>,
    training_time: Option<Duration>,
}

impl std::fmt::Debug for ModelTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTrainer")
            .field("kind", &self.kind)
            .field("fitted", &self.is_fitted())
            .field("training_time", &self.training_time)
            .finish()
    }
}

impl ModelTrainer {
    /// # Errors
    ///
    /// [`ConfigError`] if `config` fails validation.
    pub fn new(kind: ModelKind, config: BoostingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            kind,
            regressor: build_regressor(kind, &config),
            config,
            training_time: None,
        })
    }

    /// Parse a model name (`xgboost`, `lightgbm`, `catboost`, `linear`, ...).
    pub fn from_name(name: &str, config: BoostingConfig) -> Result<Self, ConfigError> {
        Self::new(name.parse()?, config)
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.regressor.n_features().is_some()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.regressor.n_features()
    }

    /// Wall-clock duration of the last [`train`](Self::train).
    pub fn training_time(&self) -> Option<Duration> {
        self.training_time
    }

    /// Boosting history of the last run (tree families only).
    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.regressor.summary()
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::from_threads(self.config.n_threads)
    }

    /// Train on `x`/`y`, with early stopping on `valid` for tree families.
    ///
    /// Retraining replaces the previous fit.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] for empty inputs, mismatched shapes or non-finite targets.
    pub fn train(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        valid: Option<ValidSet<'_>>,
    ) -> Result<()> {
        check_xy(x, y, "training")?;
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::schema("training set is empty"));
        }
        let valid = match valid {
            Some((xv, yv)) if xv.nrows() > 0 => {
                check_xy(xv, yv, "validation")?;
                if xv.ncols() != x.ncols() {
                    return Err(Error::schema(format!(
                        "validation set has {} features, training set has {}",
                        xv.ncols(),
                        x.ncols()
                    )));
                }
                Some((xv, yv))
            }
            _ => None,
        };

        tracing::info!(
            model = self.kind.id(),
            n_rows = x.nrows(),
            n_features = x.ncols(),
            with_validation = valid.is_some(),
            "training model"
        );
        let start = Instant::now();
        let regressor = &mut self.regressor;
        run_with_threads(self.config.n_threads, |par| regressor.fit(x, y, valid, par))?;
        let elapsed = start.elapsed();
        self.training_time = Some(elapsed);

        tracing::info!(
            model = self.kind.id(),
            seconds = elapsed.as_secs_f64(),
            n_trees = self.summary().map(|s| s.n_trees),
            "model trained"
        );
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::NotFitted`] before training, [`Error::Schema`] if the column
    /// count differs from training.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let expected = self.regressor.n_features().ok_or(Error::NotFitted(self.kind.id()))?;
        if x.ncols() != expected {
            return Err(Error::schema(format!(
                "{} expects {expected} features, got {}",
                self.kind.id(),
                x.ncols()
            )));
        }
        self.regressor.predict(x, self.parallelism())
    }

    /// Features ranked by importance, highest first.
    ///
    /// Gain for tree families, absolute coefficient for the linear family.
    /// Empty when unfitted or when `names` does not match the model.
    pub fn feature_importance(&self, names: &[String], top_n: Option<usize>) -> Vec<(String, f64)> {
        let Some(importance) = self.regressor.feature_importance() else {
            return Vec::new();
        };
        if importance.len() != names.len() {
            tracing::warn!(
                model = self.kind.id(),
                expected = importance.len(),
                got = names.len(),
                "feature name count does not match the model"
            );
            return Vec::new();
        }
        let mut ranked: Vec<(String, f64)> = names.iter().cloned().zip(importance).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(n) = top_n {
            ranked.truncate(n);
        }
        ranked
    }

    /// Shuffled k-fold cross-validation scored by R².
    ///
    /// Each fold trains a fresh regressor with this trainer's configuration
    /// and no early stopping; `self` is left untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] for mismatched shapes or fewer rows than folds;
    /// [`ConfigError::OutOfRange`] if `k < 2`.
    pub fn cross_validate(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        k: usize,
    ) -> Result<CvScores> {
        check_xy(x, y, "cross-validation")?;
        if k < 2 {
            return Err(ConfigError::OutOfRange {
                field: "cv_folds",
                min: 2.0,
                max: f64::INFINITY,
                value: k as f64,
            }
            .into());
        }
        if x.nrows() < k {
            return Err(Error::schema(format!(
                "{} rows cannot be split into {k} folds",
                x.nrows()
            )));
        }

        let folds = KFold::new(k, self.config.seed).split(x.nrows());
        let mut fold_scores = Vec::with_capacity(k);
        for (fold, (train_idx, valid_idx)) in folds.iter().enumerate() {
            let x_train = x.select(Axis(0), train_idx);
            let y_train = y.select(Axis(0), train_idx);
            let x_valid = x.select(Axis(0), valid_idx);
            let y_valid = y.select(Axis(0), valid_idx);

            let mut regressor = build_regressor(self.kind, &self.config);
            let pred = run_with_threads(self.config.n_threads, |par| -> Result<Array1<f64>> {
                regressor.fit(x_train.view(), y_train.view(), None, par)?;
                regressor.predict(x_valid.view(), par)
            })?;
            let score = r2_score(&y_valid.to_vec(), &pred.to_vec());
            tracing::debug!(model = self.kind.id(), fold, r2 = score, "cross-validation fold");
            fold_scores.push(score);
        }

        let scores = CvScores {
            mean: mean(&fold_scores),
            std: std_dev(&fold_scores),
            fold_scores,
        };
        tracing::info!(model = self.kind.id(), k, mean_r2 = scores.mean, std_r2 = scores.std, "cross-validation done");
        Ok(scores)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// # Errors
    ///
    /// [`Error::NotFitted`] before training.
    pub fn to_artifact(&self) -> Result<ModelArtifact> {
        let model = self.regressor.fitted().ok_or(Error::NotFitted(self.kind.id()))?;
        let n_features = self.regressor.n_features().unwrap_or_default();
        Ok(ModelArtifact {
            model_type: self.kind,
            config: self.config.clone(),
            n_features,
            training_seconds: self.training_time.map(|d| d.as_secs_f64()),
            model,
        })
    }

    /// Rebuild a fitted trainer.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an invalid stored config, [`Error::Schema`] if
    /// the stored model does not match its declared family or feature count.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let mut trainer = Self::new(artifact.model_type, artifact.config)?;
        trainer.regressor.restore(artifact.model)?;
        if trainer.regressor.n_features() != Some(artifact.n_features) {
            return Err(Error::schema(format!(
                "{} artifact declares {} features but the model has {:?}",
                trainer.kind.id(),
                artifact.n_features,
                trainer.regressor.n_features()
            )));
        }
        trainer.training_time = artifact
            .training_seconds
            .and_then(|s| Duration::try_from_secs_f64(s).ok());
        Ok(trainer)
    }
}
