//! The regressor strategy interface and its two implementations.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::repr::Forest;
use crate::training::{
    GbdtParams, GbdtTrainer, GrowthStrategy, LinearModel, LinearParams, LinearTrainer,
    TrainingSummary,
};
use crate::utils::Parallelism;

/// Validation rows used for early stopping.
pub type ValidSet<'a> = (ArrayView2<'a, f64>, ArrayView1<'a, f64>);

/// Fitted state of any regressor, as persisted in a model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum FittedModel {
    Forest {
        forest: Forest,
        summary: TrainingSummary,
    },
    Linear {
        model: LinearModel,
    },
}

/// A trainable regressor.
///
/// Shapes are checked by the caller ([`ModelTrainer`](super::ModelTrainer));
/// implementations assume consistent inputs.
pub trait Regressor: Send + Sync {
    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        valid: Option<ValidSet<'_>>,
        parallelism: Parallelism,
    ) -> Result<()>;

    /// # Errors
    ///
    /// [`Error::NotFitted`] before [`fit`](Self::fit).
    fn predict(&self, x: ArrayView2<'_, f64>, parallelism: Parallelism) -> Result<Array1<f64>>;

    /// Unnormalized importance per feature, `None` before fitting.
    fn feature_importance(&self) -> Option<Vec<f64>>;

    /// Feature count seen at fit time.
    fn n_features(&self) -> Option<usize>;

    fn summary(&self) -> Option<&TrainingSummary> {
        None
    }

    fn fitted(&self) -> Option<FittedModel>;

    /// Install previously fitted state.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] if the state belongs to another family.
    fn restore(&mut self, fitted: FittedModel) -> Result<()>;
}

// =============================================================================
// GbdtRegressor
// =============================================================================

/// Boosted trees with a fixed growth strategy.
pub struct GbdtRegressor {
    params: GbdtParams,
    name: &'static str,
    forest: Option<Forest>,
    summary: Option<TrainingSummary>,
}

impl GbdtRegressor {
    pub fn new(params: GbdtParams, name: &'static str) -> Self {
        Self {
            params,
            name,
            forest: None,
            summary: None,
        }
    }

    pub fn strategy(&self) -> GrowthStrategy {
        self.params.strategy
    }

    pub fn forest(&self) -> Option<&Forest> {
        self.forest.as_ref()
    }
}

impl Regressor for GbdtRegressor {
    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        valid: Option<ValidSet<'_>>,
        parallelism: Parallelism,
    ) -> Result<()> {
        let trainer = GbdtTrainer::new(self.params.clone(), self.name);
        let (forest, summary) = trainer.train(x, y, valid, parallelism);
        self.forest = Some(forest);
        self.summary = Some(summary);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>, parallelism: Parallelism) -> Result<Array1<f64>> {
        let forest = self.forest.as_ref().ok_or(Error::NotFitted(self.name))?;
        Ok(forest.predict(x, parallelism))
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.forest.as_ref().map(Forest::feature_gain)
    }

    fn n_features(&self) -> Option<usize> {
        self.forest.as_ref().map(Forest::n_features)
    }

    fn summary(&self) -> Option<&TrainingSummary> {
        self.summary.as_ref()
    }

    fn fitted(&self) -> Option<FittedModel> {
        let forest = self.forest.clone()?;
        Some(FittedModel::Forest {
            forest,
            summary: self.summary.clone().unwrap_or_default(),
        })
    }

    fn restore(&mut self, fitted: FittedModel) -> Result<()> {
        match fitted {
            FittedModel::Forest { forest, summary } => {
                forest
                    .validate()
                    .map_err(|e| Error::schema(format!("invalid forest: {e:?}")))?;
                self.forest = Some(forest);
                self.summary = Some(summary);
                Ok(())
            }
            FittedModel::Linear { .. } => Err(Error::schema(format!(
                "{} expects a tree model, found a linear model",
                self.name
            ))),
        }
    }
}

// =============================================================================
// LinearRegressor
// =============================================================================

/// Elastic-net linear regression. Ignores validation data.
pub struct LinearRegressor {
    params: LinearParams,
    model: Option<LinearModel>,
}

impl LinearRegressor {
    pub fn new(params: LinearParams) -> Self {
        Self {
            params,
            model: None,
        }
    }

    pub fn model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }
}

impl Regressor for LinearRegressor {
    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        _valid: Option<ValidSet<'_>>,
        parallelism: Parallelism,
    ) -> Result<()> {
        let trainer = LinearTrainer::new(self.params.clone());
        self.model = Some(trainer.train(x, y, parallelism));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>, parallelism: Parallelism) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(Error::NotFitted("linear"))?;
        Ok(model.predict(x, parallelism))
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.model.as_ref().map(LinearModel::importance)
    }

    fn n_features(&self) -> Option<usize> {
        self.model.as_ref().map(LinearModel::n_features)
    }

    fn fitted(&self) -> Option<FittedModel> {
        self.model.clone().map(|model| FittedModel::Linear { model })
    }

    fn restore(&mut self, fitted: FittedModel) -> Result<()> {
        match fitted {
            FittedModel::Linear { model } => {
                self.model = Some(model);
                Ok(())
            }
            FittedModel::Forest { .. } => Err(Error::schema(
                "linear expects a linear model, found a tree model",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoostingConfig;
    use ndarray::{array, Array2};

    #[test]
    fn test_predict_before_fit_is_not_fitted() {
        let params = GbdtParams::from_config(
            &BoostingConfig::default(),
            GrowthStrategy::DepthWise { max_depth: 3 },
        );
        let regressor = GbdtRegressor::new(params, "xgboost");
        let x = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            regressor.predict(x.view(), Parallelism::Sequential),
            Err(Error::NotFitted("xgboost"))
        ));
        assert!(regressor.feature_importance().is_none());
        assert!(regressor.fitted().is_none());
    }

    #[test]
    fn test_restore_rejects_other_family() {
        let mut linear = LinearRegressor::new(LinearParams::from_config(&BoostingConfig::default()));
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        linear.fit(x.view(), y.view(), None, Parallelism::Sequential).unwrap();
        let fitted = linear.fitted().unwrap();

        let params = GbdtParams::from_config(
            &BoostingConfig::default(),
            GrowthStrategy::Oblivious { depth: 2 },
        );
        let mut trees = GbdtRegressor::new(params, "catboost");
        assert!(matches!(trees.restore(fitted.clone()), Err(Error::Schema(_))));

        let mut other = LinearRegressor::new(LinearParams::from_config(&BoostingConfig::default()));
        other.restore(fitted).unwrap();
        assert_eq!(other.model(), linear.model());
    }
}
