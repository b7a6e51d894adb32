//! Weighted ensemble of independently trained regressors.
//!
//! Members are trained on the same data, then combined by a weighted
//! average. With exactly three members and validation data the weights come
//! from a grid search maximizing validation R²; otherwise they are uniform.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::{BoostingConfig, PipelineConfig};
use crate::error::{ConfigError, Error, Result};
use crate::evaluation::r2_score;
use crate::io::{model_file, ArtifactStore, ENSEMBLE_WEIGHTS_FILE};
use crate::model::{ModelKind, ModelTrainer, ValidSet};

/// Tolerance on the sum of weights.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// `ensemble_weights.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub weights: BTreeMap<String, f64>,
    /// Member ids in ensemble order.
    pub members: Vec<String>,
}

/// Integer grid `(i, j, 10 - i - j)` in tenths, with `i` and `j` in `2..=7`
/// and the derived third entry in `1..=8`.
fn weight_grid() -> impl Iterator<Item = [f64; 3]> {
    (2..=7u32).flat_map(|i| {
        (2..=7u32).filter_map(move |j| {
            let k = 10i64 - i as i64 - j as i64;
            (1..=8).contains(&k).then(|| [i as f64 / 10.0, j as f64 / 10.0, k as f64 / 10.0])
        })
    })
}

/// Trainers keyed by member id plus their combination weights.
#[derive(Debug)]
pub struct EnsembleTrainer {
    members: Vec<(String, ModelTrainer)>,
    weights: BTreeMap<String, f64>,
}

impl EnsembleTrainer {
    /// # Errors
    ///
    /// [`ConfigError::InvalidMembers`] for an empty list or duplicate ids.
    pub fn new(members: Vec<(String, ModelTrainer)>) -> Result<Self, ConfigError> {
        if members.is_empty() {
            return Err(ConfigError::InvalidMembers("at least one member is required".into()));
        }
        let mut seen = BTreeSet::new();
        for (id, _) in &members {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::InvalidMembers(format!("duplicate member id '{id}'")));
            }
        }
        let weights = uniform(members.iter().map(|(id, _)| id.as_str()));
        Ok(Self { members, weights })
    }

    /// One member per kind, identified by [`ModelKind::id`].
    pub fn from_kinds(kinds: &[ModelKind], config: &BoostingConfig) -> Result<Self, ConfigError> {
        let members = kinds
            .iter()
            .map(|&kind| Ok((kind.id().to_string(), ModelTrainer::new(kind, config.clone())?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(members)
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Self::from_kinds(&config.model_kinds()?, &config.boosting)
    }

    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &ModelTrainer)> {
        self.members.iter().map(|(id, m)| (id.as_str(), m))
    }

    pub fn member(&self, id: &str) -> Option<&ModelTrainer> {
        self.members.iter().find(|(m, _)| m == id).map(|(_, m)| m)
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn is_fitted(&self) -> bool {
        self.members.iter().all(|(_, m)| m.is_fitted())
    }

    /// Train every member in order, stopping at the first failure.
    pub fn train_all(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ndarray::ArrayView1<'_, f64>,
        valid: Option<ValidSet<'_>>,
    ) -> Result<()> {
        for (id, member) in &mut self.members {
            tracing::info!(member = %id, "training ensemble member");
            member.train(x, y, valid)?;
        }
        Ok(())
    }

    /// Predictions of every member, in member order.
    pub fn member_predictions(&self, x: ArrayView2<'_, f64>) -> Result<Vec<Array1<f64>>> {
        self.ensure_fitted()?;
        self.members.iter().map(|(_, m)| m.predict(x)).collect()
    }

    fn ensure_fitted(&self) -> Result<()> {
        match self.members.iter().find(|(_, m)| !m.is_fitted()) {
            Some((id, _)) => {
                tracing::warn!(member = %id, "ensemble member is not trained");
                Err(Error::NotFitted("ensemble"))
            }
            None => Ok(()),
        }
    }

    /// Choose weights by grid search on validation R².
    ///
    /// Falls back to uniform weights without validation data or when the
    /// ensemble does not have exactly three members. Returns the weights now
    /// in effect.
    pub fn optimize_weights(&mut self, valid: Option<ValidSet<'_>>) -> Result<BTreeMap<String, f64>> {
        let ids: Vec<String> = self.members.iter().map(|(id, _)| id.clone()).collect();
        let valid = valid.filter(|(xv, _)| xv.nrows() > 0);
        let (Some((xv, yv)), 3) = (valid, ids.len()) else {
            tracing::info!(n_members = ids.len(), "using uniform ensemble weights");
            self.weights = uniform(ids.iter().map(String::as_str));
            return Ok(self.weights.clone());
        };

        let preds = self.member_predictions(xv)?;
        let y_true = yv.to_vec();
        let mut best: Option<([f64; 3], f64)> = None;
        let mut blended = vec![0.0; y_true.len()];
        for w in weight_grid() {
            for (i, b) in blended.iter_mut().enumerate() {
                *b = w[0] * preds[0][i] + w[1] * preds[1][i] + w[2] * preds[2][i];
            }
            let score = r2_score(&y_true, &blended);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((w, score));
            }
        }

        let weights = match best {
            Some((w, score)) => {
                tracing::info!(weights = ?w, r2 = score, "optimized ensemble weights");
                ids.into_iter().zip(w).collect()
            }
            None => uniform(ids.iter().map(String::as_str)),
        };
        self.weights = weights;
        Ok(self.weights.clone())
    }

    /// Replace the weights.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidWeights`] for unknown or missing ids, negative
    /// or non-finite weights, or a sum further than 1e-6 from 1.
    pub fn set_weights(&mut self, weights: BTreeMap<String, f64>) -> Result<(), ConfigError> {
        let ids: BTreeSet<&str> = self.members.iter().map(|(id, _)| id.as_str()).collect();
        if let Some(unknown) = weights.keys().find(|k| !ids.contains(k.as_str())) {
            return Err(ConfigError::InvalidWeights(format!("unknown member '{unknown}'")));
        }
        if let Some(missing) = ids.iter().find(|id| !weights.contains_key(**id)) {
            return Err(ConfigError::InvalidWeights(format!("missing weight for '{missing}'")));
        }
        if let Some((id, w)) = weights.iter().find(|(_, w)| !(w.is_finite() && **w >= 0.0)) {
            return Err(ConfigError::InvalidWeights(format!("weight of '{id}' is {w}")));
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::InvalidWeights(format!("weights sum to {sum}, expected 1")));
        }
        self.weights = weights;
        Ok(())
    }

    /// Weighted average of member predictions.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let preds = self.member_predictions(x)?;
        let mut out = Array1::zeros(x.nrows());
        for ((id, _), pred) in self.members.iter().zip(&preds) {
            let w = self.weights.get(id).copied().unwrap_or(0.0);
            out.scaled_add(w, pred);
        }
        Ok(out)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write `{id}_model.json` per member and `ensemble_weights.json`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let store = ArtifactStore::create(dir.as_ref())?;
        for (id, member) in &self.members {
            store.write_json(&model_file(id), &member.to_artifact()?)?;
        }
        let weights = EnsembleWeights {
            weights: self.weights.clone(),
            members: self.members.iter().map(|(id, _)| id.clone()).collect(),
        };
        store.write_json(ENSEMBLE_WEIGHTS_FILE, &weights)?;
        tracing::info!(dir = %store.dir().display(), n_members = self.members.len(), "saved ensemble");
        Ok(())
    }

    /// # Errors
    ///
    /// [`Error::Artifact`] if the weights file or any member file is missing
    /// or inconsistent.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let store = ArtifactStore::open(dir.as_ref());
        let saved: EnsembleWeights = store.read_json(ENSEMBLE_WEIGHTS_FILE)?;

        let mut members = Vec::with_capacity(saved.members.len());
        for id in &saved.members {
            let name = model_file(id);
            let trainer = ModelTrainer::from_artifact(store.read_json(&name)?)
                .map_err(|e| Error::artifact(store.path(&name), e))?;
            members.push((id.clone(), trainer));
        }

        let weights_path = store.path(ENSEMBLE_WEIGHTS_FILE);
        let mut ensemble = Self::new(members).map_err(|e| Error::artifact(&weights_path, e))?;
        ensemble
            .set_weights(saved.weights)
            .map_err(|e| Error::artifact(&weights_path, e))?;
        Ok(ensemble)
    }
}

fn uniform<'a>(ids: impl Iterator<Item = &'a str>) -> BTreeMap<String, f64> {
    let ids: Vec<&str> = ids.collect();
    let w = 1.0 / ids.len().max(1) as f64;
    ids.into_iter().map(|id| (id.to_string(), w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};

    fn config() -> BoostingConfig {
        BoostingConfig::builder().n_rounds(40).learning_rate(0.2).build().unwrap()
    }

    fn data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed);
        let x = Array2::from_shape_fn((n, 2), |_| rng.gen_range(0.0..10.0));
        let y = x.rows().into_iter().map(|r| 3.0 * r[0] + r[1]).collect();
        (x, y)
    }

    fn three() -> EnsembleTrainer {
        EnsembleTrainer::from_kinds(
            &[ModelKind::DepthWise, ModelKind::LeafWise, ModelKind::Oblivious],
            &config(),
        )
        .unwrap()
    }

    #[test]
    fn test_grid_has_expected_points() {
        let grid: Vec<[f64; 3]> = weight_grid().collect();
        // i, j in 2..=7 with i + j <= 9: 21 points.
        assert_eq!(grid.len(), 21);
        assert_eq!(grid[0], [0.2, 0.2, 0.6]);
        assert_eq!(grid[20], [0.7, 0.2, 0.1]);
        for w in &grid {
            assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            assert!(w[..2].iter().all(|v| (0.2 - 1e-9..=0.7 + 1e-9).contains(v)));
            assert!((0.1 - 1e-9..=0.8 + 1e-9).contains(&w[2]));
        }
    }

    #[test]
    fn test_tied_scores_keep_first_grid_point() {
        // Zero targets give three identical all-zero members, so every blend scores the same.
        let (x, _) = data(60, 5);
        let zeros = Array1::<f64>::zeros(x.nrows());
        let (xv, yv) = data(20, 6);
        let members = ["a", "b", "c"]
            .into_iter()
            .map(|id| (id.to_string(), ModelTrainer::new(ModelKind::Linear, config()).unwrap()))
            .collect();
        let mut ensemble = EnsembleTrainer::new(members).unwrap();
        ensemble.train_all(x.view(), zeros.view(), None).unwrap();

        let weights = ensemble.optimize_weights(Some((xv.view(), yv.view()))).unwrap();
        assert_eq!(weights["a"], 0.2);
        assert_eq!(weights["b"], 0.2);
        assert_eq!(weights["c"], 0.6);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let members = vec![
            ("a".to_string(), ModelTrainer::new(ModelKind::Linear, config()).unwrap()),
            ("a".to_string(), ModelTrainer::new(ModelKind::Linear, config()).unwrap()),
        ];
        assert!(matches!(
            EnsembleTrainer::new(members),
            Err(ConfigError::InvalidMembers(_))
        ));
    }

    #[test]
    fn test_predict_before_training_is_not_fitted() {
        let ensemble = three();
        let x = Array2::<f64>::zeros((1, 2));
        assert!(matches!(ensemble.predict(x.view()), Err(Error::NotFitted(_))));
    }

    #[test]
    fn test_set_weights_validation() {
        let mut ensemble = three();
        let w = |a: f64, b: f64, c: f64| -> BTreeMap<String, f64> {
            [("xgboost", a), ("lightgbm", b), ("catboost", c)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        };
        assert!(ensemble.set_weights(w(0.2, 0.3, 0.5)).is_ok());
        assert!(ensemble.set_weights(w(0.2, 0.3, 0.6)).is_err());
        assert!(ensemble.set_weights(w(-0.1, 0.6, 0.5)).is_err());

        let mut missing = w(0.5, 0.5, 0.0);
        missing.remove("catboost");
        assert!(ensemble.set_weights(missing).is_err());

        let mut unknown = w(0.2, 0.3, 0.5);
        unknown.insert("svm".into(), 0.0);
        assert!(ensemble.set_weights(unknown).is_err());
        assert_abs_diff_eq!(ensemble.weights()["catboost"], 0.5);
    }

    #[test]
    fn test_optimize_and_fallbacks() {
        let (x, y) = data(300, 1);
        let (xv, yv) = data(80, 2);
        let mut ensemble = three();
        ensemble.train_all(x.view(), y.view(), Some((xv.view(), yv.view()))).unwrap();

        let uniform = ensemble.optimize_weights(None).unwrap();
        assert!(uniform.values().all(|w| (w - 1.0 / 3.0).abs() < 1e-12));

        let weights = ensemble.optimize_weights(Some((xv.view(), yv.view()))).unwrap();
        assert_abs_diff_eq!(weights.values().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(weights.values().all(|w| *w >= 0.1 - 1e-9 && *w <= 0.7 + 1e-9));

        // The chosen blend is at least as good as any grid point, uniform-like included.
        let preds = ensemble.member_predictions(xv.view()).unwrap();
        let blend = ensemble.predict(xv.view()).unwrap();
        let chosen = r2_score(&yv.to_vec(), &blend.to_vec());
        let near_uniform: Vec<f64> = (0..yv.len())
            .map(|i| 0.3 * preds[0][i] + 0.3 * preds[1][i] + 0.4 * preds[2][i])
            .collect();
        assert!(chosen >= r2_score(&yv.to_vec(), &near_uniform) - 1e-12);
    }

    #[test]
    fn test_two_members_stay_uniform() {
        let (x, y) = data(100, 3);
        let mut ensemble =
            EnsembleTrainer::from_kinds(&[ModelKind::DepthWise, ModelKind::Linear], &config()).unwrap();
        ensemble.train_all(x.view(), y.view(), None).unwrap();
        let weights = ensemble.optimize_weights(Some((x.view(), y.view()))).unwrap();
        assert_eq!(weights["xgboost"], 0.5);
        assert_eq!(weights["linear"], 0.5);
    }

    #[test]
    fn test_save_load_round_trip_and_missing_member() {
        let (x, y) = data(150, 4);
        let mut ensemble = three();
        ensemble.train_all(x.view(), y.view(), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        ensemble.save(dir.path()).unwrap();
        let loaded = EnsembleTrainer::load(dir.path()).unwrap();
        assert_eq!(loaded.member_ids(), ensemble.member_ids());
        assert_eq!(loaded.predict(x.view()).unwrap(), ensemble.predict(x.view()).unwrap());

        std::fs::remove_file(dir.path().join("lightgbm_model.json")).unwrap();
        assert!(matches!(
            EnsembleTrainer::load(dir.path()),
            Err(Error::Artifact { .. })
        ));
    }
}
