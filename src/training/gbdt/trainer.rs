//! Gradient boosting loop with squared loss.
//!
//! Orchestrates binning, gradient computation, tree growing, prediction
//! updates and early stopping. Use [`GbdtTrainer::train`] to fit a [`Forest`].

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::binning::{BinCuts, BinnedMatrix};
use super::grower::{GrowthStrategy, RoundInputs, TreeGrower};
use super::split::GainParams;
use crate::config::BoostingConfig;
use crate::repr::Forest;
use crate::training::callback::EarlyStopping;
use crate::training::logger::TrainingLogger;
use crate::training::sampling::{ColumnSampler, RowSampler};
use crate::training::Verbosity;
use crate::utils::Parallelism;

// =============================================================================
// GbdtParams
// =============================================================================

/// Parameters of one boosting run.
#[derive(Clone, Debug)]
pub struct GbdtParams {
    pub n_rounds: u32,
    pub learning_rate: f64,
    pub strategy: GrowthStrategy,
    pub gain: GainParams,
    pub max_bins: usize,
    pub subsample: f64,
    pub colsample: f64,
    /// `0` disables early stopping.
    pub early_stopping_rounds: u32,
    pub verbosity: Verbosity,
    pub seed: u64,
}

impl GbdtParams {
    pub fn from_config(config: &BoostingConfig, strategy: GrowthStrategy) -> Self {
        Self {
            n_rounds: config.n_rounds,
            learning_rate: config.learning_rate,
            strategy,
            gain: GainParams::from(config),
            max_bins: config.max_bins as usize,
            subsample: config.subsample,
            colsample: config.colsample,
            early_stopping_rounds: config.early_stopping_rounds,
            verbosity: config.verbosity,
            seed: config.seed,
        }
    }
}

/// What happened during a boosting run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Rounds actually run (before truncation to the best round).
    pub rounds_trained: usize,
    /// Trees kept in the final model.
    pub n_trees: usize,
    /// Zero-based best validation round, when a validation set was given.
    pub best_round: Option<usize>,
    pub best_valid_rmse: Option<f64>,
    pub train_rmse: Vec<f64>,
    pub valid_rmse: Vec<f64>,
}

fn rmse(pred: &[f64], y: ArrayView1<'_, f64>) -> f64 {
    let sse: f64 = pred.iter().zip(y.iter()).map(|(p, t)| (p - t) * (p - t)).sum();
    (sse / pred.len().max(1) as f64).sqrt()
}

// =============================================================================
// GbdtTrainer
// =============================================================================

/// Boosted regression trees for one growth strategy.
pub struct GbdtTrainer {
    params: GbdtParams,
    name: &'static str,
}

impl GbdtTrainer {
    /// `name` tags log events.
    pub fn new(params: GbdtParams, name: &'static str) -> Self {
        Self { params, name }
    }

    pub fn params(&self) -> &GbdtParams {
        &self.params
    }

    /// Train a forest.
    ///
    /// Does not create a thread pool; the caller installs one if needed.
    /// With a validation set and `early_stopping_rounds > 0`, the returned
    /// forest is truncated to the best validation round. The caller checks
    /// shapes and that `y` is not empty.
    pub fn train(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        valid: Option<(ArrayView2<'_, f64>, ArrayView1<'_, f64>)>,
        parallelism: Parallelism,
    ) -> (Forest, TrainingSummary) {
        let params = &self.params;
        let (n_rows, n_features) = x.dim();
        let logger = TrainingLogger::new(params.verbosity, self.name);

        let cuts = BinCuts::from_data(x, params.max_bins, parallelism);
        let binned = BinnedMatrix::new(x, &cuts, parallelism);
        let grower = TreeGrower::new(
            &binned,
            &cuts,
            params.gain.clone(),
            params.strategy,
            params.learning_rate,
            parallelism,
        );

        let base_score = y.mean().unwrap_or(0.0);
        let mut forest = Forest::new(base_score, n_features);
        let mut predictions = vec![base_score; n_rows];
        let mut valid_predictions = valid.map(|(xv, _)| vec![base_score; xv.nrows()]);

        let mut row_sampler = RowSampler::new(params.subsample, params.seed);
        let mut col_sampler = ColumnSampler::new(params.colsample, params.seed);
        let mut early_stopping = (params.early_stopping_rounds > 0 && valid.is_some())
            .then(|| EarlyStopping::new(params.early_stopping_rounds as usize, false));

        let mut grad = vec![0.0; n_rows];
        let hess = vec![1.0; n_rows];
        let mut summary = TrainingSummary::default();

        for round in 0..params.n_rounds as usize {
            // Squared loss: g = pred - y, h = 1.
            for ((g, p), t) in grad.iter_mut().zip(&predictions).zip(y.iter()) {
                *g = p - t;
            }

            let rows = row_sampler.sample(n_rows);
            let features = col_sampler.sample(n_features);
            let tree = grower.grow(
                &rows,
                RoundInputs {
                    grad: &grad,
                    hess: &hess,
                    features: &features,
                },
            );

            // Sampled-out rows still receive the new tree's output.
            parallelism.maybe_par_fill(&mut predictions, |i, p| {
                let row = x.row(i);
                *p += tree.predict_row(|f| row[f]);
            });
            let train_rmse = rmse(&predictions, y);
            summary.train_rmse.push(train_rmse);

            let mut valid_rmse = None;
            if let (Some((xv, yv)), Some(vp)) = (valid, valid_predictions.as_mut()) {
                parallelism.maybe_par_fill(vp, |i, p| {
                    let row = xv.row(i);
                    *p += tree.predict_row(|f| row[f]);
                });
                let score = rmse(vp, yv);
                summary.valid_rmse.push(score);
                valid_rmse = Some(score);
            }

            forest.push_tree(tree);
            summary.rounds_trained = round + 1;
            logger.round(round, train_rmse, valid_rmse);

            if let (Some(monitor), Some(score)) = (early_stopping.as_mut(), valid_rmse) {
                if monitor.should_stop(score) {
                    logger.early_stop(
                        round,
                        monitor.best_round(),
                        monitor.best_value().unwrap_or(f64::NAN),
                    );
                    break;
                }
            }
        }

        if let Some(monitor) = &early_stopping {
            forest.truncate(monitor.best_round() + 1);
            summary.best_round = Some(monitor.best_round());
            summary.best_valid_rmse = monitor.best_value();
        } else if !summary.valid_rmse.is_empty() {
            // No early stopping: report the best round without truncating.
            let (best, score) = summary
                .valid_rmse
                .iter()
                .copied()
                .enumerate()
                .fold((0, f64::INFINITY), |acc, (i, v)| if v < acc.1 { (i, v) } else { acc });
            summary.best_round = Some(best);
            summary.best_valid_rmse = Some(score);
        }
        summary.n_trees = forest.n_trees();

        (forest, summary)
    }
}
