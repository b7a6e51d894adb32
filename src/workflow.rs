//! End-to-end training and evaluation runs.
//!
//! A training run splits the raw frame into train and test rows, fits the
//! preprocessing pipeline on the train rows only, carves a validation set out
//! of the transformed train matrix, trains every ensemble member, optimizes
//! the ensemble weights and scores everything on the test rows.

use std::collections::BTreeMap;

use chrono::Utc;
use ndarray::{Array1, Axis};

use crate::config::PipelineConfig;
use crate::data::schema::TARGET_COLUMN;
use crate::data::{holdout_split, Frame};
use crate::ensemble::EnsembleTrainer;
use crate::error::{Error, Result};
use crate::evaluation::{compare, evaluate as score, Metrics, ModelRanking};
use crate::io::{ModelBundle, ModelMetadata, SummaryMetrics};
use crate::model::{CvScores, ModelTrainer};
use crate::preprocessing::PreprocessingPipeline;

/// Key of the blended model in metric tables.
pub const ENSEMBLE_ID: &str = "ensemble";

/// Result of [`train`].
#[derive(Debug)]
pub struct TrainOutcome {
    pub bundle: ModelBundle,
    /// Test-set metrics per member, then the ensemble. Empty without test rows.
    pub test_metrics: Vec<(String, Metrics)>,
    pub rankings: Vec<ModelRanking>,
}

/// Rows of `frame` whose target is present.
fn labelled(frame: &Frame) -> Result<(Frame, Array1<f64>)> {
    let prices = frame
        .numeric(TARGET_COLUMN)
        .ok_or_else(|| Error::schema(format!("missing numeric target column '{TARGET_COLUMN}'")))?;
    let rows: Vec<usize> = (0..frame.n_rows()).filter(|&i| !prices[i].is_nan()).collect();
    let y = Array1::from_iter(rows.iter().map(|&i| prices[i]));
    Ok((frame.take_rows(&rows), y))
}

/// Train the configured ensemble on `frame`.
///
/// # Errors
///
/// - [`Error::Config`] for an invalid configuration or unknown model
/// - [`Error::Schema`] if required columns or the target are missing
pub fn train(frame: &Frame, config: &PipelineConfig) -> Result<TrainOutcome> {
    config.validate()?;
    let split = &config.split;
    let n_rows = frame.n_rows();

    let (train_idx, test_idx) = holdout_split(n_rows, split.test_size, split.seed);
    let train_frame = frame.take_rows(&train_idx);
    tracing::info!(
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        "split dataset"
    );

    let mut pipeline = PreprocessingPipeline::new(config.cleaning.clone());
    let (x, y) = pipeline.fit_transform(&train_frame, TARGET_COLUMN)?;

    // validation_size is a share of the whole dataset
    let valid_fraction = split.validation_size / (1.0 - split.test_size);
    let (fit_idx, valid_idx) = holdout_split(x.n_rows(), valid_fraction, split.seed.wrapping_add(1));
    let x_fit = x.values().select(Axis(0), &fit_idx);
    let y_fit = y.select(Axis(0), &fit_idx);
    let x_valid = x.values().select(Axis(0), &valid_idx);
    let y_valid = y.select(Axis(0), &valid_idx);
    let valid = (!valid_idx.is_empty()).then(|| (x_valid.view(), y_valid.view()));
    tracing::info!(
        fit_rows = fit_idx.len(),
        valid_rows = valid_idx.len(),
        n_features = x.n_features(),
        "prepared training matrices"
    );

    let mut ensemble = EnsembleTrainer::from_config(config)?;
    ensemble.train_all(x_fit.view(), y_fit.view(), valid)?;
    let chosen_weights = ensemble.optimize_weights(valid)?;

    let test_metrics = if test_idx.is_empty() {
        tracing::warn!("no test rows; skipping hold-out evaluation");
        Vec::new()
    } else {
        let (test_frame, y_test) = labelled(&frame.take_rows(&test_idx))?;
        if y_test.is_empty() {
            Vec::new()
        } else {
            let x_test = pipeline.transform(&test_frame)?;
            score_all(&ensemble, x_test.values().view(), &y_test)?
        }
    };
    let rankings = compare(&test_metrics);
    if let Some(best) = rankings.first() {
        tracing::info!(model = %best.name, r2 = best.r2, mae = best.mae, "best model on test set");
    }

    let metadata = ModelMetadata {
        model_type: ENSEMBLE_ID.to_string(),
        components: ensemble.member_ids().into_iter().map(str::to_string).collect(),
        training_date: Utc::now(),
        dataset_size: n_rows,
        n_features: x.n_features(),
        test_size: split.test_size,
        chosen_weights,
        summary_metrics: test_metrics
            .iter()
            .map(|(name, m)| (name.clone(), SummaryMetrics::from(m)))
            .collect(),
    };

    Ok(TrainOutcome {
        bundle: ModelBundle {
            pipeline,
            ensemble,
            metadata,
        },
        test_metrics,
        rankings,
    })
}

fn score_all(
    ensemble: &EnsembleTrainer,
    x: ndarray::ArrayView2<'_, f64>,
    y: &Array1<f64>,
) -> Result<Vec<(String, Metrics)>> {
    let y_true = y.to_vec();
    let mut results = Vec::with_capacity(ensemble.member_ids().len() + 1);
    for (id, pred) in ensemble.member_ids().into_iter().zip(ensemble.member_predictions(x)?) {
        results.push((id.to_string(), score(&y_true, &pred.to_vec())?));
    }
    let blended = ensemble.predict(x)?;
    results.push((ENSEMBLE_ID.to_string(), score(&y_true, &blended.to_vec())?));
    Ok(results)
}

/// Ensemble predictions for every row of `frame`, in row order.
pub fn predict_frame(bundle: &ModelBundle, frame: &Frame) -> Result<Array1<f64>> {
    let x = bundle.pipeline.transform(frame)?;
    bundle.ensemble.predict(x.values().view())
}

/// Score a loaded bundle on a labelled frame: every member, then the ensemble.
///
/// Rows without a target are ignored.
///
/// # Errors
///
/// [`Error::Schema`] if the target column is missing or no row is labelled.
pub fn evaluate(bundle: &ModelBundle, frame: &Frame) -> Result<Vec<(String, Metrics)>> {
    let (frame, y) = labelled(frame)?;
    if y.is_empty() {
        return Err(Error::schema("no labelled rows to evaluate"));
    }
    let x = bundle.pipeline.transform(&frame)?;
    score_all(&bundle.ensemble, x.values().view(), &y)
}

/// K-fold R² of every configured model on `frame`.
///
/// The pipeline is fit once on all labelled rows; folds come from
/// `config.split.cv_folds`.
pub fn cross_validate(frame: &Frame, config: &PipelineConfig) -> Result<BTreeMap<String, CvScores>> {
    config.validate()?;
    let mut pipeline = PreprocessingPipeline::new(config.cleaning.clone());
    let (x, y) = pipeline.fit_transform(frame, TARGET_COLUMN)?;

    let mut scores = BTreeMap::new();
    for kind in config.model_kinds()? {
        let trainer = ModelTrainer::new(kind, config.boosting.clone())?;
        let cv = trainer.cross_validate(x.values().view(), y.view(), config.split.cv_folds)?;
        scores.insert(kind.id().to_string(), cv);
    }
    Ok(scores)
}
