//! Full evaluation summaries, model comparison and text reports.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::metrics::{mse, r2_score, Mae, Metric};
use crate::error::{Error, Result};
use crate::utils::{mean, quantile_sorted, std_dev};

/// Percentiles of the absolute error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorPercentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Everything [`evaluate`] measures.
///
/// Relative metrics divide by `y_true` and are `None` when any true value
/// is exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub n_samples: usize,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Adjusted R² with one predictor.
    pub adjusted_r2: f64,
    pub explained_variance: f64,
    /// Mean of `pred - true`.
    pub mean_error: f64,
    pub std_error: f64,
    pub median_absolute_error: f64,
    pub max_error: f64,
    pub error_percentiles: ErrorPercentiles,
    pub relative_metrics_defined: bool,
    /// Mean absolute percentage error, in percent.
    pub mape: Option<f64>,
    pub within_5_pct: Option<f64>,
    pub within_10_pct: Option<f64>,
    pub within_15_pct: Option<f64>,
    pub within_20_pct: Option<f64>,
}

/// Evaluate predictions against targets.
///
/// # Errors
///
/// [`Error::Schema`] if the lengths differ or the input is empty.
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<Metrics> {
    if y_true.len() != y_pred.len() {
        return Err(Error::schema(format!(
            "y_true has {} values but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(Error::schema("cannot evaluate an empty prediction set"));
    }

    let n = y_true.len();
    let errors: Vec<f64> = y_pred.iter().zip(y_true).map(|(p, t)| p - t).collect();
    let mut abs_errors: Vec<f64> = errors.iter().map(|e| e.abs()).collect();
    abs_errors.sort_by(f64::total_cmp);

    let mse = mse(y_true, y_pred);
    let r2 = r2_score(y_true, y_pred);
    let adjusted_r2 = if n > 2 {
        1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - 2.0)
    } else {
        r2
    };

    let std_true = std_dev(y_true);
    let std_error = std_dev(&errors);
    // Undefined for a constant target; reported as 0 even for exact predictions.
    let var_true = std_true * std_true;
    let explained_variance = if var_true > 0.0 {
        1.0 - std_error * std_error / var_true
    } else {
        0.0
    };

    let relative: Option<Vec<f64>> = y_true
        .iter()
        .all(|t| *t != 0.0)
        .then(|| errors.iter().zip(y_true).map(|(e, t)| (e / t).abs()).collect());
    let within = |limit: f64| {
        relative.as_ref().map(|rel| {
            100.0 * rel.iter().filter(|r| **r <= limit).count() as f64 / n as f64
        })
    };

    let q = |p: f64| quantile_sorted(&abs_errors, p);
    Ok(Metrics {
        n_samples: n,
        mse,
        rmse: mse.sqrt(),
        mae: Mae.compute(y_true, y_pred),
        r2,
        adjusted_r2,
        explained_variance,
        mean_error: mean(&errors),
        std_error,
        median_absolute_error: q(0.5),
        max_error: abs_errors.last().copied().unwrap_or(0.0),
        error_percentiles: ErrorPercentiles {
            p25: q(0.25),
            p50: q(0.50),
            p75: q(0.75),
            p90: q(0.90),
            p95: q(0.95),
            p99: q(0.99),
        },
        relative_metrics_defined: relative.is_some(),
        mape: relative.as_ref().map(|rel| 100.0 * mean(rel)),
        within_5_pct: within(0.05),
        within_10_pct: within(0.10),
        within_15_pct: within(0.15),
        within_20_pct: within(0.20),
    })
}

// =============================================================================
// Comparison and reports
// =============================================================================

/// One row of a model comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRanking {
    pub rank: usize,
    pub name: String,
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: Option<f64>,
}

/// Rank models by R², best first. Equal scores keep their input order.
pub fn compare(results: &[(String, Metrics)]) -> Vec<ModelRanking> {
    let mut order: Vec<&(String, Metrics)> = results.iter().collect();
    order.sort_by(|a, b| b.1.r2.total_cmp(&a.1.r2));
    order
        .into_iter()
        .enumerate()
        .map(|(i, (name, m))| ModelRanking {
            rank: i + 1,
            name: name.clone(),
            r2: m.r2,
            rmse: m.rmse,
            mae: m.mae,
            mape: m.mape,
        })
        .collect()
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"))
}

/// Plain-text summary of one evaluation.
pub fn format_report(metrics: &Metrics) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "Evaluation on {} samples", metrics.n_samples);
    let _ = writeln!(out, "  R2:                  {:.4}", metrics.r2);
    let _ = writeln!(out, "  Adjusted R2:         {:.4}", metrics.adjusted_r2);
    let _ = writeln!(out, "  Explained variance:  {:.4}", metrics.explained_variance);
    let _ = writeln!(out, "  RMSE:                {:.2}", metrics.rmse);
    let _ = writeln!(out, "  MAE:                 {:.2}", metrics.mae);
    let _ = writeln!(out, "  Median abs error:    {:.2}", metrics.median_absolute_error);
    let _ = writeln!(out, "  Max abs error:       {:.2}", metrics.max_error);
    let _ = writeln!(out, "  Mean error (bias):   {:.2}", metrics.mean_error);
    let _ = writeln!(out, "  MAPE:                {}", pct(metrics.mape));
    let _ = writeln!(
        out,
        "  Within 5/10/15/20%:  {} / {} / {} / {}",
        pct(metrics.within_5_pct),
        pct(metrics.within_10_pct),
        pct(metrics.within_15_pct),
        pct(metrics.within_20_pct)
    );
    let p = &metrics.error_percentiles;
    let _ = writeln!(
        out,
        "  |error| p25/50/75/90/95/99: {:.2} / {:.2} / {:.2} / {:.2} / {:.2} / {:.2}",
        p.p25, p.p50, p.p75, p.p90, p.p95, p.p99
    );
    out
}

/// Plain-text comparison table.
pub fn format_comparison(rankings: &[ModelRanking]) -> String {
    let mut out = format!("{:<6}{:<12}{:>10}{:>16}{:>16}{:>10}\n", "rank", "model", "r2", "rmse", "mae", "mape");
    for r in rankings {
        let _ = writeln!(
            out,
            "{:<6}{:<12}{:>10.4}{:>16.2}{:>16.2}{:>10}",
            r.rank,
            r.name,
            r.r2,
            r.rmse,
            r.mae,
            pct(r.mape)
        );
    }
    out
}
