//! Regression metrics and model comparison.

pub mod metrics;
mod report;

pub use metrics::{r2_score, Mae, Metric, Rmse, R2};
pub use report::{
    compare, evaluate, format_comparison, format_report, ErrorPercentiles, Metrics, ModelRanking,
};
