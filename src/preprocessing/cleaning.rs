//! Data validation and cleaning.
//!
//! [`validate`] is a read-only diagnostic pass. [`Cleaner`] learns fill
//! statistics at fit time and applies them; `clean` is the destructive
//! training-time variant, `impute` the row-preserving inference variant.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::CleaningConfig;
use crate::data::schema::{
    is_categorical_field, is_numeric_field, CATEGORICAL_FEATURES, NUMERIC_FEATURES, RANGE_RULES,
};
use crate::data::{Column, Frame};
use crate::utils::{nan_median, quantile_sorted, sorted_finite};

// =============================================================================
// ValidationReport
// =============================================================================

/// Count of values outside one column's allowed range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeViolations {
    pub below: usize,
    pub above: usize,
}

/// Structural issues found in a frame. Produced without mutating data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub n_rows: usize,
    pub missing_columns: Vec<String>,
    pub missing_values: BTreeMap<String, usize>,
    pub out_of_range: BTreeMap<String, RangeViolations>,
    pub type_mismatches: Vec<String>,
    pub duplicate_rows: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues().is_empty()
    }

    /// Human-readable issue list.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for column in &self.missing_columns {
            issues.push(format!("required column '{column}' is missing"));
        }
        for (column, &count) in &self.missing_values {
            let pct = 100.0 * count as f64 / self.n_rows.max(1) as f64;
            issues.push(format!(
                "column '{column}' has {count} missing values ({pct:.2}%)"
            ));
        }
        for column in &self.type_mismatches {
            issues.push(format!("column '{column}' has an unexpected type"));
        }
        for (column, v) in &self.out_of_range {
            if v.below > 0 {
                issues.push(format!("column '{column}' has {} values below minimum", v.below));
            }
            if v.above > 0 {
                issues.push(format!("column '{column}' has {} values above maximum", v.above));
            }
        }
        if self.duplicate_rows > 0 {
            issues.push(format!("found {} duplicate records", self.duplicate_rows));
        }
        issues
    }

    /// Emit every issue as a warning.
    pub fn log(&self) {
        let issues = self.issues();
        if issues.is_empty() {
            tracing::info!(rows = self.n_rows, "data validation passed");
            return;
        }
        tracing::warn!(count = issues.len(), "data validation found issues");
        for issue in issues {
            tracing::warn!("  - {issue}");
        }
    }
}

/// Inspect `frame` for missing values, range violations, type mismatches and duplicates.
pub fn validate(frame: &Frame) -> ValidationReport {
    let mut report = ValidationReport {
        n_rows: frame.n_rows(),
        duplicate_rows: count_duplicates(frame),
        ..Default::default()
    };

    for name in NUMERIC_FEATURES.iter().chain(CATEGORICAL_FEATURES.iter()) {
        if !frame.has_column(name) {
            report.missing_columns.push(name.to_string());
        }
    }

    for (name, column) in frame.columns() {
        let missing = column.missing_count();
        if missing > 0 {
            report.missing_values.insert(name.to_string(), missing);
        }
        let mismatched = (is_numeric_field(name) && !column.is_numeric())
            || (is_categorical_field(name) && column.is_numeric());
        if mismatched {
            report.type_mismatches.push(name.to_string());
        }
    }

    for rule in &RANGE_RULES {
        let Some(values) = frame.numeric(rule.column) else {
            continue;
        };
        let mut v = RangeViolations::default();
        for &x in values.iter().filter(|x| !x.is_nan()) {
            v.below += usize::from(x < rule.min);
            v.above += usize::from(x > rule.max);
        }
        if v != RangeViolations::default() {
            report.out_of_range.insert(rule.column.to_string(), v);
        }
    }

    report
}

fn count_duplicates(frame: &Frame) -> usize {
    let mut seen = HashSet::with_capacity(frame.n_rows());
    (0..frame.n_rows())
        .filter(|&row| !seen.insert(frame.row_key(row)))
        .count()
}

// =============================================================================
// Cleaner
// =============================================================================

/// Fill statistics learned on training data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cleaner {
    config: CleaningConfig,
    medians: BTreeMap<String, f64>,
    modes: BTreeMap<String, String>,
}

impl Cleaner {
    /// Learn medians of the numeric fields and modes of the categorical fields.
    ///
    /// A column with no observed value gets median 0 and no mode.
    pub fn fit(frame: &Frame, config: &CleaningConfig) -> Self {
        let mut medians = BTreeMap::new();
        for name in NUMERIC_FEATURES {
            if let Some(values) = frame.numeric(name) {
                let median = nan_median(values).unwrap_or_else(|| {
                    tracing::warn!(column = name, "no observed values, imputing 0");
                    0.0
                });
                medians.insert(name.to_string(), median);
            }
        }

        let mut modes = BTreeMap::new();
        for name in CATEGORICAL_FEATURES {
            if let Some(mode) = frame.categorical(name).and_then(mode_of) {
                modes.insert(name.to_string(), mode);
            }
        }

        Self {
            config: config.clone(),
            medians,
            modes,
        }
    }

    pub fn medians(&self) -> &BTreeMap<String, f64> {
        &self.medians
    }

    pub fn modes(&self) -> &BTreeMap<String, String> {
        &self.modes
    }

    /// Fill missing values with the fitted statistics. Never drops rows.
    pub fn impute(&self, frame: &Frame) -> Frame {
        let mut out = frame.clone();
        for (name, column) in frame.columns() {
            match column {
                Column::Numeric(values) => {
                    let Some(&median) = self.medians.get(name) else {
                        continue;
                    };
                    if values.iter().any(|v| v.is_nan()) {
                        let filled = values
                            .iter()
                            .map(|&v| if v.is_nan() { median } else { v })
                            .collect();
                        out.set_column(name, Column::Numeric(filled));
                    }
                }
                Column::Categorical(values) => {
                    let Some(mode) = self.modes.get(name) else {
                        continue;
                    };
                    if values.iter().any(Option::is_none) {
                        let filled = values
                            .iter()
                            .map(|v| v.clone().or_else(|| Some(mode.clone())))
                            .collect();
                        out.set_column(name, Column::Categorical(filled));
                    }
                }
            }
        }
        out
    }

    /// Impute, drop exact duplicates and, if enabled, IQR outliers.
    pub fn clean(&self, frame: &Frame) -> Frame {
        let initial = frame.n_rows();
        let mut out = self.impute(frame);

        if self.config.remove_duplicates {
            out = drop_duplicates(&out);
        }
        if self.config.remove_outliers {
            out = drop_outliers(&out, self.config.outlier_multiplier);
        } else {
            tracing::debug!("outlier removal disabled");
        }

        let removed = initial - out.n_rows();
        if removed > 0 {
            tracing::info!(
                removed,
                pct = 100.0 * removed as f64 / initial as f64,
                "rows removed during cleaning"
            );
        }
        out
    }
}

/// Most frequent value; ties go to the lexicographically smallest.
fn mode_of(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

fn drop_duplicates(frame: &Frame) -> Frame {
    let mut seen = HashSet::with_capacity(frame.n_rows());
    let keep: Vec<usize> = (0..frame.n_rows())
        .filter(|&row| seen.insert(frame.row_key(row)))
        .collect();
    if keep.len() == frame.n_rows() {
        return frame.clone();
    }
    tracing::info!(count = frame.n_rows() - keep.len(), "removing duplicate records");
    frame.take_rows(&keep)
}

/// Sequentially filter each numeric feature by its IQR fence.
fn drop_outliers(frame: &Frame, multiplier: f64) -> Frame {
    let mut out = frame.clone();
    for name in NUMERIC_FEATURES {
        let Some(values) = out.numeric(name) else {
            continue;
        };
        let sorted = sorted_finite(values);
        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;
        let (lower, upper) = (q1 - multiplier * iqr, q3 + multiplier * iqr);

        let keep: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v >= lower && v <= upper)
            .map(|(i, _)| i)
            .collect();
        if keep.len() < values.len() {
            tracing::info!(column = name, outliers = values.len() - keep.len(), "outliers detected");
            out = out.take_rows(&keep);
        }
    }
    out
}
