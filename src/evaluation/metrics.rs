//! Point metrics over `(y_true, y_pred)` pairs.
//!
//! Callers check that both slices have the same non-zero length.

/// A scalar regression metric.
pub trait Metric: Send + Sync {
    fn compute(&self, y_true: &[f64], y_pred: &[f64]) -> f64;

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

/// Coefficient of determination.
#[derive(Debug, Clone, Copy, Default)]
pub struct R2;

impl Metric for Rmse {
    fn compute(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        mse(y_true, y_pred).sqrt()
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}

impl Metric for Mae {
    fn compute(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        let sum: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (p - t).abs()).sum();
        sum / y_true.len() as f64
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}

impl Metric for R2 {
    fn compute(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        r2_score(y_true, y_pred)
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "r2"
    }
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let sum: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (p - t) * (p - t)).sum();
    sum / y_true.len() as f64
}

/// `1 - SS_res / SS_tot`.
///
/// A constant `y_true` scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).sum();
    constant_safe_ratio(ss_res, ss_tot)
}

/// `1 - num / den`, with the constant-target convention of [`r2_score`].
fn constant_safe_ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        1.0 - num / den
    } else if num == 0.0 {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_known_values() {
        let y = [3.0, -0.5, 2.0, 7.0];
        let p = [2.5, 0.0, 2.0, 8.0];
        assert_abs_diff_eq!(mse(&y, &p), 0.375);
        assert_abs_diff_eq!(Rmse.compute(&y, &p), 0.375f64.sqrt());
        assert_abs_diff_eq!(Mae.compute(&y, &p), 0.5);
        assert_abs_diff_eq!(R2.compute(&y, &p), 0.948_608_137, epsilon = 1e-8);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
    }

    #[test]
    fn test_direction() {
        assert!(R2.higher_is_better());
        assert!(!Rmse.higher_is_better());
        assert_eq!(Mae.name(), "mae");
    }
}
