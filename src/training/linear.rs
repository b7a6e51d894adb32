//! Elastic-net linear regression by coordinate descent.
//!
//! Features are standardized internally; the fitted [`LinearModel`] stores
//! coefficients in raw feature space so prediction needs no scaling state.
//! Inputs are expected to be finite (the preprocessing pipeline imputes).

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::BoostingConfig;
use crate::training::logger::TrainingLogger;
use crate::training::Verbosity;
use crate::utils::Parallelism;

/// Fitted linear model: `y = intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>, parallelism: Parallelism) -> Array1<f64> {
        let mut out = vec![0.0; x.nrows()];
        parallelism.maybe_par_fill(&mut out, |i, v| {
            *v = self.intercept
                + x.row(i)
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(x, w)| x * w)
                    .sum::<f64>();
        });
        Array1::from(out)
    }

    /// Absolute coefficient per feature.
    pub fn importance(&self) -> Vec<f64> {
        self.coefficients.iter().map(|w| w.abs()).collect()
    }
}

/// Coordinate descent settings.
#[derive(Debug, Clone)]
pub struct LinearParams {
    /// Epoch cap.
    pub max_epochs: u32,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    /// Stop once the largest standardized weight change falls below this.
    pub tolerance: f64,
    pub verbosity: Verbosity,
}

impl LinearParams {
    pub fn from_config(config: &BoostingConfig) -> Self {
        Self {
            max_epochs: config.n_rounds,
            reg_lambda: config.reg_lambda,
            reg_alpha: config.reg_alpha,
            tolerance: 1e-7,
            verbosity: config.verbosity,
        }
    }
}

#[inline]
fn soft_threshold(value: f64, alpha: f64) -> f64 {
    if value > alpha {
        value - alpha
    } else if value < -alpha {
        value + alpha
    } else {
        0.0
    }
}

pub struct LinearTrainer {
    params: LinearParams,
}

impl LinearTrainer {
    pub fn new(params: LinearParams) -> Self {
        Self { params }
    }

    /// Fit on `x`/`y`. The caller checks shapes and that `y` is not empty.
    pub fn train(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        parallelism: Parallelism,
    ) -> LinearModel {
        let logger = TrainingLogger::new(self.params.verbosity, "linear");
        let (n_rows, n_features) = x.dim();
        let n = n_rows as f64;
        let y_mean = y.mean().unwrap_or(0.0);

        // Feature-major standardized copy. Constant features stay all-zero.
        let scaled = parallelism.maybe_par_map(0..n_features, |f| {
            let column = x.column(f);
            let mean = column.mean().unwrap_or(0.0);
            let std = column.std(0.0);
            let values: Vec<f64> = if std > 0.0 {
                column.iter().map(|v| (v - mean) / std).collect()
            } else {
                vec![0.0; n_rows]
            };
            (mean, std, values)
        });

        let mut residual: Vec<f64> = y.iter().map(|t| t - y_mean).collect();
        let mut weights = vec![0.0; n_features];
        let denom = n + self.params.reg_lambda;

        for epoch in 0..self.params.max_epochs {
            let mut max_delta = 0.0f64;
            for (f, (_, std, z)) in scaled.iter().enumerate() {
                if *std <= 0.0 {
                    continue;
                }
                // Σz² = n for a standardized column.
                let rho: f64 =
                    z.iter().zip(&residual).map(|(z, r)| z * r).sum::<f64>() + weights[f] * n;
                let updated = soft_threshold(rho, self.params.reg_alpha) / denom;
                let delta = updated - weights[f];
                if delta != 0.0 {
                    for (r, z) in residual.iter_mut().zip(z) {
                        *r -= delta * z;
                    }
                    weights[f] = updated;
                }
                max_delta = max_delta.max(delta.abs());
            }
            if max_delta < self.params.tolerance {
                logger.info(&format!("coordinate descent converged after {} epochs", epoch + 1));
                break;
            }
        }

        let coefficients: Vec<f64> = scaled
            .iter()
            .zip(&weights)
            .map(|((_, std, _), w)| if *std > 0.0 { w / std } else { 0.0 })
            .collect();
        let intercept = y_mean
            - scaled
                .iter()
                .zip(&coefficients)
                .map(|((mean, _, _), c)| mean * c)
                .sum::<f64>();

        LinearModel {
            intercept,
            coefficients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn params(lambda: f64, alpha: f64) -> LinearParams {
        LinearParams {
            max_epochs: 500,
            reg_lambda: lambda,
            reg_alpha: alpha,
            tolerance: 1e-10,
            verbosity: Verbosity::Silent,
        }
    }

    #[test]
    fn test_recovers_exact_linear_relation() {
        let x = Array2::from_shape_fn((50, 2), |(i, f)| ((i * (f + 3)) % 17) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| 4.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let model = LinearTrainer::new(params(0.0, 0.0)).train(x.view(), y.view(), Parallelism::Sequential);
        assert_abs_diff_eq!(model.intercept, 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(model.coefficients[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(model.coefficients[1], -0.5, epsilon = 1e-6);

        let pred = model.predict(x.view(), Parallelism::Parallel);
        for (p, t) in pred.iter().zip(&y) {
            assert_abs_diff_eq!(p, t, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_constant_feature_gets_zero_weight() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0], [4.0, 7.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let model = LinearTrainer::new(params(0.0, 0.0)).train(x.view(), y.view(), Parallelism::Sequential);
        assert_eq!(model.coefficients[1], 0.0);
        assert_abs_diff_eq!(model.coefficients[0], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_l1_zeroes_weak_feature() {
        let x = Array2::from_shape_fn((40, 2), |(i, f)| if f == 0 { i as f64 } else { (i % 2) as f64 });
        let y: Array1<f64> = x.rows().into_iter().map(|r| r[0] + 0.01 * r[1]).collect();
        let model = LinearTrainer::new(params(0.0, 5.0)).train(x.view(), y.view(), Parallelism::Sequential);
        assert_eq!(model.coefficients[1], 0.0);
        assert!(model.coefficients[0] > 0.9);
        assert_eq!(model.importance()[1], 0.0);
    }
}
