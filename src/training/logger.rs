//! Training progress logging on top of `tracing`.

use serde::{Deserialize, Serialize};

/// How much a trainer reports about its own progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Silent,
    #[default]
    Warning,
    Info,
    Debug,
}

/// Emits per-round events for one model, gated by [`Verbosity`].
///
/// The subscriber's own filter still applies on top of this.
#[derive(Debug, Clone)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    model: &'static str,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity, model: &'static str) -> Self {
        Self { verbosity, model }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Warning {
            tracing::warn!(model = self.model, "{message}");
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= Verbosity::Info {
            tracing::info!(model = self.model, "{message}");
        }
    }

    /// One boosting round. Logged every 10th round at `Info`, every round at `Debug`.
    pub fn round(&self, round: usize, train_rmse: f64, valid_rmse: Option<f64>) {
        let every_round = self.verbosity >= Verbosity::Debug;
        let periodic = self.verbosity >= Verbosity::Info && round % 10 == 0;
        if every_round || periodic {
            tracing::info!(model = self.model, round, train_rmse, valid_rmse, "boosting round");
        }
    }

    pub fn early_stop(&self, round: usize, best_round: usize, best: f64) {
        if self.verbosity >= Verbosity::Info {
            tracing::info!(
                model = self.model,
                round,
                best_round,
                best_valid_rmse = best,
                "early stopping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Info > Verbosity::Warning);
        assert!(Verbosity::Warning > Verbosity::Silent);
        assert_eq!(Verbosity::default(), Verbosity::Warning);
    }

    #[test]
    fn test_verbosity_serde_lowercase() {
        let v: Verbosity = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(v, Verbosity::Debug);
        assert_eq!(serde_json::to_string(&Verbosity::Silent).unwrap(), "\"silent\"");
    }
}
