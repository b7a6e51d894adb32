//! Early stopping on a validation metric.

/// Tracks the best validation score seen so far and signals when
/// `patience` rounds have passed without improvement.
///
/// ```
/// use flatprice::training::EarlyStopping;
///
/// // RMSE: lower is better
/// let mut monitor = EarlyStopping::new(2, false);
/// assert!(!monitor.should_stop(10.0));
/// assert!(!monitor.should_stop(11.0));
/// assert!(monitor.should_stop(12.0));
/// assert_eq!(monitor.best_round(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    higher_is_better: bool,
    best_value: Option<f64>,
    best_round: usize,
    rounds_seen: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, higher_is_better: bool) -> Self {
        Self {
            patience,
            higher_is_better,
            best_value: None,
            best_round: 0,
            rounds_seen: 0,
        }
    }

    fn improves(&self, value: f64) -> bool {
        match self.best_value {
            None => !value.is_nan(),
            Some(best) if self.higher_is_better => value > best,
            Some(best) => value < best,
        }
    }

    /// Record the score of the next round.
    ///
    /// Returns `true` once more than `patience` rounds have passed since the best one.
    pub fn should_stop(&mut self, value: f64) -> bool {
        if self.improves(value) {
            self.best_value = Some(value);
            self.best_round = self.rounds_seen;
        }
        self.rounds_seen += 1;
        self.rounds_seen - self.best_round > self.patience
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Zero-based round of the best score.
    pub fn best_round(&self) -> usize {
        self.best_round
    }

    pub fn rounds_seen(&self) -> usize {
        self.rounds_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_going_while_improving() {
        let mut monitor = EarlyStopping::new(3, false);
        for v in [1.0, 0.9, 0.8, 0.7, 0.6] {
            assert!(!monitor.should_stop(v));
        }
        assert_eq!(monitor.best_round(), 4);
        assert_eq!(monitor.best_value(), Some(0.6));
    }

    #[test]
    fn test_stops_after_patience() {
        let mut monitor = EarlyStopping::new(3, false);
        assert!(!monitor.should_stop(0.5));
        assert!(!monitor.should_stop(0.6));
        assert!(!monitor.should_stop(0.7));
        assert!(monitor.should_stop(0.8));
        assert_eq!(monitor.best_round(), 0);
    }

    #[test]
    fn test_improvement_resets_window() {
        let mut monitor = EarlyStopping::new(2, false);
        assert!(!monitor.should_stop(1.0));
        assert!(!monitor.should_stop(1.1));
        assert!(!monitor.should_stop(0.9));
        assert!(!monitor.should_stop(1.0));
        assert!(monitor.should_stop(1.0));
        assert_eq!(monitor.best_round(), 2);
    }

    #[test]
    fn test_higher_is_better() {
        let mut monitor = EarlyStopping::new(1, true);
        assert!(!monitor.should_stop(0.8));
        assert!(!monitor.should_stop(0.9));
        assert!(monitor.should_stop(0.85));
        assert_eq!(monitor.best_value(), Some(0.9));
    }

    #[test]
    fn test_nan_never_becomes_best() {
        let mut monitor = EarlyStopping::new(5, false);
        monitor.should_stop(f64::NAN);
        assert_eq!(monitor.best_value(), None);
        monitor.should_stop(2.0);
        assert_eq!(monitor.best_round(), 1);
    }
}
