//! Error types shared by every stage of the pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors raised while constructing or validating configuration.
///
/// These always surface before any I/O or training work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown model type '{0}' (expected one of: xgboost, lightgbm, catboost, linear)")]
    UnknownModel(String),
    #[error("learning_rate must be positive and finite, got {0}")]
    InvalidLearningRate(f64),
    #[error("n_rounds must be at least 1")]
    InvalidRounds,
    #[error("{field} must be in (0, 1], got {value}")]
    InvalidSamplingRatio { field: &'static str, value: f64 },
    #[error("{field} must be non-negative, got {value}")]
    InvalidRegularization { field: &'static str, value: f64 },
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("invalid ensemble weights: {0}")]
    InvalidWeights(String),
    #[error("ensemble members: {0}")]
    InvalidMembers(String),
    #[error("{0} has already been fitted")]
    AlreadyFitted(&'static str),
}

// =============================================================================
// FieldError
// =============================================================================

/// A single rejected field of a prediction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Error
// =============================================================================

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `transform`/`predict` was called before the component was fitted.
    #[error("{0} is not fitted")]
    NotFitted(&'static str),

    /// Missing required fields, or a feature matrix with the wrong shape.
    #[error("schema error: {0}")]
    Schema(String),

    /// Out-of-range or wrongly typed request fields.
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("artifact error at {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Schema(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
