//! Thin prediction service: request validation, a shared predictor and the
//! axum router.

pub mod api;
mod predictor;
mod request;

pub use api::{router, serve, ApiError};
pub use predictor::{
    BatchItem, BatchResponse, BatchSummary, ConfidenceInterval, PredictionResponse, Predictor,
    CONFIDENCE_MARGIN, CURRENCY, MAX_BATCH_SIZE,
};
pub use request::validate_request;
