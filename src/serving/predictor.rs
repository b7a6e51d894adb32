//! Single and batch prediction over a loaded [`ModelBundle`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::validate_request;
use crate::data::{records_to_frame, PropertyRecord};
use crate::error::{Error, FieldError, Result};
use crate::io::{ModelBundle, ModelMetadata};
use crate::workflow::predict_frame;

/// Relative half-width of the reported confidence interval.
pub const CONFIDENCE_MARGIN: f64 = 0.01;

pub const CURRENCY: &str = "RUB";

/// Largest accepted batch.
pub const MAX_BATCH_SIZE: usize = 1000;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_price: f64,
    pub confidence_interval: ConfidenceInterval,
    pub currency: String,
}

impl PredictionResponse {
    /// Round to kopecks and attach a ±1% interval.
    pub fn from_price(price: f64) -> Self {
        let margin = price * CONFIDENCE_MARGIN;
        Self {
            predicted_price: round2(price),
            confidence_interval: ConfidenceInterval {
                lower: round2(price - margin),
                upper: round2(price + margin),
            },
            currency: CURRENCY.to_string(),
        }
    }
}

/// Outcome of one batch entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItem {
    Success {
        index: usize,
        prediction: PredictionResponse,
    },
    Error {
        index: usize,
        error: String,
    },
}

impl BatchItem {
    pub fn index(&self) -> usize {
        match self {
            Self::Success { index, .. } | Self::Error { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: String,
    pub summary: BatchSummary,
    pub results: Vec<BatchItem>,
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Read-only prediction service shared by every request.
#[derive(Debug)]
pub struct Predictor {
    bundle: ModelBundle,
}

impl Predictor {
    pub fn new(bundle: ModelBundle) -> Self {
        Self { bundle }
    }

    /// Load a bundle saved by a training run.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        ModelBundle::load(dir).map(Self::new)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.bundle.metadata
    }

    /// Ensemble prices for already validated records.
    pub fn predict_records(&self, records: &[PropertyRecord]) -> Result<Vec<f64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let frame = records_to_frame(records)?;
        let prices = predict_frame(&self.bundle, &frame)?;
        Ok(prices.to_vec())
    }

    fn price_one(&self, record: PropertyRecord) -> Result<PredictionResponse> {
        let prices = self.predict_records(std::slice::from_ref(&record))?;
        match prices.first() {
            Some(&p) if p.is_finite() => Ok(PredictionResponse::from_price(p)),
            _ => Err(Error::schema("model produced no finite prediction")),
        }
    }

    /// # Errors
    ///
    /// [`Error::Validation`] listing every bad field.
    pub fn predict_one(&self, body: &Value) -> Result<PredictionResponse> {
        let record = validate_request(body).map_err(Error::Validation)?;
        let response = self.price_one(record)?;
        tracing::info!(price = response.predicted_price, "prediction served");
        Ok(response)
    }

    /// Validate and predict each entry of `{"properties": [...]}`.
    ///
    /// A bad entry becomes an error item and never fails the batch.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if `properties` is missing, not an array, empty
    /// or longer than [`MAX_BATCH_SIZE`].
    pub fn predict_batch(&self, body: &Value) -> Result<BatchResponse> {
        let properties = match body.get("properties") {
            None => return Err(reject("expected JSON with a \"properties\" array")),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(reject("\"properties\" must be an array")),
        };
        if properties.is_empty() {
            return Err(reject("no properties provided"));
        }
        if properties.len() > MAX_BATCH_SIZE {
            return Err(reject(&format!("maximum {MAX_BATCH_SIZE} properties per batch")));
        }

        let mut results: Vec<Option<BatchItem>> = vec![None; properties.len()];
        let mut valid = Vec::with_capacity(properties.len());
        for (index, item) in properties.iter().enumerate() {
            match validate_request(item) {
                Ok(record) => valid.push((index, record)),
                Err(errors) => {
                    results[index] = Some(BatchItem::Error {
                        index,
                        error: describe(&errors),
                    })
                }
            }
        }

        let records: Vec<PropertyRecord> = valid.iter().map(|(_, r)| r.clone()).collect();
        match self.predict_records(&records) {
            Ok(prices) => {
                for ((index, _), price) in valid.iter().zip(prices) {
                    results[*index] = Some(item_for(*index, price));
                }
            }
            Err(e) => {
                // isolate the failing entries
                tracing::warn!(error = %e, "batch prediction failed; retrying per entry");
                for (index, record) in valid {
                    results[index] = Some(match self.price_one(record) {
                        Ok(prediction) => BatchItem::Success { index, prediction },
                        Err(e) => BatchItem::Error {
                            index,
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        let results: Vec<BatchItem> = results.into_iter().flatten().collect();
        let successful = results.iter().filter(|r| r.is_success()).count();
        let summary = BatchSummary {
            total: properties.len(),
            successful,
            failed: properties.len() - successful,
        };
        tracing::info!(successful, failed = summary.failed, "batch prediction served");
        Ok(BatchResponse {
            status: "completed".to_string(),
            summary,
            results,
        })
    }
}

fn reject(message: &str) -> Error {
    Error::Validation(vec![FieldError::new("properties", message)])
}

fn item_for(index: usize, price: f64) -> BatchItem {
    if price.is_finite() {
        BatchItem::Success {
            index,
            prediction: PredictionResponse::from_price(price),
        }
    } else {
        BatchItem::Error {
            index,
            error: "model produced no finite prediction".to_string(),
        }
    }
}
