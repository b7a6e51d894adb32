//! HTTP routes over a shared [`Predictor`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use super::predictor::{BatchResponse, PredictionResponse, Predictor, MAX_BATCH_SIZE};
use crate::data::schema::{
    CATEGORICAL_FEATURES, DISTRICTS, EXTRA_AREA_TYPES, NUMERIC_FEATURES, YES_NO,
};
use crate::error::{Error, FieldError};
use crate::io::ModelMetadata;

const SERVICE_NAME: &str = "Flat Price Prediction API";

const ENDPOINTS: [&str; 6] = [
    "/",
    "/api/health",
    "/api/model/info",
    "/api/predict",
    "/api/predict/batch",
    "/api/docs",
];

/// Handler error rendered as `{"error": ..., "status": "error"}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = match &self.0 {
            Error::Validation(fields) => json!({
                "error": self.0.to_string(),
                "fields": fields,
                "status": "error",
            }),
            other => json!({ "error": other.to_string(), "status": "error" }),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Err(Error::Validation(vec![FieldError::new("body", "no JSON data provided")]).into());
    }
    serde_json::from_slice(body).map_err(|e| {
        Error::Validation(vec![FieldError::new("body", format!("invalid JSON: {e}"))]).into()
    })
}

/// Run `f` on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(Error::Io(std::io::Error::other(e))))?
        .map_err(ApiError::from)
}

pub async fn home() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "endpoints": {
            "predict": "/api/predict (POST)",
            "batch_predict": "/api/predict/batch (POST)",
            "health": "/api/health (GET)",
            "model_info": "/api/model/info (GET)",
            "documentation": "/api/docs (GET)",
        },
    }))
}

pub async fn docs() -> Json<Value> {
    let required: Vec<&str> = NUMERIC_FEATURES.iter().chain(&CATEGORICAL_FEATURES).copied().collect();
    Json(json!({
        "api": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/": { "method": "GET", "description": "Service info" },
            "/api/health": { "method": "GET", "description": "Health check" },
            "/api/model/info": { "method": "GET", "description": "Model metadata and metrics" },
            "/api/predict": {
                "method": "POST",
                "description": "Predict the price of one flat",
                "content_type": "application/json",
                "required_fields": required,
            },
            "/api/predict/batch": {
                "method": "POST",
                "description": format!("Predict prices for up to {MAX_BATCH_SIZE} flats"),
                "content_type": "application/json",
                "format": { "properties": ["array of property objects"] },
            },
        },
        "valid_values": {
            "gas": YES_NO,
            "hot_water": YES_NO,
            "central_heating": YES_NO,
            "district_name": DISTRICTS,
            "extra_area_type_name": EXTRA_AREA_TYPES,
        },
    }))
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    tracing::debug!(%uri, "unknown route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "status": "error",
            "available_endpoints": ENDPOINTS,
        })),
    )
}

pub async fn health(State(predictor): State<Arc<Predictor>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "models_loaded": !predictor.metadata().components.is_empty(),
    }))
}

pub async fn model_info(State(predictor): State<Arc<Predictor>>) -> Json<ModelMetadata> {
    Json(predictor.metadata().clone())
}

pub async fn predict(
    State(predictor): State<Arc<Predictor>>,
    body: Bytes,
) -> ApiResult<PredictionResponse> {
    let body = parse_body(&body)?;
    let response = run_blocking(move || predictor.predict_one(&body)).await?;
    Ok(Json(response))
}

pub async fn predict_batch(
    State(predictor): State<Arc<Predictor>>,
    body: Bytes,
) -> ApiResult<BatchResponse> {
    let body = parse_body(&body)?;
    let response = run_blocking(move || predictor.predict_batch(&body)).await?;
    Ok(Json(response))
}

/// All routes, with permissive CORS so browser clients can call them.
pub fn router(predictor: Arc<Predictor>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/docs", get(docs))
        .route("/api/health", get(health))
        .route("/api/model/info", get(model_info))
        .route("/api/predict", post(predict))
        .route("/api/predict/batch", post(predict_batch))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(predictor)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(predictor: Arc<Predictor>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving predictions");
    axum::serve(listener, router(predictor)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let err = ApiError(Error::Validation(vec![FieldError::new("year", "is required")]));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["fields"][0]["field"], "year");
    }

    #[tokio::test]
    async fn test_internal_error_is_server_error() {
        let response = ApiError(Error::NotFitted("ensemble")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "ensemble is not fitted");
    }

    #[tokio::test]
    async fn test_docs_list_every_field_and_domain() {
        let docs = docs().await.0;
        let required = docs["endpoints"]["/api/predict"]["required_fields"].as_array().unwrap();
        assert_eq!(required.len(), 17);
        assert_eq!(docs["valid_values"]["district_name"].as_array().unwrap().len(), 7);
        assert_eq!(home().await.0["status"], "operational");
    }

    #[tokio::test]
    async fn test_unknown_route_lists_endpoints() {
        let (status, body) = not_found(Uri::from_static("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0["available_endpoints"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_parse_body_rejects_empty_and_malformed() {
        assert!(parse_body(&Bytes::new()).is_err());
        assert!(parse_body(&Bytes::from_static(b"{oops")).is_err());
        assert_eq!(
            parse_body(&Bytes::from_static(b"{\"a\": 1}")).unwrap(),
            json!({"a": 1})
        );
    }
}
