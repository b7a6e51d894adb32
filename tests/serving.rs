//! Prediction service over a freshly trained bundle.

mod common;

use std::sync::{Arc, OnceLock};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use tower::ServiceExt;

use flatprice::serving::{api, router};
use flatprice::serving::{BatchItem, Predictor, MAX_BATCH_SIZE};
use flatprice::workflow;
use flatprice::Error;

use common::{fast_config, request_body, synthetic_frame};

fn predictor() -> Arc<Predictor> {
    static PREDICTOR: OnceLock<Arc<Predictor>> = OnceLock::new();
    PREDICTOR
        .get_or_init(|| {
            let outcome = workflow::train(&synthetic_frame(300, 21), &fast_config()).unwrap();
            Arc::new(Predictor::new(outcome.bundle))
        })
        .clone()
}

fn bytes(value: &Value) -> Bytes {
    Bytes::from(serde_json::to_vec(value).unwrap())
}

#[test]
fn test_single_prediction_shape() {
    let response = predictor().predict_one(&request_body()).unwrap();
    assert_eq!(response.currency, "RUB");
    assert!(response.predicted_price > 0.0);
    let interval = response.confidence_interval;
    assert!(interval.lower < response.predicted_price);
    assert!(interval.upper > response.predicted_price);
    let half_width = (interval.upper - interval.lower) / 2.0;
    assert!((half_width / response.predicted_price - 0.01).abs() < 1e-4);
}

#[test]
fn test_batch_isolates_invalid_entries() {
    let mut missing_year = request_body();
    missing_year.as_object_mut().unwrap().remove("year");
    let body = json!({
        "properties": [request_body(), request_body(), missing_year, request_body()]
    });

    let response = predictor().predict_batch(&body).unwrap();
    assert_eq!(response.status, "completed");
    assert_eq!(response.summary.total, 4);
    assert_eq!(response.summary.successful, 3);
    assert_eq!(response.summary.failed, 1);

    let indices: Vec<usize> = response.results.iter().map(BatchItem::index).collect();
    assert_eq!(indices, [0, 1, 2, 3]);
    match &response.results[2] {
        BatchItem::Error { error, .. } => assert!(error.contains("year")),
        other => panic!("expected an error item, got {other:?}"),
    }
}

#[test]
fn test_batch_size_limits() {
    let p = predictor();
    assert!(matches!(
        p.predict_batch(&json!({"properties": []})),
        Err(Error::Validation(_))
    ));
    let too_many = vec![request_body(); MAX_BATCH_SIZE + 1];
    assert!(matches!(
        p.predict_batch(&json!({ "properties": too_many })),
        Err(Error::Validation(_))
    ));
    assert!(p.predict_batch(&json!({"items": []})).is_err());
}

#[tokio::test]
async fn test_predict_handler_rejects_out_of_range_with_400() {
    let mut body = request_body();
    body["total_area"] = json!(5.0);
    let err = api::predict(State(predictor()), bytes(&body)).await.unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let payload: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(payload["status"], "error");
    assert!(payload["error"].as_str().unwrap().contains("total_area"));
}

#[tokio::test]
async fn test_batch_handler_succeeds_with_partial_failures() {
    let body = json!({ "properties": [request_body(), {"gas": "Yes"}] });
    let response = api::predict_batch(State(predictor()), bytes(&body)).await.unwrap();
    assert_eq!(response.0.summary.successful, 1);
    assert_eq!(response.0.summary.failed, 1);
}

#[tokio::test]
async fn test_model_info_and_health() {
    let info = api::model_info(State(predictor())).await;
    assert_eq!(info.0.components, ["xgboost", "lightgbm", "catboost"]);
    assert_eq!(info.0.n_features, 31);

    let health = api::health(State(predictor())).await;
    assert_eq!(health.0["status"], "healthy");
}

#[tokio::test]
async fn test_router_allows_cross_origin_requests() {
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = router(predictor()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/predict")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = router(predictor()).oneshot(preflight).await.unwrap();
    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_router_serves_docs_and_unknown_routes() {
    let get = |uri: &'static str| Request::builder().uri(uri).body(Body::empty()).unwrap();

    let response = router(predictor()).oneshot(get("/api/docs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = router(predictor()).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router(predictor()).oneshot(get("/api/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let payload: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(payload["status"], "error");
}
