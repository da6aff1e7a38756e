//! Integration test: Server API endpoints

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use fraudguard::data::{feature_columns, FraudDataset, LABEL_COLUMN};
use fraudguard::models::{GradientBoostingConfig, NeuralNetworkConfig};
use fraudguard::pipeline::{PipelineConfig, TrainingPipeline};
use fraudguard::server::{create_router, AppState, ServerConfig};
use polars::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn synthetic_dataset(n_legit: usize, n_fraud: usize) -> FraudDataset {
    let total = n_legit + n_fraud;
    let mut columns: Vec<Column> = Vec::new();
    for (j, name) in feature_columns().iter().enumerate() {
        let values: Vec<f64> = (0..total)
            .map(|i| {
                let base = if i < n_legit { 0.0 } else { 3.0 };
                base + ((i * 29 + j * 13) % 89) as f64 / 89.0
            })
            .collect();
        columns.push(Column::new(name.as_str().into(), values));
    }
    let labels: Vec<i64> = (0..total).map(|i| if i < n_legit { 0 } else { 1 }).collect();
    columns.push(Column::new(LABEL_COLUMN.into(), labels));
    FraudDataset::from_frame(DataFrame::new(columns).unwrap()).unwrap()
}

fn fast_pipeline() -> TrainingPipeline {
    TrainingPipeline::new(PipelineConfig {
        forest_trees: 5,
        forest_max_depth: 4,
        boosting: GradientBoostingConfig {
            n_rounds: 5,
            max_depth: 3,
            ..Default::default()
        },
        network: NeuralNetworkConfig {
            hidden_layers: vec![4],
            epochs: 5,
            ..Default::default()
        },
        ..Default::default()
    })
}

async fn test_state(models_dir: &TempDir) -> Arc<AppState> {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_path: "unused".to_string(),
        models_dir: models_dir.path().to_string_lossy().into_owned(),
        prediction_log: None,
        thresholds: Default::default(),
        max_upload_size: 10 * 1024 * 1024,
    };
    let state = Arc::new(AppState::new(config));
    state.set_dataset(synthetic_dataset(80, 20)).await;
    state
}

async fn trained_state(models_dir: &TempDir) -> Arc<AppState> {
    let state = test_state(models_dir).await;
    let dataset = state.dataset().await.unwrap();
    fast_pipeline()
        .run(&dataset, &state.registry, &state.store)
        .unwrap();
    state
}

fn app_for(state: &Arc<AppState>) -> axum::Router {
    create_router(Arc::clone(state), &state.config)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn sample_transaction() -> serde_json::Value {
    let mut tx = serde_json::Map::new();
    for name in feature_columns() {
        tx.insert(name, serde_json::json!(0.1));
    }
    tx.insert("Amount".to_string(), serde_json::json!(149.62));
    serde_json::Value::Object(tx)
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_csv_request(uri: &str, csv: &str) -> Request<Body> {
    let boundary = "X-TEST-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"batch.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        csv = csv
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dataset_loaded"], true);
}

#[tokio::test]
async fn test_dataset_info() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fraud/dataset/info")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total_rows"], 100);
    assert_eq!(json["fraud_count"], 20);
    assert_eq!(json["n_features"], 30);
    assert!((json["fraud_percentage"].as_f64().unwrap() - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_models_status_initially_pending() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fraud/models/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), 4);
    for model in models {
        assert_eq!(model["status"]["state"], "pending");
    }
}

#[tokio::test]
async fn test_predict_untrained_model_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let body = serde_json::json!({ "transaction": sample_transaction() });
    let response = app
        .oneshot(json_request("/api/fraud/predict", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], true);
}

#[tokio::test]
async fn test_predict_unknown_model_name_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let body = serde_json::json!({
        "transaction": sample_transaction(),
        "model_name": "svm",
    });
    let response = app
        .oneshot(json_request("/api/fraud/predict", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predict_after_training() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let body = serde_json::json!({
        "transaction": sample_transaction(),
        "model_name": "random_forest",
    });
    let response = app
        .oneshot(json_request("/api/fraud/predict", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["model_used"], "random_forest");
    let p = json["fraud_probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert!(["LOW", "MEDIUM", "HIGH"].contains(&json["risk_tier"].as_str().unwrap()));
    assert!(!json["transaction_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_train_endpoint_acknowledges() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let response = app
        .oneshot(json_request(
            "/api/fraud/train",
            serde_json::json!({ "balance_method": "undersample" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["balance_method"], "undersample");
}

#[tokio::test]
async fn test_train_invalid_balance_method() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let response = app
        .oneshot(json_request(
            "/api/fraud/train",
            serde_json::json!({ "balance_method": "adasyn" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_model_metrics() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fraud/models/xgboost/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["model"], "xgboost");
    let cm = json["metrics"]["confusion_matrix"].as_array().unwrap();
    let total: u64 = cm
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, json["metrics"]["n_test"].as_u64().unwrap());
}

#[tokio::test]
async fn test_feature_importance_sorted() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fraud/models/random_forest/feature-importance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 30);
    let values: Vec<f64> = features
        .iter()
        .map(|f| f["importance"].as_f64().unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]));
    assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_feature_importance_unavailable_for_network() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fraud/models/neural_network/feature-importance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csv_batch_missing_column_is_400() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    // Header intentionally lacks the Amount column
    let mut csv = feature_columns()[..29].join(",");
    csv.push('\n');
    csv.push_str(&vec!["0.1"; 29].join(","));
    csv.push('\n');

    let response = app
        .oneshot(multipart_csv_request("/api/fraud/upload/csv", &csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csv_batch_preserves_row_order() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let mut csv = feature_columns().join(",");
    csv.push('\n');
    for i in 0..5 {
        let row: Vec<String> = (0..30)
            .map(|j| format!("{}", (i + j) as f64 * 0.1))
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    let response = app
        .oneshot(multipart_csv_request(
            "/api/fraud/upload/csv?model_name=logistic_regression",
            &csv,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total"], 5);
    assert_eq!(json["predictions"].as_array().unwrap().len(), 5);
    assert_eq!(json["model_used"], "logistic_regression");
}

#[tokio::test]
async fn test_json_batch_preserves_order_and_counts() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let body = serde_json::json!({
        "transactions": [sample_transaction(), sample_transaction(), sample_transaction()],
        "model_name": "xgboost",
    });
    let response = app
        .oneshot(json_request("/api/fraud/predict/batch", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["model_used"], "xgboost");
    assert_eq!(json["total"], 3);
    let predictions = json["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 3);

    let fraud_count = predictions
        .iter()
        .filter(|p| p["prediction"] == 1)
        .count();
    assert_eq!(json["fraud_count"], fraud_count);
}

#[tokio::test]
async fn test_json_batch_empty_is_400() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    let body = serde_json::json!({ "transactions": [] });
    let response = app
        .oneshot(json_request("/api/fraud/predict/batch", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csv_batch_larger_than_default_body_limit() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&trained_state(&dir).await);

    // Roughly 4MB of rows, past axum's built-in 2MB cap but inside the
    // configured max_upload_size.
    let mut csv = feature_columns().join(",");
    csv.push('\n');
    let row = vec!["0.125"; 30].join(",");
    let n_rows = 4 * 1024 * 1024 / (row.len() + 1);
    for _ in 0..n_rows {
        csv.push_str(&row);
        csv.push('\n');
    }

    let response = app
        .oneshot(multipart_csv_request(
            "/api/fraud/upload/csv?model_name=logistic_regression",
            &csv,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total"], n_rows);
}

#[tokio::test]
async fn test_unknown_route_is_404_json() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&test_state(&dir).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/fraud/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], true);
}
