//! API route definitions

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. See /api/health for API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let fraud_routes = Router::new()
        .route("/dataset/info", get(handlers::dataset_info))
        .route("/models/status", get(handlers::models_status))
        .route("/train", post(handlers::start_training))
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_json_batch))
        .route("/upload/csv", post(handlers::predict_csv_batch))
        .route("/models/:name/metrics", get(handlers::model_metrics))
        .route(
            "/models/:name/feature-importance",
            get(handlers::feature_importance),
        )
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    let api_routes = Router::new()
        .nest("/fraud", fraud_routes)
        .route("/health", get(handlers::health_check))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
