//! HTTP request handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::artifact::{ModelArtifact, TrainStatus};
use crate::data;
use crate::inference::{self, TransactionFeatures};
use crate::models::ModelVariant;
use crate::pipeline::{PipelineConfig, TrainingPipeline};
use crate::sampling::BalanceMethod;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Default variant served when the request names none
const DEFAULT_MODEL: ModelVariant = ModelVariant::Xgboost;

// ============================================================================
// Health and dataset
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let loaded: Vec<&str> = state
        .registry
        .loaded()
        .into_iter()
        .map(|v| v.as_str())
        .collect();

    Json(json!({
        "status": "healthy",
        "models_loaded": loaded,
        "dataset_loaded": state.dataset().await.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn dataset_info(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let dataset = state
        .dataset()
        .await
        .ok_or_else(|| ServerError::NotFound("no dataset loaded".to_string()))?;

    let summary = dataset.summary()?;
    Ok(Json(json!({
        "total_rows": summary.total_rows,
        "fraud_count": summary.fraud_count,
        "legitimate_count": summary.legitimate_count,
        "fraud_percentage": summary.fraud_percentage,
        "n_features": summary.n_features,
        "memory_bytes": summary.memory_bytes,
        "feature_columns": data::feature_columns(),
    })))
}

// ============================================================================
// Training
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct TrainRequest {
    pub balance_method: Option<String>,
    #[serde(default)]
    pub retrain: bool,
}

pub async fn models_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let statuses: Vec<serde_json::Value> = state
        .registry
        .statuses()
        .into_iter()
        .map(|(variant, status)| {
            let succeeded = status == TrainStatus::Succeeded;
            let mut entry = json!({
                "model": variant.as_str(),
                "status": status,
            });
            if succeeded {
                if let Some(artifact) = state.registry.get(variant) {
                    entry["trained_at"] = json!(artifact.trained_at.to_rfc3339());
                    entry["roc_auc"] = json!(artifact.report.roc_auc);
                    entry["f1_score"] = json!(artifact.report.f1_score);
                }
            }
            entry
        })
        .collect();

    Json(json!({ "models": statuses }))
}

/// Kick off a full training run on a blocking worker. The response is an
/// immediate acknowledgment; progress is visible via the status endpoint.
pub async fn start_training(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<serde_json::Value>> {
    let dataset = state
        .dataset()
        .await
        .ok_or_else(|| ServerError::NotFound("no dataset loaded, cannot train".to_string()))?;

    let balance_method = match &request.balance_method {
        Some(name) => name
            .parse::<BalanceMethod>()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?,
        None => BalanceMethod::default(),
    };

    if !request.retrain && state.registry.loaded().len() == ModelVariant::all().len() {
        return Ok(Json(json!({
            "success": true,
            "message": "all models already trained; pass retrain=true to retrain",
        })));
    }

    let config = PipelineConfig {
        balance_method,
        ..Default::default()
    };
    let registry = Arc::clone(&state.registry);
    let store = state.store.clone();

    info!(balance_method = %balance_method, "training run requested");
    tokio::task::spawn_blocking(move || {
        let pipeline = TrainingPipeline::new(config);
        if let Err(e) = pipeline.run(&dataset, &registry, &store) {
            error!(error = %e, "training run aborted");
        }
    });

    Ok(Json(json!({
        "success": true,
        "message": "training started",
        "balance_method": balance_method.as_str(),
    })))
}

// ============================================================================
// Inference
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub transaction: TransactionFeatures,
    pub model_name: Option<String>,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<inference::PredictionResult>> {
    let artifact = published_artifact(&state, request.model_name.as_deref())?;
    let result = inference::predict_one(&artifact, &request.transaction, &state.thresholds)?;
    state.prediction_log.record(&result);

    info!(
        model = %result.model_used,
        probability = result.fraud_probability,
        tier = ?result.risk_tier,
        "transaction scored"
    );
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    pub transactions: Vec<TransactionFeatures>,
    pub model_name: Option<String>,
}

/// Score a JSON array of transactions. Results preserve input order.
pub async fn predict_json_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchPredictRequest>,
) -> Result<Json<serde_json::Value>> {
    let artifact = published_artifact(&state, request.model_name.as_deref())?;

    let outcome = inference::predict_rows(&artifact, &request.transactions, &state.thresholds)?;
    for result in &outcome.predictions {
        state.prediction_log.record(result);
    }

    info!(
        model = %artifact.variant,
        total = outcome.total,
        fraud_count = outcome.fraud_count,
        "batch scored"
    );
    Ok(Json(json!({
        "model_used": artifact.variant.as_str(),
        "total": outcome.total,
        "fraud_count": outcome.fraud_count,
        "fraud_rate": outcome.fraud_rate,
        "predictions": outcome.predictions,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub model_name: Option<String>,
}

/// Score an uploaded CSV of transactions. Results preserve row order.
pub async fn predict_csv_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let artifact = published_artifact(&state, query.model_name.as_deref())?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let file_name = field.file_name().unwrap_or("batch.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;

        info!(file = %file_name, bytes = bytes.len(), "batch upload received");

        let df = data::read_csv_bytes(&bytes)?;
        let outcome = inference::predict_batch(&artifact, &df, &state.thresholds)?;
        for result in &outcome.predictions {
            state.prediction_log.record(result);
        }

        return Ok(Json(json!({
            "model_used": artifact.variant.as_str(),
            "total": outcome.total,
            "fraud_count": outcome.fraud_count,
            "fraud_rate": outcome.fraud_rate,
            "predictions": outcome.predictions,
        })));
    }

    Err(ServerError::BadRequest("no file uploaded".to_string()))
}

// ============================================================================
// Model introspection
// ============================================================================

pub async fn model_metrics(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let artifact = published_artifact(&state, Some(&name))?;
    Ok(Json(json!({
        "model": artifact.variant.as_str(),
        "trained_at": artifact.trained_at.to_rfc3339(),
        "seed": artifact.seed,
        "balance_method": artifact.balance_method.as_str(),
        "metrics": artifact.report,
    })))
}

/// Feature importances sorted descending. Unavailable for variants with no
/// meaningful notion of importance.
pub async fn feature_importance(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let artifact = published_artifact(&state, Some(&name))?;

    let importances = artifact.model.feature_importances().ok_or_else(|| {
        ServerError::BadRequest(format!(
            "feature importance is not available for {}",
            artifact.variant
        ))
    })?;

    let mut pairs: Vec<(String, f64)> = artifact
        .feature_names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let features: Vec<serde_json::Value> = pairs
        .into_iter()
        .map(|(feature, importance)| json!({ "feature": feature, "importance": importance }))
        .collect();

    Ok(Json(json!({
        "model": artifact.variant.as_str(),
        "features": features,
    })))
}

/// Resolve the requested (or default) variant to its published artifact
fn published_artifact(
    state: &AppState,
    name: Option<&str>,
) -> Result<Arc<ModelArtifact>> {
    let variant = match name {
        Some(name) => name.parse::<ModelVariant>()?,
        None => DEFAULT_MODEL,
    };
    state
        .registry
        .get(variant)
        .ok_or_else(|| ServerError::NotFound(format!("model {} has not been trained", variant)))
}
