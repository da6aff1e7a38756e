//! Prediction path: single transactions and CSV batches
//!
//! Every prediction goes through the artifact's own scaler, so serving
//! reproduces training-time preprocessing exactly. Risk tiers are a pure
//! function of the fraud probability and the configured thresholds.

use crate::artifact::ModelArtifact;
use crate::data;
use crate::error::{FraudError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

/// Probability cutoffs for the risk buckets
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.7,
        }
    }
}

/// Risk bucket derived from the fraud probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Bucket a probability: p >= high is HIGH, p >= medium is MEDIUM
    pub fn from_probability(p: f64, thresholds: &RiskThresholds) -> Self {
        if p >= thresholds.high {
            Self::High
        } else if p >= thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One transaction in the fixed 30-feature schema. Serde names match the
/// CSV header so JSON bodies and CSV rows share a vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFeatures {
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "V1")]
    pub v1: f64,
    #[serde(rename = "V2")]
    pub v2: f64,
    #[serde(rename = "V3")]
    pub v3: f64,
    #[serde(rename = "V4")]
    pub v4: f64,
    #[serde(rename = "V5")]
    pub v5: f64,
    #[serde(rename = "V6")]
    pub v6: f64,
    #[serde(rename = "V7")]
    pub v7: f64,
    #[serde(rename = "V8")]
    pub v8: f64,
    #[serde(rename = "V9")]
    pub v9: f64,
    #[serde(rename = "V10")]
    pub v10: f64,
    #[serde(rename = "V11")]
    pub v11: f64,
    #[serde(rename = "V12")]
    pub v12: f64,
    #[serde(rename = "V13")]
    pub v13: f64,
    #[serde(rename = "V14")]
    pub v14: f64,
    #[serde(rename = "V15")]
    pub v15: f64,
    #[serde(rename = "V16")]
    pub v16: f64,
    #[serde(rename = "V17")]
    pub v17: f64,
    #[serde(rename = "V18")]
    pub v18: f64,
    #[serde(rename = "V19")]
    pub v19: f64,
    #[serde(rename = "V20")]
    pub v20: f64,
    #[serde(rename = "V21")]
    pub v21: f64,
    #[serde(rename = "V22")]
    pub v22: f64,
    #[serde(rename = "V23")]
    pub v23: f64,
    #[serde(rename = "V24")]
    pub v24: f64,
    #[serde(rename = "V25")]
    pub v25: f64,
    #[serde(rename = "V26")]
    pub v26: f64,
    #[serde(rename = "V27")]
    pub v27: f64,
    #[serde(rename = "V28")]
    pub v28: f64,
    #[serde(rename = "Amount")]
    pub amount: f64,
}

impl TransactionFeatures {
    /// Flatten into the canonical feature order: Time, V1..V28, Amount
    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_vec(vec![
            self.time, self.v1, self.v2, self.v3, self.v4, self.v5, self.v6, self.v7, self.v8,
            self.v9, self.v10, self.v11, self.v12, self.v13, self.v14, self.v15, self.v16,
            self.v17, self.v18, self.v19, self.v20, self.v21, self.v22, self.v23, self.v24,
            self.v25, self.v26, self.v27, self.v28, self.amount,
        ])
    }
}

/// A single scored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub transaction_id: String,
    /// 1 = fraud, 0 = legitimate, at the 0.5 threshold
    pub prediction: i64,
    pub fraud_probability: f64,
    pub risk_tier: RiskTier,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
}

/// Batch scoring output; predictions are in input row order
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub predictions: Vec<PredictionResult>,
    pub total: usize,
    pub fraud_count: usize,
    pub fraud_rate: f64,
}

/// Score one transaction against a published artifact
pub fn predict_one(
    artifact: &ModelArtifact,
    features: &TransactionFeatures,
    thresholds: &RiskThresholds,
) -> Result<PredictionResult> {
    let raw = features.to_array();
    let scaled = artifact.scaler.transform_row(&raw)?;

    let n = scaled.len();
    let x = scaled.into_shape_with_order((1, n)).map_err(|e| {
        FraudError::DataError(format!("cannot shape feature row: {}", e))
    })?;

    let proba = artifact.model.predict_proba(&x)?;
    Ok(result_from_probability(proba[0], artifact, thresholds))
}

/// Score a parsed CSV batch. Output order and length match the input rows.
pub fn predict_batch(
    artifact: &ModelArtifact,
    df: &DataFrame,
    thresholds: &RiskThresholds,
) -> Result<BatchOutcome> {
    let raw = data::batch_feature_matrix(df)?;
    score_matrix(artifact, &raw, thresholds)
}

/// Score a slice of already-parsed transactions, preserving input order
pub fn predict_rows(
    artifact: &ModelArtifact,
    transactions: &[TransactionFeatures],
    thresholds: &RiskThresholds,
) -> Result<BatchOutcome> {
    if transactions.is_empty() {
        return Err(FraudError::DataError("no rows in batch".to_string()));
    }
    let mut raw = Array2::zeros((transactions.len(), data::N_FEATURES));
    for (i, tx) in transactions.iter().enumerate() {
        raw.row_mut(i).assign(&tx.to_array());
    }
    score_matrix(artifact, &raw, thresholds)
}

fn score_matrix(
    artifact: &ModelArtifact,
    raw: &Array2<f64>,
    thresholds: &RiskThresholds,
) -> Result<BatchOutcome> {
    let scaled = artifact.scaler.transform(raw)?;
    let proba = artifact.model.predict_proba(&scaled)?;

    let predictions: Vec<PredictionResult> = proba
        .iter()
        .map(|&p| result_from_probability(p, artifact, thresholds))
        .collect();

    let total = predictions.len();
    let fraud_count = predictions.iter().filter(|r| r.prediction == 1).count();

    Ok(BatchOutcome {
        predictions,
        total,
        fraud_count,
        fraud_rate: if total > 0 {
            fraud_count as f64 / total as f64
        } else {
            0.0
        },
    })
}

fn result_from_probability(
    p: f64,
    artifact: &ModelArtifact,
    thresholds: &RiskThresholds,
) -> PredictionResult {
    let p = p.clamp(0.0, 1.0);
    PredictionResult {
        transaction_id: Uuid::new_v4().to_string(),
        prediction: if p > 0.5 { 1 } else { 0 },
        fraud_probability: p,
        risk_tier: RiskTier::from_probability(p, thresholds),
        model_used: artifact.variant.to_string(),
        timestamp: Utc::now(),
    }
}

/// Best-effort JSON-lines log of prediction events. Logging problems are
/// reported at warn level and never affect the prediction itself.
#[derive(Debug, Clone, Default)]
pub struct PredictionLog {
    path: Option<PathBuf>,
}

impl PredictionLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn record(&self, result: &PredictionResult) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.append(path, result) {
            warn!(error = %e, "prediction event not logged");
        }
    }

    fn append(&self, path: &PathBuf, result: &PredictionResult) -> Result<()> {
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_boundaries() {
        let t = RiskThresholds::default();
        assert_eq!(RiskTier::from_probability(0.0, &t), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.29, &t), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.3, &t), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(0.69, &t), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(0.7, &t), RiskTier::High);
        assert_eq!(RiskTier::from_probability(1.0, &t), RiskTier::High);
    }

    #[test]
    fn test_risk_tier_serde_uppercase() {
        assert_eq!(serde_json::to_string(&RiskTier::High).unwrap(), "\"HIGH\"");
        assert_eq!(serde_json::to_string(&RiskTier::Low).unwrap(), "\"LOW\"");
    }

    #[test]
    fn test_features_round_trip_csv_names() {
        let json = r#"{"Time": 0.0, "V1": -1.359807, "V2": -0.072781, "V3": 2.536347,
            "V4": 1.378155, "V5": -0.338321, "V6": 0.462388, "V7": 0.239599,
            "V8": 0.098698, "V9": 0.363787, "V10": 0.090794, "V11": -0.551600,
            "V12": -0.617801, "V13": -0.991390, "V14": -0.311169, "V15": 1.468177,
            "V16": -0.470401, "V17": 0.207971, "V18": 0.025791, "V19": 0.403993,
            "V20": 0.251412, "V21": -0.018307, "V22": 0.277838, "V23": -0.110474,
            "V24": 0.066928, "V25": 0.128539, "V26": -0.189115, "V27": 0.133558,
            "V28": -0.021053, "Amount": 149.62}"#;
        let features: TransactionFeatures = serde_json::from_str(json).unwrap();
        let arr = features.to_array();
        assert_eq!(arr.len(), 30);
        assert_eq!(arr[0], 0.0);
        assert_eq!(arr[29], 149.62);
    }

    #[test]
    fn test_prediction_log_without_path_is_noop() {
        let log = PredictionLog::new(None);
        let result = PredictionResult {
            transaction_id: "t".to_string(),
            prediction: 0,
            fraud_probability: 0.1,
            risk_tier: RiskTier::Low,
            model_used: "xgboost".to_string(),
            timestamp: Utc::now(),
        };
        log.record(&result);
    }

    #[test]
    fn test_prediction_log_appends_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = PredictionLog::new(Some(path.clone()));

        let result = PredictionResult {
            transaction_id: "t1".to_string(),
            prediction: 1,
            fraud_probability: 0.9,
            risk_tier: RiskTier::High,
            model_used: "random_forest".to_string(),
            timestamp: Utc::now(),
        };
        log.record(&result);
        log.record(&result);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"HIGH\""));
    }
}
