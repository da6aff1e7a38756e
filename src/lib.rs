//! FraudGuard - Credit card fraud detection engine
//!
//! Training pipeline, model registry, and scoring API for the standard
//! anonymized credit-card transaction schema (Time, V1..V28, Amount).
//!
//! # Modules
//!
//! - [`data`] - CSV ingestion, feature extraction, stratified splitting
//! - [`sampling`] - class rebalancing (SMOTE, random undersampling)
//! - [`preprocessing`] - feature standardization
//! - [`models`] - the four classifier variants and their dispatch enum
//! - [`evaluation`] - held-out metrics and ROC-AUC
//! - [`artifact`] - trained-model registry and JSON persistence
//! - [`pipeline`] - the end-to-end training run
//! - [`inference`] - single and batch scoring with risk tiers
//! - [`server`] - the REST API

pub mod artifact;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod sampling;
pub mod server;

pub use error::{FraudError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::artifact::{ArtifactStore, ModelArtifact, ModelRegistry, TrainStatus};
    pub use crate::data::FraudDataset;
    pub use crate::error::{FraudError, Result};
    pub use crate::evaluation::EvaluationReport;
    pub use crate::inference::{PredictionResult, RiskThresholds, RiskTier, TransactionFeatures};
    pub use crate::models::{FittedModel, ModelVariant};
    pub use crate::pipeline::{PipelineConfig, TrainingPipeline};
    pub use crate::sampling::BalanceMethod;
}
