//! Trained model artifacts and the in-process registry
//!
//! An artifact bundles everything inference needs for one variant: the
//! fitted model, the scaler used at training time, the evaluation report,
//! and enough metadata to trace where it came from. Artifacts are immutable
//! once built and shared as `Arc`, so a publish is a pointer swap and
//! readers never observe a half-updated model.

mod store;

pub use store::ArtifactStore;

use crate::error::{FraudError, Result};
use crate::evaluation::EvaluationReport;
use crate::models::{FittedModel, ModelVariant};
use crate::preprocessing::StandardScaler;
use crate::sampling::BalanceMethod;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A fully trained, evaluated model ready to serve predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub variant: ModelVariant,
    pub model: FittedModel,
    pub scaler: StandardScaler,
    pub report: EvaluationReport,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub balance_method: BalanceMethod,
}

/// Training lifecycle of one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrainStatus {
    Pending,
    Running,
    Succeeded,
    Failed { error: String },
}

#[derive(Default)]
struct RegistryInner {
    artifacts: HashMap<ModelVariant, Arc<ModelArtifact>>,
    statuses: HashMap<ModelVariant, TrainStatus>,
}

/// Shared map of published artifacts plus per-variant training status
#[derive(Default)]
pub struct ModelRegistry {
    inner: RwLock<RegistryInner>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently published artifact for `variant`, if any
    pub fn get(&self, variant: ModelVariant) -> Option<Arc<ModelArtifact>> {
        self.inner.read().artifacts.get(&variant).cloned()
    }

    /// Atomically replace the artifact for its variant and mark it succeeded
    pub fn publish(&self, artifact: ModelArtifact) {
        let variant = artifact.variant;
        let mut inner = self.inner.write();
        inner.artifacts.insert(variant, Arc::new(artifact));
        inner.statuses.insert(variant, TrainStatus::Succeeded);
    }

    pub fn status(&self, variant: ModelVariant) -> TrainStatus {
        self.inner
            .read()
            .statuses
            .get(&variant)
            .cloned()
            .unwrap_or(TrainStatus::Pending)
    }

    /// Status of every variant, in training order
    pub fn statuses(&self) -> Vec<(ModelVariant, TrainStatus)> {
        let inner = self.inner.read();
        ModelVariant::all()
            .into_iter()
            .map(|v| {
                (
                    v,
                    inner
                        .statuses
                        .get(&v)
                        .cloned()
                        .unwrap_or(TrainStatus::Pending),
                )
            })
            .collect()
    }

    /// Transition `variant` to `Running`. Fails if a run is already in
    /// flight for the same variant.
    pub fn mark_running(&self, variant: ModelVariant) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.statuses.get(&variant) == Some(&TrainStatus::Running) {
            return Err(FraudError::TrainingError(format!(
                "{} is already training",
                variant
            )));
        }
        inner.statuses.insert(variant, TrainStatus::Running);
        Ok(())
    }

    pub fn mark_failed(&self, variant: ModelVariant, error: String) {
        self.inner
            .write()
            .statuses
            .insert(variant, TrainStatus::Failed { error });
    }

    /// Variants with a published artifact
    pub fn loaded(&self) -> Vec<ModelVariant> {
        let inner = self.inner.read();
        ModelVariant::all()
            .into_iter()
            .filter(|v| inner.artifacts.contains_key(v))
            .collect()
    }
}
