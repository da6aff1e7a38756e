//! Application state shared across handlers

use crate::artifact::{ArtifactStore, ModelRegistry};
use crate::data::FraudDataset;
use crate::inference::{PredictionLog, RiskThresholds};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ServerConfig;

/// Shared server state. The dataset handle is set once at startup and
/// reused by every training call; the registry holds published models.
pub struct AppState {
    pub config: ServerConfig,
    pub dataset: RwLock<Option<Arc<FraudDataset>>>,
    pub registry: Arc<ModelRegistry>,
    pub store: ArtifactStore,
    pub thresholds: RiskThresholds,
    pub prediction_log: PredictionLog,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = ArtifactStore::new(&config.models_dir);
        let prediction_log = PredictionLog::new(config.prediction_log.clone());
        Self {
            thresholds: config.thresholds,
            config,
            dataset: RwLock::new(None),
            registry: Arc::new(ModelRegistry::new()),
            store,
            prediction_log,
        }
    }

    /// Install the loaded dataset handle
    pub async fn set_dataset(&self, dataset: FraudDataset) {
        *self.dataset.write().await = Some(Arc::new(dataset));
    }

    /// Cheap clone of the dataset handle, if one is loaded
    pub async fn dataset(&self) -> Option<Arc<FraudDataset>> {
        self.dataset.read().await.clone()
    }
}
