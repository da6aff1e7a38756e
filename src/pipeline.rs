//! End-to-end training run
//!
//! One run prepares the data a single time (split, scale, rebalance) and
//! then fits, evaluates, persists, and publishes each model variant
//! independently. A failure in one variant lands in that variant's status
//! and never aborts the others.

use crate::artifact::{ArtifactStore, ModelArtifact, ModelRegistry};
use crate::data::{self, FraudDataset, SplitData};
use crate::error::Result;
use crate::evaluation::{self, EvaluationReport};
use crate::models::{
    FittedModel, GradientBoosting, GradientBoostingConfig, LogisticRegression, ModelVariant,
    NeuralNetwork, NeuralNetworkConfig, RandomForest,
};
use crate::preprocessing::StandardScaler;
use crate::sampling::BalanceMethod;
use chrono::Utc;
use ndarray::{Array1, Array2};
use tracing::{error, info, warn};

/// Pipeline settings, defaulted to the standard training recipe
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub balance_method: BalanceMethod,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub boosting: GradientBoostingConfig,
    pub network: NeuralNetworkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            balance_method: BalanceMethod::default(),
            forest_trees: 100,
            forest_max_depth: 10,
            boosting: GradientBoostingConfig::default(),
            network: NeuralNetworkConfig::default(),
        }
    }
}

/// Outcome of one variant within a run
#[derive(Debug)]
pub struct VariantOutcome {
    pub variant: ModelVariant,
    pub result: Result<EvaluationReport>,
}

pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Train every variant on the dataset, publishing successes to the
    /// registry and persisting them through the store.
    pub fn run(
        &self,
        dataset: &FraudDataset,
        registry: &ModelRegistry,
        store: &ArtifactStore,
    ) -> Result<Vec<VariantOutcome>> {
        let prepared = self.prepare(dataset)?;
        info!(
            train_rows = prepared.x_train.nrows(),
            test_rows = prepared.x_test.nrows(),
            n_synthetic = prepared.n_synthetic,
            balance_method = %self.config.balance_method,
            "training data prepared"
        );

        let mut outcomes = Vec::with_capacity(4);
        for variant in ModelVariant::all() {
            if let Err(e) = registry.mark_running(variant) {
                warn!(variant = %variant, error = %e, "skipping variant");
                outcomes.push(VariantOutcome {
                    variant,
                    result: Err(e),
                });
                continue;
            }

            let result = self.train_variant(variant, &prepared, registry, store);
            if let Err(e) = &result {
                error!(variant = %variant, error = %e, "training failed");
                registry.mark_failed(variant, e.to_string());
            }
            outcomes.push(VariantOutcome { variant, result });
        }

        Ok(outcomes)
    }

    /// Extract features, split, fit the scaler on the training partition,
    /// and rebalance the scaled training partition only.
    fn prepare(&self, dataset: &FraudDataset) -> Result<PreparedData> {
        let (x, y) = data::feature_matrix(dataset.frame())?;
        let split = data::stratified_split(&x, &y, self.config.test_fraction, self.config.seed)?;

        let SplitData {
            x_train,
            y_train,
            x_test,
            y_test,
        } = split;

        let mut scaler = StandardScaler::new();
        let x_train_scaled = scaler.fit_transform(&x_train)?;
        let x_test_scaled = scaler.transform(&x_test)?;

        let mut sampler = self.config.balance_method.sampler(self.config.seed);
        let resampled = sampler.fit_resample(&x_train_scaled, &y_train)?;

        Ok(PreparedData {
            x_train: resampled.x,
            y_train: resampled.y.mapv(|v| v as f64),
            x_test: x_test_scaled,
            y_test,
            scaler,
            n_synthetic: resampled.n_synthetic,
        })
    }

    fn train_variant(
        &self,
        variant: ModelVariant,
        prepared: &PreparedData,
        registry: &ModelRegistry,
        store: &ArtifactStore,
    ) -> Result<EvaluationReport> {
        let started = std::time::Instant::now();
        let model = self.fit_model(variant, &prepared.x_train, &prepared.y_train)?;
        let report = evaluation::evaluate(&model, &prepared.x_test, &prepared.y_test)?;

        info!(
            variant = %variant,
            accuracy = report.accuracy,
            roc_auc = report.roc_auc,
            f1 = report.f1_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "variant trained"
        );

        let artifact = ModelArtifact {
            variant,
            model,
            scaler: prepared.scaler.clone(),
            report: report.clone(),
            feature_names: data::feature_columns(),
            trained_at: Utc::now(),
            seed: self.config.seed,
            balance_method: self.config.balance_method,
        };

        // Persistence problems are logged, not fatal; the in-memory model
        // still serves until the next restart.
        if let Err(e) = store.save(&artifact) {
            warn!(variant = %variant, error = %e, "artifact not persisted");
        }
        registry.publish(artifact);

        Ok(report)
    }

    fn fit_model(
        &self,
        variant: ModelVariant,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<FittedModel> {
        let seed = self.config.seed;
        match variant {
            ModelVariant::LogisticRegression => {
                let mut model = LogisticRegression::new();
                model.fit(x, y)?;
                Ok(FittedModel::LogisticRegression(model))
            }
            ModelVariant::RandomForest => {
                let mut model = RandomForest::new(self.config.forest_trees)
                    .with_max_depth(self.config.forest_max_depth)
                    .with_random_state(seed);
                model.fit(x, y)?;
                Ok(FittedModel::RandomForest(model))
            }
            ModelVariant::Xgboost => {
                let mut config = self.config.boosting.clone();
                config.random_state = Some(seed);
                let mut model = GradientBoosting::new(config);
                model.fit(x, y)?;
                Ok(FittedModel::Xgboost(model))
            }
            ModelVariant::NeuralNetwork => {
                let mut config = self.config.network.clone();
                config.random_state = Some(seed);
                let mut model = NeuralNetwork::new(config);
                model.fit(x, y)?;
                Ok(FittedModel::NeuralNetwork(model))
            }
        }
    }
}

struct PreparedData {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<i64>,
    scaler: StandardScaler,
    n_synthetic: usize,
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::TrainStatus;
    use crate::data::{feature_columns, LABEL_COLUMN};
    use polars::prelude::*;
    use tempfile::TempDir;

    fn small_dataset(n_legit: usize, n_fraud: usize) -> FraudDataset {
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

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
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
        }
    }

    #[test]
    fn test_full_run_publishes_all_variants() {
        let dataset = small_dataset(80, 20);
        let registry = ModelRegistry::new();
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let pipeline = TrainingPipeline::new(fast_config());
        let outcomes = pipeline.run(&dataset, &registry, &store).unwrap();

        assert_eq!(outcomes.len(), 4);
        for outcome in &outcomes {
            assert!(outcome.result.is_ok(), "{} failed", outcome.variant);
            assert_eq!(registry.status(outcome.variant), TrainStatus::Succeeded);
            assert!(registry.get(outcome.variant).is_some());
        }

        // Artifacts landed on disk too
        assert_eq!(store.load_all().len(), 4);
    }

    #[test]
    fn test_reports_are_consistent() {
        let dataset = small_dataset(60, 20);
        let registry = ModelRegistry::new();
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let outcomes = TrainingPipeline::new(fast_config())
            .run(&dataset, &registry, &store)
            .unwrap();

        for outcome in outcomes {
            let report = outcome.result.unwrap();
            let cm = report.confusion_matrix;
            let total = cm[0][0] + cm[0][1] + cm[1][0] + cm[1][1];
            assert_eq!(total, report.n_test);
            assert_eq!(report.n_test, 16); // 20% of 80 rows
        }
    }

    #[test]
    fn test_deterministic_given_seed() {
        let dataset = small_dataset(60, 20);
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let run = |dir: &TempDir| {
            let registry = ModelRegistry::new();
            let store = ArtifactStore::new(dir.path());
            TrainingPipeline::new(fast_config())
                .run(&dataset, &registry, &store)
                .unwrap()
                .into_iter()
                .map(|o| o.result.unwrap().accuracy)
                .collect::<Vec<f64>>()
        };

        assert_eq!(run(&dir_a), run(&dir_b));
    }

    #[test]
    fn test_running_variant_is_skipped() {
        let dataset = small_dataset(60, 20);
        let registry = ModelRegistry::new();
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        registry.mark_running(ModelVariant::Xgboost).unwrap();

        let outcomes = TrainingPipeline::new(fast_config())
            .run(&dataset, &registry, &store)
            .unwrap();

        let xgb = outcomes
            .iter()
            .find(|o| o.variant == ModelVariant::Xgboost)
            .unwrap();
        assert!(xgb.result.is_err());
        assert!(registry.get(ModelVariant::Xgboost).is_none());
    }
}
