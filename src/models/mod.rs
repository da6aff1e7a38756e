//! Classifier implementations
//!
//! Four model families are trained over the same prepared data:
//! - [`LogisticRegression`] - L2-regularized linear baseline
//! - [`RandomForest`] - bagged decision trees
//! - [`GradientBoosting`] - second-order boosted trees
//! - [`NeuralNetwork`] - compact feed-forward binary classifier
//!
//! [`FittedModel`] is the uniform dispatch surface the pipeline and the
//! inference path work against.

mod decision_tree;
mod gradient_boosting;
mod linear;
mod neural_network;
mod random_forest;

pub use decision_tree::DecisionTree;
pub use gradient_boosting::{GradientBoosting, GradientBoostingConfig};
pub use linear::LogisticRegression;
pub use neural_network::{NeuralNetwork, NeuralNetworkConfig};
pub use random_forest::RandomForest;

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four trainable model variants, identified on the wire by snake_case names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    LogisticRegression,
    RandomForest,
    Xgboost,
    NeuralNetwork,
}

impl ModelVariant {
    /// All variants in training order
    pub fn all() -> [ModelVariant; 4] {
        [
            Self::LogisticRegression,
            Self::RandomForest,
            Self::Xgboost,
            Self::NeuralNetwork,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogisticRegression => "logistic_regression",
            Self::RandomForest => "random_forest",
            Self::Xgboost => "xgboost",
            Self::NeuralNetwork => "neural_network",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logistic_regression" => Ok(Self::LogisticRegression),
            "random_forest" => Ok(Self::RandomForest),
            "xgboost" => Ok(Self::Xgboost),
            "neural_network" => Ok(Self::NeuralNetwork),
            other => Err(FraudError::UnknownModel(other.to_string())),
        }
    }
}

/// A trained classifier of any variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    Xgboost(GradientBoosting),
    NeuralNetwork(NeuralNetwork),
}

impl FittedModel {
    pub fn variant(&self) -> ModelVariant {
        match self {
            Self::LogisticRegression(_) => ModelVariant::LogisticRegression,
            Self::RandomForest(_) => ModelVariant::RandomForest,
            Self::Xgboost(_) => ModelVariant::Xgboost,
            Self::NeuralNetwork(_) => ModelVariant::NeuralNetwork,
        }
    }

    /// Fraud probability per row, in [0, 1]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = match self {
            Self::LogisticRegression(m) => m.predict_proba(x)?,
            Self::RandomForest(m) => m.predict_proba(x)?,
            Self::Xgboost(m) => m.predict_proba(x)?,
            Self::NeuralNetwork(m) => m.predict_proba(x)?,
        };
        Ok(proba.mapv(|p| p.clamp(0.0, 1.0)))
    }

    /// Class labels at the 0.5 decision threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Whether this variant can explain itself via per-feature importances
    pub fn supports_importance(&self) -> bool {
        !matches!(self, Self::NeuralNetwork(_))
    }

    /// Normalized feature importances summing to 1, or `None` where the
    /// variant has no meaningful notion of importance.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            Self::LogisticRegression(m) => {
                let coef = m.coefficients.as_ref()?;
                Some(normalize(coef.mapv(f64::abs)))
            }
            Self::RandomForest(m) => m.feature_importances().cloned(),
            Self::Xgboost(m) => m.feature_importances(),
            Self::NeuralNetwork(_) => None,
        }
    }
}

fn normalize(mut v: Array1<f64>) -> Array1<f64> {
    let total: f64 = v.iter().sum();
    if total > 0.0 {
        v.mapv_inplace(|x| x / total);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_variant_round_trip() {
        for variant in ModelVariant::all() {
            let parsed: ModelVariant = variant.as_str().parse().unwrap();
            assert_eq!(parsed, variant);
        }
    }

    #[test]
    fn test_unknown_variant() {
        let err = "svm".parse::<ModelVariant>().unwrap_err();
        assert!(matches!(err, FraudError::UnknownModel(_)));
    }

    #[test]
    fn test_variant_serde_names() {
        let json = serde_json::to_string(&ModelVariant::NeuralNetwork).unwrap();
        assert_eq!(json, "\"neural_network\"");
    }

    #[test]
    fn test_logistic_importance_normalized() {
        let x = array![
            [0.0, 0.0],
            [0.5, 0.1],
            [1.0, 0.2],
            [5.0, 0.3],
            [5.5, 0.4],
            [6.0, 0.5],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut lr = LogisticRegression::new().with_max_iter(500);
        lr.fit(&x, &y).unwrap();
        let model = FittedModel::LogisticRegression(lr);

        assert!(model.supports_importance());
        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp.iter().all(|&v| v >= 0.0));
    }
}
