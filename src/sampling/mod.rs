//! Class rebalancing for the imbalanced fraud label
//!
//! Two strategies are supported, both applied to the training split only:
//! - SMOTE: synthetic minority oversampling via k-nearest-neighbor interpolation
//! - random undersampling of the majority class

mod smote;
mod undersample;

pub use smote::Smote;
pub use undersample::RandomUnderSampler;

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled labels
    pub y: Array1<i64>,
    /// Number of synthetic samples generated
    pub n_synthetic: usize,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Rebalancing strategy selected per training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMethod {
    Smote,
    Undersample,
}

impl Default for BalanceMethod {
    fn default() -> Self {
        Self::Smote
    }
}

impl BalanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smote => "smote",
            Self::Undersample => "undersample",
        }
    }

    /// Build the sampler for this method with a fixed seed
    pub fn sampler(&self, seed: u64) -> Box<dyn Sampler> {
        match self {
            Self::Smote => Box::new(Smote::new().with_seed(seed)),
            Self::Undersample => Box::new(RandomUnderSampler::new().with_seed(seed)),
        }
    }
}

impl fmt::Display for BalanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalanceMethod {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "smote" => Ok(Self::Smote),
            "undersample" | "undersampling" => Ok(Self::Undersample),
            other => Err(FraudError::DataError(format!(
                "unknown balance method: {} (expected smote or undersample)",
                other
            ))),
        }
    }
}

/// Get class distribution
pub fn class_counts(y: &Array1<i64>) -> std::collections::HashMap<i64, usize> {
    let mut counts = std::collections::HashMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Get indices for each class
pub fn class_indices(y: &Array1<i64>) -> std::collections::HashMap<i64, Vec<usize>> {
    let mut indices = std::collections::HashMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}
