//! Random undersampling

use crate::error::{FraudError, Result};
use crate::sampling::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Random undersampler: draws the majority class down to the minority count.
/// Selection is without replacement; kept rows preserve their original order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomUnderSampler {
    /// Random seed
    seed: Option<u64>,
    /// Target count per class (minority count after fit)
    target_count: Option<usize>,
}

impl RandomUnderSampler {
    pub fn new() -> Self {
        Self {
            seed: None,
            target_count: None,
        }
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for RandomUnderSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomUnderSampler {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(FraudError::DataError(
                "need at least 2 classes for undersampling".to_string(),
            ));
        }
        let min_count = *counts.values().min().unwrap_or(&0);
        if min_count == 0 {
            return Err(FraudError::DataError(
                "cannot undersample with an empty class".to_string(),
            ));
        }
        self.target_count = Some(min_count);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let target = self
            .target_count
            .ok_or_else(|| FraudError::DataError("undersampler not fitted".to_string()))?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let mut classes: Vec<i64> = indices.keys().copied().collect();
        classes.sort_unstable();

        let mut kept: Vec<usize> = Vec::new();
        for class in classes {
            let class_idx = &indices[&class];
            if class_idx.len() <= target {
                kept.extend_from_slice(class_idx);
            } else {
                let mut shuffled = class_idx.clone();
                shuffled.shuffle(&mut rng);
                shuffled.truncate(target);
                kept.extend_from_slice(&shuffled);
            }
        }
        kept.sort_unstable();

        let result_x = x.select(ndarray::Axis(0), &kept);
        let result_y = Array1::from_vec(kept.iter().map(|&i| y[i]).collect());

        Ok(ResampleResult {
            x: result_x,
            y: result_y,
            n_synthetic: 0,
        })
    }
}
