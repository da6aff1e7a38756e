//! SMOTE oversampling

use crate::error::{FraudError, Result};
use crate::sampling::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
///
/// Generates synthetic minority samples by interpolating between a minority
/// point and one of its k nearest minority neighbors. Original rows are kept
/// as a prefix of the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: Option<u64>,
    /// Target samples per class
    target_counts: Option<HashMap<i64, usize>>,
}

impl Smote {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: None,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Euclidean distance
    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Find k nearest neighbors using BinaryHeap (O(n log k) instead of O(n log n))
    fn find_neighbors(&self, point: &[f64], data: &[Vec<f64>], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, d) in data.iter().enumerate() {
            let dist = Self::distance(point, d);
            if dist <= 0.0 {
                continue; // Exclude self
            }
            if heap.len() < k {
                heap.push(DistIdx(dist, i));
            } else if let Some(&DistIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistIdx(dist, i));
                }
            }
        }

        heap.into_iter().map(|DistIdx(_, i)| i).collect()
    }

    /// Generate synthetic sample between two points
    fn generate_sample(&self, point: &[f64], neighbor: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for Smote {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);

        // A class with zero observed rows never appears in the counts, so a
        // missing minority class surfaces here as a single-class input.
        if counts.len() < 2 {
            return Err(FraudError::DataError(
                "need at least 2 classes for SMOTE".to_string(),
            ));
        }

        // Every class is brought up to the majority count
        let max_count = *counts.values().max().unwrap_or(&0);
        let mut targets = HashMap::new();
        for (&class, &count) in &counts {
            targets.insert(class, max_count.max(count));
        }

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or_else(|| FraudError::DataError("SMOTE not fitted".to_string()))?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let counts = class_counts(y);
        let n_features = x.ncols();

        // Collect only synthetic samples (original data reused from x directly).
        // Classes are visited in sorted order so a fixed seed is reproducible.
        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();

        let mut classes: Vec<i64> = targets.keys().copied().collect();
        classes.sort_unstable();

        for class in classes {
            let target_count = targets[&class];
            let current_count = counts.get(&class).copied().unwrap_or(0);
            let n_to_generate = target_count.saturating_sub(current_count);

            if n_to_generate == 0 {
                continue;
            }

            let class_idx = indices
                .get(&class)
                .ok_or_else(|| FraudError::DataError(format!("class {} has no samples", class)))?;
            let class_samples: Vec<Vec<f64>> = class_idx
                .iter()
                .map(|&i| x.row(i).iter().copied().collect())
                .collect();

            if class_samples.len() < 2 {
                return Err(FraudError::DataError(format!(
                    "class {} needs at least 2 samples for SMOTE interpolation",
                    class
                )));
            }

            let k = self.k_neighbors.min(class_samples.len() - 1).max(1);

            let mut generated = 0;
            while generated < n_to_generate {
                let idx = rng.gen_range(0..class_samples.len());
                let sample = &class_samples[idx];

                let neighbors = self.find_neighbors(sample, &class_samples, k);
                if neighbors.is_empty() {
                    // All duplicates of this point; replicate it instead
                    synthetic_x.push(sample.clone());
                    synthetic_y.push(class);
                    generated += 1;
                    continue;
                }

                let neighbor_idx = neighbors[rng.gen_range(0..neighbors.len())];
                let neighbor = &class_samples[neighbor_idx];

                synthetic_x.push(self.generate_sample(sample, neighbor, &mut rng));
                synthetic_y.push(class);
                generated += 1;
            }
        }

        // Build result: original rows followed by synthetic rows
        let n_original = x.nrows();
        let n_synthetic = synthetic_x.len();
        let n_total = n_original + n_synthetic;
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}
