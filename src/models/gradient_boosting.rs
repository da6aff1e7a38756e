//! Boosted trees with a second-order logistic loss approximation
//!
//! Each round fits a small regression tree to the gradient/hessian of the
//! logistic loss. Leaf weights are regularized: w* = -G / (H + lambda), and
//! splits are scored by the gain
//! 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ.

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum BoostNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    fn predict(&self, sample: &[f64]) -> f64 {
        match self {
            BoostNode::Leaf { weight } => *weight,
            BoostNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Binary classifier boosted over the logistic loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    config: GradientBoostingConfig,
    trees: Vec<BoostNode>,
    base_score: f64,
    /// Accumulated split gain per feature across all trees
    gain_by_feature: Vec<f64>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            gain_by_feature: Vec::new(),
            n_features: 0,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(FraudError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(FraudError::TrainingError("no training samples".to_string()));
        }

        self.n_features = n_features;
        self.gain_by_feature = vec![0.0; n_features];

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _round in 0..self.config.n_rounds {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample);

            let tree = build_tree(
                x,
                &grad,
                &hess,
                &row_indices,
                &col_indices,
                0,
                &self.config,
                &mut self.gain_by_feature,
            );

            // The new tree shifts every row's raw score, sampled or not
            for i in 0..n_samples {
                let sample: Vec<f64> = x.row(i).iter().copied().collect();
                raw_preds[i] += self.config.learning_rate * tree.predict(&sample);
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(FraudError::ModelNotFitted);
        }

        let lr = self.config.learning_rate;
        let base = self.base_score;
        let raw: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let sample: Vec<f64> = row.iter().copied().collect();
                base + lr
                    * self
                        .trees
                        .iter()
                        .map(|tree| tree.predict(&sample))
                        .sum::<f64>()
            })
            .collect();

        Ok(Array1::from_vec(raw).mapv(Self::sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Gain-based feature importances, normalized to sum to 1
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 || self.trees.is_empty() {
            return None;
        }
        let mut gains = self.gain_by_feature.clone();
        let total: f64 = gains.iter().sum();
        if total > 0.0 {
            for g in gains.iter_mut() {
                *g /= total;
            }
        }
        Some(Array1::from_vec(gains))
    }
}

/// Build one tree by exact greedy split finding over the sampled rows/columns
#[allow(clippy::too_many_arguments)]
fn build_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &GradientBoostingConfig,
    gains: &mut [f64],
) -> BoostNode {
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = -g_sum / (h_sum + config.reg_lambda);

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return BoostNode::Leaf {
            weight: leaf_weight,
        };
    }

    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return BoostNode::Leaf {
                    weight: leaf_weight,
                };
            }

            gains[feature] += gain;

            let left = build_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config, gains);
            let right = build_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config, gains);

            BoostNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => BoostNode::Leaf {
            weight: leaf_weight,
        },
    }
}

/// Find the best split for a single feature using the exact greedy method
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &GradientBoostingConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;

    let lambda = config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    for (pos, &idx) in sorted_indices.iter().enumerate() {
        g_left += grad[idx];
        h_left += hess[idx];

        // Skip thresholds that cannot separate identical feature values
        if pos + 1 < sorted_indices.len() {
            let next_idx = sorted_indices[pos + 1];
            if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
                continue;
            }
        } else {
            break;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - parent_score);

        if gain > best_gain {
            best_gain = gain;
            let next_idx = sorted_indices[pos + 1];
            best_threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
        }
    }

    if best_gain > f64::NEG_INFINITY {
        Some((feature, best_threshold, best_gain))
    } else {
        None
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect())
            .unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_boosting_accuracy() {
        let (x, y) = classification_data();
        let mut model = GradientBoosting::new(GradientBoostingConfig {
            n_rounds: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        let correct = preds
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count();
        assert!(correct as f64 / y.len() as f64 >= 0.9);
    }

    #[test]
    fn test_probabilities_in_range() {
        let (x, y) = classification_data();
        let mut model = GradientBoosting::new(GradientBoostingConfig {
            n_rounds: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), x.nrows());
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_gain_importances_normalized() {
        let (x, y) = classification_data();
        let mut model = GradientBoosting::new(GradientBoostingConfig {
            n_rounds: 20,
            max_depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = classification_data();
        let config = GradientBoostingConfig {
            n_rounds: 15,
            subsample: 0.8,
            random_state: Some(9),
            ..Default::default()
        };
        let mut a = GradientBoosting::new(config.clone());
        let mut b = GradientBoosting::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }
}
