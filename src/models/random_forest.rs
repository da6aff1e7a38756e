//! Random forest of Gini trees

use crate::error::{FraudError, Result};
use crate::models::decision_tree::DecisionTree;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand::RngCore;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged ensemble of decision trees for binary classification.
/// The fraud probability of a row is the fraction of trees voting fraud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Random state
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest. Trees are built in parallel; each tree derives its own
    /// seed from the base seed, so the result is independent of scheduling.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
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
        let max_features = ((n_features as f64).sqrt().ceil() as usize).max(1);
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap sample
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                // Per-tree feature subset
                let mut features: Vec<usize> = (0..n_features).collect();
                features.shuffle(&mut rng);
                features.truncate(max_features);
                features.sort_unstable();

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_feature_subset(features);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total[i] += val;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Fraud probability = fraction of trees voting fraud
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(FraudError::ModelNotFitted);
        }

        let votes: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_trees = votes.len() as f64;
        let proba: Vec<f64> = (0..x.nrows())
            .map(|i| votes.iter().filter(|preds| preds[i] > 0.5).count() as f64 / n_trees)
            .collect();

        Ok(Array1::from_vec(proba))
    }

    /// Predict class labels by majority vote
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [0.15, 0.05],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
            [1.05, 1.15],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_forest_classifies_separable() {
        let (x, y) = separable_data();
        let mut rf = RandomForest::new(20).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let preds = rf.predict(&x).unwrap();
        let correct = preds
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count();
        assert!(correct >= 7, "only {} of 8 correct", correct);
    }

    #[test]
    fn test_probability_is_vote_fraction() {
        let (x, y) = separable_data();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        for &p in proba.iter() {
            assert!((0.0..=1.0).contains(&p));
            // Vote fractions over 10 trees are multiples of 0.1
            assert!((p * 10.0 - (p * 10.0).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_forest_deterministic_with_seed() {
        let (x, y) = separable_data();
        let mut a = RandomForest::new(15).with_random_state(7);
        let mut b = RandomForest::new(15).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = separable_data();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }
}
