//! Gini decision tree, the building block for the forest

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with majority-class prediction
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Classification tree using Gini impurity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Candidate features for splits; all features when None
    pub feature_subset: Option<Vec<usize>>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            feature_subset: None,
            n_features: 0,
            feature_importances: None,
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

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_feature_subset(mut self, features: Vec<usize>) -> Self {
        self.feature_subset = Some(features);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(FraudError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < self.min_samples_split.max(1) {
            return Err(FraudError::TrainingError(format!(
                "need at least {} samples, got {}",
                self.min_samples_split, n_samples
            )));
        }

        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples <= self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(&y_subset);

        if should_stop {
            return TreeNode::Leaf {
                value: majority_class(&y_subset),
                n_samples,
            };
        }

        if let Some((best_feature, best_threshold, best_gain)) =
            self.find_best_split(x, y, indices)
        {
            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, best_feature]] <= best_threshold);

            if left_indices.len() < self.min_samples_leaf
                || right_indices.len() < self.min_samples_leaf
            {
                return TreeNode::Leaf {
                    value: majority_class(&y_subset),
                    n_samples,
                };
            }

            importances[best_feature] += n_samples as f64 * best_gain;

            let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances));
            let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances));

            TreeNode::Split {
                feature_idx: best_feature,
                threshold: best_threshold,
                left,
                right,
                n_samples,
            }
        } else {
            TreeNode::Leaf {
                value: majority_class(&y_subset),
                n_samples,
            }
        }
    }

    /// Find the (feature, threshold) with the best Gini gain over the
    /// candidate feature set. The left/right class counts are maintained
    /// incrementally per threshold scan.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let all_features: Vec<usize> = (0..x.ncols()).collect();
        let candidates = self.feature_subset.as_deref().unwrap_or(&all_features);

        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = gini(&class_count_map(&y_subset), indices.len());

        let mut best: Option<(usize, f64, f64)> = None;

        for &feature_idx in candidates {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut left_counts: HashMap<i64, usize> = HashMap::new();
                let mut right_counts: HashMap<i64, usize> = HashMap::new();
                let mut left_n = 0usize;
                let mut right_n = 0usize;

                for &idx in indices {
                    let class = y[idx].round() as i64;
                    if x[[idx, feature_idx]] <= threshold {
                        left_n += 1;
                        *left_counts.entry(class).or_insert(0) += 1;
                    } else {
                        right_n += 1;
                        *right_counts.entry(class).or_insert(0) += 1;
                    }
                }

                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let n = indices.len() as f64;
                let weighted = (left_n as f64 * gini(&left_counts, left_n)
                    + right_n as f64 * gini(&right_counts, right_n))
                    / n;

                let gain = parent_impurity - weighted;
                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(FraudError::ModelNotFitted)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| predict_sample(root, &x.row(i).to_vec()))
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => node_depth(node),
        }
    }
}

fn predict_sample(node: &TreeNode, sample: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if sample[*feature_idx] <= *threshold {
                predict_sample(left, sample)
            } else {
                predict_sample(right, sample)
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn class_count_map(y: &[f64]) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &val in y {
        *counts.entry(val.round() as i64).or_insert(0) += 1;
    }
    counts
}

fn gini(counts: &HashMap<i64, usize>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let mut g = 1.0;
    for &c in counts.values() {
        let p = c as f64 / n;
        g -= p * p;
    }
    g
}

fn is_pure(y: &[f64]) -> bool {
    if y.is_empty() {
        return true;
    }
    let first = y[0];
    y.iter().all(|&v| (v - first).abs() < 1e-10)
}

fn majority_class(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    class_count_map(y)
        .into_iter()
        .max_by_key(|(class, count)| (*count, *class))
        .map(|(class, _)| class as f64)
        .unwrap_or(0.0)
}
