//! Feed-forward binary classifier
//!
//! A compact multi-layer perceptron with ReLU hidden layers and a single
//! sigmoid output, trained on binary cross-entropy with momentum SGD.

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Network shape and optimizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNetworkConfig {
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub momentum: f64,
    /// L2 penalty on weights
    pub alpha: f64,
    pub random_state: Option<u64>,
}

impl Default for NeuralNetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![32, 16],
            learning_rate: 0.01,
            epochs: 50,
            batch_size: 32,
            momentum: 0.9,
            alpha: 1e-4,
            random_state: Some(42),
        }
    }
}

/// Multi-layer perceptron with a sigmoid output unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNetwork {
    config: NeuralNetworkConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    is_fitted: bool,
}

impl NeuralNetwork {
    pub fn new(config: NeuralNetworkConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            is_fitted: false,
        }
    }

    fn layer_sizes(&self, n_features: usize) -> Vec<usize> {
        let mut sizes = vec![n_features];
        sizes.extend_from_slice(&self.config.hidden_layers);
        sizes.push(1);
        sizes
    }

    fn init_parameters(&mut self, n_features: usize, rng: &mut Xoshiro256PlusPlus) {
        let sizes = self.layer_sizes(n_features);
        self.weights.clear();
        self.biases.clear();

        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            // Xavier uniform
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let w = Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit));
            self.weights.push(w);
            self.biases.push(Array1::zeros(fan_out));
        }
    }

    /// Forward pass, returning per-layer activations. The last entry holds
    /// the sigmoid output column.
    fn forward(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let n_layers = self.weights.len();
        let mut activations = Vec::with_capacity(n_layers + 1);
        activations.push(x.clone());

        for (layer, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = activations.last().unwrap().dot(w) + b;
            let a = if layer == n_layers - 1 {
                z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
            } else {
                z.mapv(|v| v.max(0.0))
            };
            activations.push(a);
        }

        activations
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

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.init_parameters(n_features, &mut rng);

        let mut velocity_w: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocity_b: Vec<Array1<f64>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.raw_dim()))
            .collect();

        let batch_size = self.config.batch_size.max(1).min(n_samples);
        let mut order: Vec<usize> = (0..n_samples).collect();

        for _epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);

            for batch in order.chunks(batch_size) {
                let x_batch = gather_rows(x, batch);
                let y_batch: Array1<f64> =
                    Array1::from_vec(batch.iter().map(|&i| y[i]).collect());

                self.backprop_step(&x_batch, &y_batch, &mut velocity_w, &mut velocity_b);
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    /// One momentum-SGD step over a mini-batch. The output delta for binary
    /// cross-entropy through a sigmoid is simply (p - y) / n.
    fn backprop_step(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        velocity_w: &mut [Array2<f64>],
        velocity_b: &mut [Array1<f64>],
    ) {
        let n = x.nrows() as f64;
        let activations = self.forward(x);
        let n_layers = self.weights.len();

        let output = &activations[n_layers];
        let y_col = y.view().insert_axis(Axis(1));
        let mut delta: Array2<f64> = (output - &y_col) / n;

        for layer in (0..n_layers).rev() {
            let a_prev = &activations[layer];
            let grad_w = a_prev.t().dot(&delta) + self.config.alpha * &self.weights[layer];
            let grad_b = delta.sum_axis(Axis(0));

            if layer > 0 {
                // ReLU derivative via the stored activation
                let relu_mask = activations[layer].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.weights[layer].t()) * &relu_mask;
            }

            let lr = self.config.learning_rate;
            let mu = self.config.momentum;

            velocity_w[layer] = mu * &velocity_w[layer] - lr * &grad_w;
            velocity_b[layer] = mu * &velocity_b[layer] - lr * &grad_b;

            self.weights[layer] = &self.weights[layer] + &velocity_w[layer];
            self.biases[layer] = &self.biases[layer] + &velocity_b[layer];
        }
    }

    /// Fraud probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(FraudError::ModelNotFitted);
        }
        let activations = self.forward(x);
        let output = activations.last().ok_or(FraudError::ModelNotFitted)?;
        Ok(output.column(0).to_owned())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}
