//! Standardization of the feature matrix
//!
//! The scaler is fitted on the training partition only and stored inside each
//! model artifact, so inference reproduces the exact training-time scaling.

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization: (x - mean) / std
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: None,
            scale: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Fit column means and standard deviations
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(FraudError::DataError(
                "cannot fit scaler on empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| FraudError::DataError("failed to compute column means".to_string()))?;

        let n = x.nrows() as f64;
        let mut scale = Array1::zeros(x.ncols());
        for j in 0..x.ncols() {
            let var = x
                .column(j)
                .iter()
                .map(|&v| (v - mean[j]).powi(2))
                .sum::<f64>()
                / n;
            let std = var.sqrt();
            // Zero-variance columns pass through unscaled
            scale[j] = if std > 1e-12 { std } else { 1.0 };
        }

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    /// Apply the fitted scaling to a matrix
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.params()?;
        if x.ncols() != mean.len() {
            return Err(FraudError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for j in 0..out.ncols() {
            let m = mean[j];
            let s = scale[j];
            out.column_mut(j).mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }

    /// Apply the fitted scaling to a single row
    pub fn transform_row(&self, row: &Array1<f64>) -> Result<Array1<f64>> {
        let (mean, scale) = self.params()?;
        if row.len() != mean.len() {
            return Err(FraudError::ShapeError {
                expected: format!("{} features", mean.len()),
                actual: format!("{} features", row.len()),
            });
        }
        Ok(Array1::from_shape_fn(row.len(), |j| {
            (row[j] - mean[j]) / scale[j]
        }))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn params(&self) -> Result<(&Array1<f64>, &Array1<f64>)> {
        match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => Ok((m, s)),
            _ => Err(FraudError::ModelNotFitted),
        }
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_zero_mean_unit_std() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for j in 0..2 {
            let col = scaled.column(j);
            let mean: f64 = col.iter().sum::<f64>() / col.len() as f64;
            let var: f64 = col.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-10);
            assert!((var - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_zero_variance_column_passthrough() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        // Constant column shifts to zero without dividing by zero
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_transform_row_matches_matrix() {
        let x = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        let row = scaler.transform_row(&array![3.0, 6.0]).unwrap();
        assert!((row[0] - scaled[[1, 0]]).abs() < 1e-12);
        assert!((row[1] - scaled[[1, 1]]).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let scaler = StandardScaler::new();
        let x = array![[1.0, 2.0]];
        assert!(matches!(
            scaler.transform(&x),
            Err(FraudError::ModelNotFitted)
        ));
    }
}
