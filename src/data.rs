//! Transaction dataset loading, feature extraction, and splitting
//!
//! The dataset has a fixed schema: a `Time` offset, 28 anonymized PCA
//! components `V1`..`V28`, a transaction `Amount`, and a binary `Class`
//! label (1 = fraud). The CSV is loaded into memory once and the resulting
//! handle is shared for the lifetime of the process.

use crate::error::{FraudError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Label column name
pub const LABEL_COLUMN: &str = "Class";

/// Number of feature columns
pub const N_FEATURES: usize = 30;

/// Ordered feature column names: Time, V1..V28, Amount
pub fn feature_columns() -> Vec<String> {
    let mut cols = Vec::with_capacity(N_FEATURES);
    cols.push("Time".to_string());
    for i in 1..=28 {
        cols.push(format!("V{}", i));
    }
    cols.push("Amount".to_string());
    cols
}

/// Summary statistics for a loaded dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub total_rows: usize,
    pub fraud_count: usize,
    pub legitimate_count: usize,
    pub fraud_percentage: f64,
    pub n_features: usize,
    pub memory_bytes: usize,
}

/// A labeled transaction table, loaded once and kept in memory
#[derive(Debug, Clone)]
pub struct FraudDataset {
    df: DataFrame,
    path: Option<PathBuf>,
}

impl FraudDataset {
    /// Load the dataset from a CSV file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let ds = Self {
            df,
            path: Some(path.to_path_buf()),
        };
        ds.validate()?;
        Ok(ds)
    }

    /// Wrap an already-parsed frame (used by training on uploaded data and tests)
    pub fn from_frame(df: DataFrame) -> Result<Self> {
        let ds = Self { df, path: None };
        ds.validate()?;
        Ok(ds)
    }

    fn validate(&self) -> Result<()> {
        if self.df.height() == 0 {
            return Err(FraudError::DataError("dataset is empty".to_string()));
        }
        check_columns(&self.df, true)?;
        Ok(())
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Row count, class balance, and size of the loaded table
    pub fn summary(&self) -> Result<DatasetSummary> {
        let labels = column_as_f64(&self.df, LABEL_COLUMN)?;
        let total_rows = labels.len();
        let fraud_count = labels.iter().filter(|&&v| v > 0.5).count();

        Ok(DatasetSummary {
            total_rows,
            fraud_count,
            legitimate_count: total_rows - fraud_count,
            fraud_percentage: if total_rows > 0 {
                fraud_count as f64 / total_rows as f64 * 100.0
            } else {
                0.0
            },
            n_features: N_FEATURES,
            memory_bytes: self.df.estimated_size(),
        })
    }
}

/// Parse a CSV payload (uploaded bytes) into a DataFrame
pub fn read_csv_bytes(data: &[u8]) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(data))
        .finish()?;
    Ok(df)
}

fn check_columns(df: &DataFrame, require_label: bool) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut missing: Vec<String> = feature_columns()
        .into_iter()
        .filter(|c| !present.contains(c))
        .collect();
    if require_label && !present.contains(&LABEL_COLUMN.to_string()) {
        missing.push(LABEL_COLUMN.to_string());
    }

    if !missing.is_empty() {
        let msg = format!("missing required columns: {}", missing.join(", "));
        // Labeled training tables are a dataset problem; unlabeled batch
        // rows are a request-schema problem.
        return Err(if require_label {
            FraudError::DataError(msg)
        } else {
            FraudError::SchemaError(msg)
        });
    }
    Ok(())
}

fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let ca = series.f64()?;

    let mut values = Vec::with_capacity(ca.len());
    for (i, v) in ca.into_iter().enumerate() {
        match v {
            Some(v) if v.is_finite() => values.push(v),
            Some(_) => {
                return Err(FraudError::DataError(format!(
                    "non-finite value in column {} at row {}",
                    name, i
                )))
            }
            None => {
                return Err(FraudError::DataError(format!(
                    "null value in column {} at row {}",
                    name, i
                )))
            }
        }
    }
    Ok(values)
}

/// Extract the labeled feature matrix: row-major features plus integer labels
pub fn feature_matrix(df: &DataFrame) -> Result<(Array2<f64>, Array1<i64>)> {
    if df.height() == 0 {
        return Err(FraudError::DataError("dataset is empty".to_string()));
    }
    check_columns(df, true)?;

    let x = build_matrix(df)?;
    let labels = column_as_f64(df, LABEL_COLUMN)?;
    let y = Array1::from_vec(labels.iter().map(|&v| if v > 0.5 { 1i64 } else { 0i64 }).collect());

    Ok((x, y))
}

/// Extract an unlabeled feature matrix (batch prediction input)
pub fn batch_feature_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    if df.height() == 0 {
        return Err(FraudError::DataError("no rows in batch".to_string()));
    }
    check_columns(df, false)?;
    build_matrix(df)
}

fn build_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut x = Array2::zeros((n_rows, N_FEATURES));
    for (j, name) in feature_columns().iter().enumerate() {
        let values = column_as_f64(df, name)?;
        for (i, &v) in values.iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

/// A stratified train/test partition
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Array2<f64>,
    pub y_train: Array1<i64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<i64>,
}

/// Split features and labels preserving the per-class ratio in both parts.
/// The shuffle within each class is seeded, so a fixed seed gives a fixed split.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<i64>,
    test_fraction: f64,
    seed: u64,
) -> Result<SplitData> {
    if x.nrows() != y.len() {
        return Err(FraudError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(FraudError::DataError(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut by_class: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }
    if by_class.len() < 2 {
        return Err(FraudError::DataError(
            "need both classes present to split".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    // Deterministic class order
    let mut classes: Vec<i64> = by_class.keys().copied().collect();
    classes.sort_unstable();

    for class in classes {
        let mut indices = by_class.remove(&class).unwrap_or_default();
        if indices.len() < 2 {
            return Err(FraudError::DataError(format!(
                "class {} has too few samples to split",
                class
            )));
        }
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64 * test_fraction).round() as usize)
            .clamp(1, indices.len() - 1);
        test_indices.extend_from_slice(&indices[..n_test]);
        train_indices.extend_from_slice(&indices[n_test..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok(SplitData {
        x_train: x.select(ndarray::Axis(0), &train_indices),
        y_train: Array1::from_vec(train_indices.iter().map(|&i| y[i]).collect()),
        x_test: x.select(ndarray::Axis(0), &test_indices),
        y_test: Array1::from_vec(test_indices.iter().map(|&i| y[i]).collect()),
    })
}
