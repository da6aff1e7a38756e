//! Error types for the fraud detection engine

use thiserror::Error;

/// Result type alias for fraud detection operations
pub type Result<T> = std::result::Result<T, FraudError>;

/// Main error type for the fraud detection engine
#[derive(Error, Debug)]
pub enum FraudError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for FraudError {
    fn from(err: polars::error::PolarsError) -> Self {
        FraudError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FraudError {
    fn from(err: serde_json::Error) -> Self {
        FraudError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FraudError {
    fn from(err: ndarray::ShapeError) -> Self {
        FraudError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
