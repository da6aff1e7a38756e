//! Error types for the server

use crate::error::FraudError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FraudError> for ServerError {
    fn from(err: FraudError) -> Self {
        match err {
            FraudError::UnknownModel(name) => {
                Self::NotFound(format!("unknown or untrained model: {}", name))
            }
            FraudError::SchemaError(_) | FraudError::DataError(_) | FraudError::ShapeError { .. } => {
                Self::BadRequest(err.to_string())
            }
            FraudError::ModelNotFitted => Self::NotFound("no trained model available".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
