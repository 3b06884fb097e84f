use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("failed to read model bundle: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode JSON model bundle: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decode binary model bundle: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("invalid model bundle: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("invalid feature {0}")]
    InvalidFeature(String),

    #[error("model evaluation failed: {0}")]
    Evaluation(String),
}

impl IntoResponse for InferenceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Evaluation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
