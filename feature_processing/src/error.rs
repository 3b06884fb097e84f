use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use data_ingestion::DataIngestionError;
use serde_json::json;
use thiserror::Error;

use crate::indicators::IndicatorError;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("upstream unavailable: {0}")]
    Upstream(#[from] DataIngestionError),

    #[error("sentiment service unavailable: {0}")]
    Sentiment(#[from] reqwest::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl IntoResponse for FeatureError {
    fn into_response(self) -> Response {
        // Build failures become stub payloads in the aggregator; only input errors reach here.
        let status = match &self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Indicator(_) | Self::Upstream(_) | Self::Sentiment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
