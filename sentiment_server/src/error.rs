use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("texts required")]
    EmptyInput,
}

impl IntoResponse for SentimentError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::EmptyInput => StatusCode::BAD_REQUEST,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
