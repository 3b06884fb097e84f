use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Steps of one `run`, in order. There are no backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchFeatures,
    Infer,
    Explain,
    Respond,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::FetchFeatures => "FETCH_FEATURES",
            Stage::Infer => "INFER",
            Stage::Explain => "EXPLAIN",
            Stage::Respond => "RESPOND",
        })
    }
}

/// Failure of a single attempt of an outbound call.
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
}

impl CallError {
    /// Client errors are answered the same way on replay.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Status { status, .. } => !(400..500).contains(status),
            CallError::Http(e) => e.status().is_none_or(|s| !s.is_client_error()),
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{stage}: {method} {url} failed: {source}")]
    Upstream {
        stage: Stage,
        method: &'static str,
        url: String,
        #[source]
        source: CallError,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GatewayError::Upstream { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.to_string(),
            "stage": self.stage().map(|s| s.to_string()),
        });
        (status, axum::Json(body)).into_response()
    }
}
