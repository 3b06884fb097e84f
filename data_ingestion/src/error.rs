use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataIngestionError {
    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("RSS parse error: {0}")]
    RssError(#[from] rss::Error),

    #[error("{provider} token not set")]
    MissingToken { provider: &'static str },

    #[error("{provider} returned {status}: {detail}")]
    UpstreamStatus {
        provider: &'static str,
        status: u16,
        detail: String,
    },

    #[error("Unexpected {provider} payload: {detail}")]
    UnexpectedPayload {
        provider: &'static str,
        detail: String,
    },

    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),
}
