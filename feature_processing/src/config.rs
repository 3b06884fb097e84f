use config::ConfigError;
use data_ingestion::config::load_layered;
use serde::Deserialize;
use std::time::Duration;

use crate::headlines::DEFAULT_LIMIT;

/// Context service settings, `CONTEXT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Per-ticker feature cache TTL.
    #[serde(default = "default_ttl_s")]
    pub ttl_s: u64,
    #[serde(default = "default_headline_limit")]
    pub headline_limit: usize,
    #[serde(default = "default_sentiment_url")]
    pub sentiment_url: String,
    #[serde(default = "default_sentiment_timeout_s")]
    pub sentiment_timeout_s: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8012".to_string()
}

fn default_ttl_s() -> u64 {
    45
}

fn default_headline_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_sentiment_url() -> String {
    "http://127.0.0.1:8016".to_string()
}

fn default_sentiment_timeout_s() -> u64 {
    5
}

impl ContextConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_layered("CONTEXT")
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_s)
    }

    pub fn sentiment_timeout(&self) -> Duration {
        Duration::from_secs(self.sentiment_timeout_s)
    }
}
