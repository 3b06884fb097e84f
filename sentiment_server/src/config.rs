use config::ConfigError;
use data_ingestion::config::load_layered;
use serde::Deserialize;
use std::time::Duration;

/// `SENTIMENT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_ttl_s")]
    pub ttl_s: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8016".to_string()
}

fn default_ttl_s() -> u64 {
    90
}

impl SentimentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_layered("SENTIMENT")
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_s)
    }
}
