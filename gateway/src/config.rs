use config::ConfigError;
use data_ingestion::config::load_layered;
use serde::Deserialize;
use std::time::Duration;

/// `GATEWAY_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Context service (features and one-liners).
    #[serde(default = "default_ctx_url")]
    pub ctx_url: String,
    /// Recommender service.
    #[serde(default = "default_rec_url")]
    pub rec_url: String,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    /// Extra attempts after the first, per outbound call.
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8010".to_string()
}

fn default_ctx_url() -> String {
    "http://127.0.0.1:8012".to_string()
}

fn default_rec_url() -> String {
    "http://127.0.0.1:8014".to_string()
}

fn default_timeout_s() -> u64 {
    8
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    250
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_layered("GATEWAY")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ctx_url: default_ctx_url(),
            rec_url: default_rec_url(),
            timeout_s: default_timeout_s(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}
