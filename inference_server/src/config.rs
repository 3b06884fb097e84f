use config::ConfigError;
use data_ingestion::config::load_layered;
use serde::Deserialize;

/// `RECOMMENDER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommenderConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// `.json` bundles are read as JSON, anything else as bincode.
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8014".to_string()
}

fn default_model_path() -> String {
    "model/bundle.json".to_string()
}

impl RecommenderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_layered("RECOMMENDER")
    }
}
