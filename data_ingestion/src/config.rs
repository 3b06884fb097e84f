use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Builds a service configuration from, in increasing precedence:
/// in-code serde defaults, an optional TOML file named by `<PREFIX>_CONFIG`,
/// and `<PREFIX>_*` environment variables. A `.env` file is loaded first when present.
pub fn load_layered<T: DeserializeOwned>(prefix: &str) -> Result<T, ConfigError> {
    let _ = dotenvy::dotenv();

    let mut builder = Config::builder();
    if let Ok(path) = std::env::var(format!("{prefix}_CONFIG")) {
        builder = builder.add_source(File::new(&path, FileFormat::Toml));
    }

    let cfg = builder
        .add_source(Environment::with_prefix(prefix).try_parsing(true))
        .build()?;

    cfg.try_deserialize()
}

/// Credentials and endpoints of the market-data collaborators.
///
/// Tokens are read from the unprefixed `FINNHUB_TOKEN` / `TIINGO_TOKEN` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub finnhub_token: Option<String>,
    #[serde(default)]
    pub tiingo_token: Option<String>,
    #[serde(default = "default_finnhub_url")]
    pub finnhub_base_url: String,
    #[serde(default = "default_tiingo_url")]
    pub tiingo_base_url: String,
    #[serde(default = "default_yahoo_url")]
    pub yahoo_rss_url: String,
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_s: u64,
}

fn default_finnhub_url() -> String {
    "https://finnhub.io/api/v1".to_string()
}

fn default_tiingo_url() -> String {
    "https://api.tiingo.com/iex".to_string()
}

fn default_yahoo_url() -> String {
    "https://finance.yahoo.com/rss/headline".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let cfg = Config::builder()
            .add_source(Environment::default().try_parsing(false))
            .build()?;

        cfg.try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_s)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            finnhub_token: None,
            tiingo_token: None,
            finnhub_base_url: default_finnhub_url(),
            tiingo_base_url: default_tiingo_url(),
            yahoo_rss_url: default_yahoo_url(),
            provider_timeout_s: default_provider_timeout(),
        }
    }
}
