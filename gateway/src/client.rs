use log::warn;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;

use crate::config::GatewayConfig;
use crate::error::{CallError, GatewayError, Stage};

/// JSON client where every call gets its own allotment of `retries + 1`
/// attempts, a fixed delay apart.
pub struct UpstreamClient {
    http: Client,
    retries: usize,
    delay: Duration,
}

impl UpstreamClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            retries: config.retries,
            delay: config.retry_delay(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        stage: Stage,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        self.send_with_retry(stage, "GET", url, || self.http.get(url).query(query))
            .await
    }

    pub async fn post_json<B, T>(&self, stage: Stage, url: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_retry(stage, "POST", url, || self.http.post(url).json(body))
            .await
    }

    async fn send_with_retry<T, F>(
        &self,
        stage: Stage,
        method: &'static str,
        url: &str,
        request: F,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let strategy = FixedInterval::new(self.delay).take(self.retries);

        RetryIf::spawn(
            strategy,
            || {
                let req = request();
                async move {
                    let response = req.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(CallError::Status {
                            status: status.as_u16(),
                            body: response.text().await.unwrap_or_default(),
                        });
                    }
                    Ok(response.json::<T>().await?)
                }
            },
            |e: &CallError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{} {} {} attempt failed, retrying: {}", stage, method, url, e);
                }
                retry
            },
        )
        .await
        .map_err(|source| GatewayError::Upstream {
            stage,
            method,
            url: url.to_string(),
            source,
        })
    }
}
