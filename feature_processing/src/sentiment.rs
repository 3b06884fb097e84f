use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FeatureError;

/// Black-box scorer: one signed score in [-1, 1] per text, in input order.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, texts: &[String]) -> Result<Vec<f64>, FeatureError>;
}

#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    samples: Vec<f64>,
}

/// Client of the sentiment service's `POST /api/sentiment`.
pub struct SentimentClient {
    http: Client,
    base_url: String,
}

impl SentimentClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeatureError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SentimentScorer for SentimentClient {
    async fn score(&self, texts: &[String]) -> Result<Vec<f64>, FeatureError> {
        let resp: SentimentResponse = self
            .http
            .post(format!("{}/api/sentiment", self.base_url))
            .json(&SentimentRequest { texts })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.samples)
    }
}

/// Population mean and standard deviation; `(0, 0)` for no samples.
pub fn mean_std(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_statistics() {
        assert_eq!(mean_std(&[]), (0.0, 0.0));
        assert_eq!(mean_std(&[0.5]), (0.5, 0.0));
        let (mean, std) = mean_std(&[1.0, -1.0, 1.0, -1.0]);
        assert_eq!(mean, 0.0);
        assert_eq!(std, 1.0);
    }
}
