use chrono::{DateTime, Utc};
use data_ingestion::timestamp::{iso_seconds, parse_timestamp};
use data_ingestion::{Headline, Quote, normalize_ticker};
use feature_processing::aggregator::FeaturePayload;
use feature_processing::explain::{MAX_ONE_LINER_CHARS, OneLiner, OneLinerRequest};
use feature_processing::misc::FeatureVector;
use inference_server::engine::Recommendation;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::client::UpstreamClient;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Stage};

/// Body of `GET /api/run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub ticker: String,
    /// As reported by the context service.
    pub features: FeatureVector,
    /// As sent to the recommender.
    pub features_used: FeatureVector,
    pub recommendation: Recommendation,
    pub one_liner: OneLiner,
    pub quote: Quote,
    pub ts_ctx: Option<String>,
    pub ts_gateway: String,
    pub cache_age_seconds: Option<i64>,
    /// Present when the features are synthetic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_headline: Option<Headline>,
}

/// Used when the explanation call fails.
pub fn fallback_one_liner(rec: &Recommendation) -> OneLiner {
    let pct = (rec.confidence * 100.0) as i64;
    let text = format!("{} · {}% confidence", rec.class_name, pct);
    OneLiner {
        text: text.chars().take(MAX_ONE_LINER_CHARS).collect(),
    }
}

/// Seconds between `now` and the context timestamp, `None` if unparsable.
pub fn cache_age_seconds(ts_ctx: &str, now: DateTime<Utc>) -> Option<i64> {
    parse_timestamp(ts_ctx).map(|t| (now - t).num_seconds())
}

/// Runs `FETCH_FEATURES -> INFER -> EXPLAIN -> RESPOND` against the context
/// and recommender services.
pub struct Gateway {
    client: UpstreamClient,
    ctx_url: String,
    rec_url: String,
}

impl Gateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: UpstreamClient::new(config)?,
            ctx_url: config.ctx_url.trim_end_matches('/').to_string(),
            rec_url: config.rec_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn ctx_url(&self) -> &str {
        &self.ctx_url
    }

    pub fn rec_url(&self) -> &str {
        &self.rec_url
    }

    pub async fn run(&self, ticker: &str) -> Result<RunResponse, GatewayError> {
        let ticker = normalize_ticker(ticker)
            .ok_or_else(|| GatewayError::InvalidInput("ticker is required".to_string()))?;

        info!("[{}] {}", Stage::FetchFeatures, ticker);
        let ctx: FeaturePayload = self
            .client
            .get_json(
                Stage::FetchFeatures,
                &format!("{}/api/features", self.ctx_url),
                &[("ticker", ticker.as_str())],
            )
            .await?;
        if let Some(note) = &ctx.error {
            warn!("Context served synthetic features for {}: {}", ticker, note);
        }

        info!("[{}] {}", Stage::Infer, ticker);
        let features_used = ctx.features.for_inference();
        let recommendation: Recommendation = self
            .client
            .post_json(
                Stage::Infer,
                &format!("{}/api/recommend", self.rec_url),
                &features_used,
            )
            .await?;

        info!("[{}] {}", Stage::Explain, ticker);
        let headline = ctx.top_headline.clone();
        let explain_req = OneLinerRequest {
            class_name: recommendation.class_name.clone(),
            confidence: recommendation.confidence,
            title: headline.as_ref().map(|h| h.title.clone()).unwrap_or_default(),
            publisher: headline.as_ref().map(|h| h.publisher.clone()).unwrap_or_default(),
            url: headline.as_ref().map(|h| h.url.clone()).unwrap_or_default(),
        };
        let one_liner = match self
            .client
            .post_json::<_, OneLiner>(
                Stage::Explain,
                &format!("{}/api/one_liner", self.ctx_url),
                &explain_req,
            )
            .await
        {
            Ok(line) => line,
            Err(e) => {
                warn!("Explanation unavailable, using template: {}", e);
                fallback_one_liner(&recommendation)
            }
        };

        info!("[{}] {} -> {}", Stage::Respond, ticker, recommendation.class_name);
        let now = Utc::now();
        Ok(RunResponse {
            features: ctx.features,
            features_used,
            recommendation,
            one_liner,
            quote: ctx.quote,
            cache_age_seconds: cache_age_seconds(&ctx.ts, now),
            ts_ctx: Some(ctx.ts),
            ts_gateway: iso_seconds(now),
            features_note: ctx.error,
            top_headline: ctx.top_headline,
            ticker,
        })
    }
}
