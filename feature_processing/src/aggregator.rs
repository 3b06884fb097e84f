use chrono::{DateTime, Utc};
use data_ingestion::timestamp::iso_seconds;
use data_ingestion::{
    Candle, EarningsCalendar, Headline, MarketData, NewsSource, Quote, TtlCache, normalize_ticker,
};
use futures_util::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::FeatureError;
use crate::headlines::merge_rank;
use crate::indicators::price_signals;
use crate::misc::{FeatureVector, NO_NEWS_SENTINEL, RV20_MAX, RV20_MIN};
use crate::sentiment::{SentimentScorer, mean_std};

pub const DEFAULT_TTL: Duration = Duration::from_secs(45);
pub const EARNINGS_WINDOW_DAYS: i64 = 14;
pub const MAX_SPREAD_BPS: f64 = 8.0;
pub const MIN_VOLUME: u64 = 100_000;

/// Attached to payloads served from the per-ticker cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub age_s: i64,
    pub ttl_s: u64,
    pub hit: bool,
}

/// Body of `GET /api/features`.
///
/// `error` is set only when `features` is the synthetic stub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePayload {
    pub features: FeatureVector,
    pub ticker: String,
    pub ts: String,
    #[serde(default)]
    pub top_headline: Option<Headline>,
    #[serde(default)]
    pub headlines: Vec<Headline>,
    #[serde(default)]
    pub quote: Quote,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "_cache", default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheMeta>,
}

impl FeaturePayload {
    pub fn is_synthetic(&self) -> bool {
        self.error.is_some()
    }

    fn degraded(ticker: &str, now: DateTime<Utc>, reason: String) -> Self {
        Self {
            features: FeatureVector::stub(),
            ticker: ticker.to_string(),
            ts: iso_seconds(now),
            top_headline: None,
            headlines: Vec::new(),
            quote: Quote::default(),
            error: Some(reason),
            cache: None,
        }
    }
}

/// Minutes since the newest timestamp, or the no-news sentinel.
pub fn mins_since_news<I>(timestamps: I, now: DateTime<Utc>) -> u32
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    match timestamps.into_iter().max() {
        Some(latest) => (now - latest).num_minutes().clamp(0, i64::from(u32::MAX)) as u32,
        None => NO_NEWS_SENTINEL,
    }
}

/// Earnings within 0..=14 calendar days of `now`.
pub fn earnings_soon(next_earnings: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    next_earnings.is_some_and(|d| {
        let days = (d.date_naive() - now.date_naive()).num_days();
        (0..=EARNINGS_WINDOW_DAYS).contains(&days)
    })
}

/// Unknown spread or volume counts as liquid.
pub fn liquidity_flag(spread_bps: Option<f64>, volume: Option<u64>) -> bool {
    match (spread_bps, volume) {
        (Some(spread), Some(volume)) => spread <= MAX_SPREAD_BPS && volume >= MIN_VOLUME,
        _ => true,
    }
}

pub fn clamp_rv20(rv: f64) -> f64 {
    if rv.is_nan() {
        return RV20_MIN;
    }
    rv.clamp(RV20_MIN, RV20_MAX)
}

fn session_volume(quote: &Quote, candles: &[Candle]) -> Option<u64> {
    quote
        .volume
        .or_else(|| (!candles.is_empty()).then(|| candles.iter().map(|c| c.volume).sum()))
}

/// Builds feature payloads from the market, news, earnings and sentiment
/// collaborators, behind a per-ticker TTL cache.
pub struct FeatureAggregator {
    market: Arc<dyn MarketData>,
    news: Vec<Arc<dyn NewsSource>>,
    earnings: Arc<dyn EarningsCalendar>,
    sentiment: Arc<dyn SentimentScorer>,
    cache: TtlCache<String, FeaturePayload>,
    headline_limit: usize,
}

impl FeatureAggregator {
    pub fn new(
        market: Arc<dyn MarketData>,
        news: Vec<Arc<dyn NewsSource>>,
        earnings: Arc<dyn EarningsCalendar>,
        sentiment: Arc<dyn SentimentScorer>,
        ttl: Duration,
        headline_limit: usize,
    ) -> Self {
        Self {
            market,
            news,
            earnings,
            sentiment,
            cache: TtlCache::new(ttl),
            headline_limit,
        }
    }

    pub async fn aggregate(&self, ticker: &str) -> Result<FeaturePayload, FeatureError> {
        self.aggregate_at(ticker, Utc::now()).await
    }

    /// Only a blank ticker is an error. Any collaborator or indicator failure
    /// yields the stub vector with `error` set; such payloads are not cached.
    pub async fn aggregate_at(&self, ticker: &str, now: DateTime<Utc>) -> Result<FeaturePayload, FeatureError> {
        let ticker = normalize_ticker(ticker)
            .ok_or_else(|| FeatureError::InvalidInput("ticker is required".to_string()))?;

        if let Some(hit) = self.cache.get(&ticker, now) {
            debug!("Feature cache hit for {} (age {}s)", ticker, hit.age.num_seconds());
            let mut payload = hit.value;
            payload.cache = Some(CacheMeta {
                age_s: hit.age.num_seconds(),
                ttl_s: hit.ttl.as_secs(),
                hit: true,
            });
            return Ok(payload);
        }

        match self.build(&ticker, now).await {
            Ok(payload) => {
                info!(
                    "✅ Features for {}: {} headlines, rv20 {:.4}",
                    ticker,
                    payload.headlines.len(),
                    payload.features.rv20
                );
                self.cache.put(ticker, payload.clone(), now);
                Ok(payload)
            }
            Err(e) => {
                warn!("Serving stub features for {}: {}", ticker, e);
                Ok(FeaturePayload::degraded(&ticker, now, e.to_string()))
            }
        }
    }

    async fn fetch_news(&self, ticker: &str) -> Vec<Vec<Headline>> {
        join_all(self.news.iter().map(|source| async move {
            source.headlines(ticker).await.unwrap_or_else(|e| {
                warn!("{} headlines unavailable for {}: {}", source.name(), ticker, e);
                Vec::new()
            })
        }))
        .await
    }

    async fn build(&self, ticker: &str, now: DateTime<Utc>) -> Result<FeaturePayload, FeatureError> {
        let (candles, quote, earnings, sources) = tokio::join!(
            self.market.candles(ticker),
            self.market.quote(ticker),
            self.earnings.next_earnings(ticker),
            self.fetch_news(ticker),
        );

        let candles = candles?;
        let signals = price_signals(&candles)?;

        let quote = quote.unwrap_or_else(|e| {
            warn!("Quote unavailable for {}: {}", ticker, e);
            Quote::default()
        });
        let next_earnings = earnings.unwrap_or_else(|e| {
            warn!("Earnings date unavailable for {}: {}", ticker, e);
            None
        });

        let ranked = merge_rank(ticker, &sources, self.headline_limit);
        let (sent_mean, sent_std) = if ranked.is_empty() {
            (0.0, 0.0)
        } else {
            let titles: Vec<String> = ranked.iter().map(|h| h.title.clone()).collect();
            mean_std(&self.sentiment.score(&titles).await?)
        };

        let features = FeatureVector {
            sent_mean,
            sent_std,
            r_1m: signals.r_1m,
            r_5m: signals.r_5m,
            above_sma20: signals.above_sma20,
            mins_since_news: mins_since_news(sources.iter().flatten().filter_map(|h| h.timestamp), now),
            rv20: clamp_rv20(signals.rv20),
            earnings_soon: earnings_soon(next_earnings, now),
            liquidity_flag: liquidity_flag(quote.spread_bps(), session_volume(&quote, &candles)),
        };

        Ok(FeaturePayload {
            features,
            ticker: ticker.to_string(),
            ts: iso_seconds(now),
            top_headline: ranked.first().cloned(),
            headlines: ranked,
            quote,
            error: None,
            cache: None,
        })
    }
}
