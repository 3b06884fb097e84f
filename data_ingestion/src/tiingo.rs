use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::cache::Memoizer;
use crate::config::ProviderConfig;
use crate::error::DataIngestionError;
use crate::fetcher::{Candle, MarketData, Quote, normalize_ticker, validate_candle};
use crate::timestamp::parse_timestamp;

const PROVIDER: &str = "tiingo";
const QUOTE_TTL: Duration = Duration::from_secs(2);
const CANDLE_TTL: Duration = Duration::from_secs(60);
const LOOKBACK_MINUTES: i64 = 120;
/// Fewer recent bars than this (closed market) falls back to the tail of the session.
const MIN_RECENT_BARS: usize = 6;

/// Tiingo IEX minute bars and top-of-book quotes.
pub struct TiingoClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    quotes: Memoizer<str, String, Quote>,
    candles: Memoizer<str, String, Vec<Candle>>,
}

/// First of `keys` holding a number (or numeric string).
fn number(row: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match row.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn parse_bar(row: &Value) -> Option<Candle> {
    let ts = row.get("date").and_then(Value::as_str).and_then(parse_timestamp)?;
    Some(Candle {
        ts,
        open: number(row, &["open"]).unwrap_or(0.0),
        high: number(row, &["high"]).unwrap_or(0.0),
        low: number(row, &["low"]).unwrap_or(0.0),
        close: number(row, &["close"]).unwrap_or(0.0),
        volume: number(row, &["volume"]).map(|v| v.max(0.0) as u64).unwrap_or(0),
    })
}

/// Keeps bars inside the lookback window; when the market is closed that
/// leaves too few, so the last `max(60, lookback)` bars are used instead.
fn select_recent(bars: Vec<Candle>, now: chrono::DateTime<Utc>) -> Vec<Candle> {
    let cutoff = now - ChronoDuration::minutes(LOOKBACK_MINUTES + 5);
    let recent: Vec<Candle> = bars.iter().filter(|c| c.ts >= cutoff).cloned().collect();
    if recent.len() >= MIN_RECENT_BARS {
        return recent;
    }

    let keep = LOOKBACK_MINUTES.max(60) as usize;
    let start = bars.len().saturating_sub(keep);
    debug!("Only {} recent bars, falling back to last {}", recent.len(), bars.len() - start);
    bars[start..].to_vec()
}

impl TiingoClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, DataIngestionError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.tiingo_base_url.trim_end_matches('/').to_string(),
            token: config.tiingo_token.clone(),
            quotes: Memoizer::new("tiingo quote", QUOTE_TTL, |t: &str| t.to_string()),
            candles: Memoizer::new("tiingo candles", CANDLE_TTL, |t: &str| t.to_string()),
        })
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, DataIngestionError> {
        let token = self
            .token
            .as_deref()
            .ok_or(DataIngestionError::MissingToken { provider: PROVIDER })?;

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(params)
            .query(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DataIngestionError::UpstreamStatus {
                provider: PROVIDER,
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response.json::<Value>().await?)
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, DataIngestionError> {
        let data = self.get_json(&format!("/{ticker}"), &[]).await?;
        let row = match &data {
            Value::Array(rows) => rows.first().cloned().unwrap_or(Value::Null),
            Value::Object(_) => data.clone(),
            _ => Value::Null,
        };

        Ok(Quote {
            last: number(&row, &["last", "close", "tngoLast"]),
            bid: number(&row, &["bidPrice", "bid"]),
            ask: number(&row, &["askPrice", "ask"]),
            volume: number(&row, &["volume"]).map(|v| v.max(0.0) as u64),
            ts: ["timestamp", "date"]
                .iter()
                .find_map(|k| row.get(*k).and_then(Value::as_str))
                .and_then(parse_timestamp),
        })
    }

    async fn fetch_candles(&self, ticker: &str) -> Result<Vec<Candle>, DataIngestionError> {
        let now = Utc::now();
        let start_date = (now - ChronoDuration::days(1)).date_naive();
        let data = self
            .get_json(
                &format!("/{ticker}/prices"),
                &[
                    ("startDate", start_date.to_string()),
                    ("resampleFreq", "1min".to_string()),
                    ("columns", "open,high,low,close,volume,date".to_string()),
                ],
            )
            .await?;

        let Value::Array(rows) = data else {
            return Err(DataIngestionError::UnexpectedPayload {
                provider: PROVIDER,
                detail: "price history is not a list".to_string(),
            });
        };

        let mut bars: Vec<Candle> = rows.iter().filter_map(parse_bar).filter(validate_candle).collect();
        bars.sort_by_key(|c| c.ts);

        let bars = select_recent(bars, now);
        info!("Fetched {} Tiingo bars for {}", bars.len(), ticker);
        Ok(bars)
    }
}

#[async_trait]
impl MarketData for TiingoClient {
    async fn candles(&self, ticker: &str) -> Result<Vec<Candle>, DataIngestionError> {
        let t = normalize_ticker(ticker).ok_or_else(|| DataIngestionError::InvalidTicker(ticker.to_string()))?;
        self.candles
            .get_or_try_fetch(t.as_str(), || self.fetch_candles(&t))
            .await
    }

    async fn quote(&self, ticker: &str) -> Result<Quote, DataIngestionError> {
        let t = normalize_ticker(ticker).ok_or_else(|| DataIngestionError::InvalidTicker(ticker.to_string()))?;
        self.quotes
            .get_or_try_fetch(t.as_str(), || self.fetch_quote(&t))
            .await
    }
}
