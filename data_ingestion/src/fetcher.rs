use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::DataIngestionError;

/// One OHLCV bar. Series are chronological and never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A news headline candidate. Identity for de-duplication is `(title, url)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub publisher: String,
    #[serde(rename = "ts", default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub url: String,
}

/// Latest price snapshot. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub last: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
}

impl Quote {
    /// Bid/ask spread in basis points of the mid price, when both sides are quoted.
    pub fn spread_bps(&self) -> Option<f64> {
        let (bid, ask) = (self.bid?, self.ask?);
        if bid <= 0.0 || ask <= 0.0 || ask < bid {
            return None;
        }
        let mid = (bid + ask) / 2.0;
        Some((ask - bid) / mid * 10_000.0)
    }
}

/// Uppercase, trimmed ticker; `None` for blank input.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_uppercase())
    }
}

pub fn validate_candle(data: &Candle) -> bool {
    let mut is_valid = true;
    for (name, value) in [
        ("open", data.open),
        ("high", data.high),
        ("low", data.low),
        ("close", data.close),
    ] {
        if !value.is_finite() || value < 0.0 {
            warn!("{} must be a non-negative number, got {}", name, value);
            is_valid = false;
        }
    }

    if data.high < data.low {
        warn!("High {} below low {}", data.high, data.low);
        is_valid = false;
    }

    is_valid
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Recent intraday bars, oldest first.
    async fn candles(&self, ticker: &str) -> Result<Vec<Candle>, DataIngestionError>;

    async fn quote(&self, ticker: &str) -> Result<Quote, DataIngestionError>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn headlines(&self, ticker: &str) -> Result<Vec<Headline>, DataIngestionError>;
}

#[async_trait]
pub trait EarningsCalendar: Send + Sync {
    /// Next scheduled earnings release, if the calendar knows one.
    async fn next_earnings(&self, ticker: &str) -> Result<Option<DateTime<Utc>>, DataIngestionError>;
}
