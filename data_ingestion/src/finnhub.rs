use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::cache::Memoizer;
use crate::config::ProviderConfig;
use crate::error::DataIngestionError;
use crate::fetcher::{EarningsCalendar, Headline, NewsSource, normalize_ticker};
use crate::timestamp::from_epoch;

const PROVIDER: &str = "finnhub";
const NEWS_TTL: Duration = Duration::from_secs(90);
const EARNINGS_TTL: Duration = Duration::from_secs(3600);
const NEWS_LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct CompanyNews {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    datetime: i64,
}

#[derive(Debug, Deserialize)]
struct EarningsResponse {
    #[serde(rename = "earningsCalendar", default)]
    earnings_calendar: Vec<EarningsRow>,
}

#[derive(Debug, Deserialize)]
struct EarningsRow {
    #[serde(default)]
    date: String,
}

/// Finnhub company news and earnings calendar.
pub struct FinnhubClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    news: Memoizer<str, String, Vec<Headline>>,
    earnings: Memoizer<str, String, Option<DateTime<Utc>>>,
}

impl FinnhubClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, DataIngestionError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        if config.finnhub_token.is_none() {
            warn!("FINNHUB_TOKEN not set; Finnhub news and earnings will be unavailable");
        }

        Ok(Self {
            http,
            base_url: config.finnhub_base_url.trim_end_matches('/').to_string(),
            token: config.finnhub_token.clone(),
            news: Memoizer::new("finnhub news", NEWS_TTL, |t: &str| t.to_string()),
            earnings: Memoizer::new("finnhub earnings", EARNINGS_TTL, |t: &str| t.to_string()),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, DataIngestionError> {
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

        Ok(response.json::<T>().await?)
    }

    async fn fetch_news(&self, ticker: &str) -> Result<Vec<Headline>, DataIngestionError> {
        let today = Utc::now().date_naive();
        let from = today - ChronoDuration::days(NEWS_LOOKBACK_DAYS);

        let raw: Vec<CompanyNews> = self
            .get_json(
                "/company-news",
                &[
                    ("symbol", ticker.to_string()),
                    ("from", from.to_string()),
                    ("to", today.to_string()),
                ],
            )
            .await?;

        let items: Vec<Headline> = raw
            .into_iter()
            .filter_map(|n| {
                let title = n.headline.trim().to_string();
                if title.is_empty() {
                    return None;
                }
                Some(Headline {
                    title,
                    publisher: n.source.trim().to_string(),
                    timestamp: from_epoch(n.datetime),
                    url: n.url.trim().to_string(),
                })
            })
            .collect();

        info!("Fetched {} Finnhub headlines for {}", items.len(), ticker);
        Ok(items)
    }

    async fn fetch_earnings(&self, ticker: &str) -> Result<Option<DateTime<Utc>>, DataIngestionError> {
        let resp: EarningsResponse = self
            .get_json("/calendar/earnings", &[("symbol", ticker.to_string())])
            .await?;

        Ok(resp
            .earnings_calendar
            .iter()
            .map(|row| row.date.trim())
            .find(|d| !d.is_empty())
            .and_then(parse_earnings_date))
    }
}

/// Calendar dates carry no time; they are read as 12:00 UTC.
fn parse_earnings_date(date: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl NewsSource for FinnhubClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn headlines(&self, ticker: &str) -> Result<Vec<Headline>, DataIngestionError> {
        let t = normalize_ticker(ticker).ok_or_else(|| DataIngestionError::InvalidTicker(ticker.to_string()))?;
        self.news
            .get_or_try_fetch(t.as_str(), || self.fetch_news(&t))
            .await
    }
}

#[async_trait]
impl EarningsCalendar for FinnhubClient {
    async fn next_earnings(&self, ticker: &str) -> Result<Option<DateTime<Utc>>, DataIngestionError> {
        let t = normalize_ticker(ticker).ok_or_else(|| DataIngestionError::InvalidTicker(ticker.to_string()))?;

        // A failed lookup is remembered as "no known date" for the full TTL.
        self.earnings
            .get_or_try_fetch(t.as_str(), || async {
                match self.fetch_earnings(&t).await {
                    Ok(date) => Ok::<_, DataIngestionError>(date),
                    Err(e) => {
                        warn!("Earnings lookup for {} failed: {}", t, e);
                        Ok(None)
                    }
                }
            })
            .await
    }
}
