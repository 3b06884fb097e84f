use async_trait::async_trait;
use log::info;
use reqwest::Client;
use rss::Channel;
use std::time::Duration;

use crate::cache::Memoizer;
use crate::config::ProviderConfig;
use crate::error::DataIngestionError;
use crate::fetcher::{Headline, NewsSource, normalize_ticker};
use crate::timestamp::parse_timestamp;

const PROVIDER: &str = "yahoo";
const FEED_TTL: Duration = Duration::from_secs(90);

/// Yahoo Finance per-symbol headline RSS feed.
pub struct YahooRssClient {
    http: Client,
    feed_url: String,
    feeds: Memoizer<str, String, Vec<Headline>>,
}

impl YahooRssClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, DataIngestionError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            http,
            feed_url: config.yahoo_rss_url.clone(),
            feeds: Memoizer::new("yahoo rss", FEED_TTL, |t: &str| t.to_string()),
        })
    }

    async fn fetch_feed(&self, ticker: &str) -> Result<Vec<Headline>, DataIngestionError> {
        let response = self
            .http
            .get(&self.feed_url)
            .query(&[("s", ticker)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataIngestionError::UpstreamStatus {
                provider: PROVIDER,
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        let items = parse_feed(&body)?;
        info!("Fetched {} Yahoo headlines for {}", items.len(), ticker);
        Ok(items)
    }
}

fn parse_feed(body: &[u8]) -> Result<Vec<Headline>, DataIngestionError> {
    let channel = Channel::read_from(body)?;
    Ok(channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            let link = item.link()?.trim();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(Headline {
                title: title.to_string(),
                publisher: "Yahoo".to_string(),
                timestamp: item.pub_date().and_then(parse_timestamp),
                url: link.to_string(),
            })
        })
        .collect())
}

#[async_trait]
impl NewsSource for YahooRssClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn headlines(&self, ticker: &str) -> Result<Vec<Headline>, DataIngestionError> {
        let t = normalize_ticker(ticker).ok_or_else(|| DataIngestionError::InvalidTicker(ticker.to_string()))?;
        self.feeds
            .get_or_try_fetch(t.as_str(), || self.fetch_feed(&t))
            .await
    }
}
