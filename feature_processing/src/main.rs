use anyhow::Result;
use data_ingestion::NewsSource;
use data_ingestion::config::ProviderConfig;
use data_ingestion::finnhub::FinnhubClient;
use data_ingestion::logger::init_logger;
use data_ingestion::tiingo::TiingoClient;
use data_ingestion::yahoo::YahooRssClient;
use feature_processing::aggregator::FeatureAggregator;
use feature_processing::config::ContextConfig;
use feature_processing::sentiment::SentimentClient;
use feature_processing::server::Server;
use log::*;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let config = ContextConfig::from_env()?;
    let providers = ProviderConfig::from_env()?;

    let finnhub = Arc::new(FinnhubClient::new(&providers)?);
    let yahoo: Arc<dyn NewsSource> = Arc::new(YahooRssClient::new(&providers)?);
    let news = vec![finnhub.clone() as Arc<dyn NewsSource>, yahoo];

    let aggregator = FeatureAggregator::new(
        Arc::new(TiingoClient::new(&providers)?),
        news,
        finnhub,
        Arc::new(SentimentClient::new(&config.sentiment_url, config.sentiment_timeout())?),
        config.ttl(),
        config.headline_limit,
    );
    info!(
        "Feature cache TTL {}s, sentiment at {}",
        config.ttl_s, config.sentiment_url
    );

    let server = Server::init(&config.bind_addr, Arc::new(aggregator));
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping context service");
        }
        res = server.run() => {
            if let Err(e) = res {
                error!("Context service failed: {:?}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
