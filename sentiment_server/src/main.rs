use anyhow::Result;
use data_ingestion::logger::init_logger;
use log::*;
use sentiment_server::config::SentimentConfig;
use sentiment_server::server::Server;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let config = SentimentConfig::from_env()?;
    info!("Sentiment engine {}, cache TTL {}s", sentiment_server::lexicon::ENGINE, config.ttl_s);

    let server = Server::init(&config.bind_addr, config.ttl());
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping sentiment service");
        }
        res = server.run() => {
            if let Err(e) = res {
                error!("Sentiment service failed: {:?}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
