use anyhow::Result;
use data_ingestion::logger::init_logger;
use gateway::config::GatewayConfig;
use gateway::pipeline::Gateway;
use gateway::server::Server;
use log::*;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let config = GatewayConfig::from_env()?;
    info!(
        "Context at {}, recommender at {} ({} retries, {}ms apart)",
        config.ctx_url, config.rec_url, config.retries, config.retry_delay_ms
    );

    let server = Server::init(&config.bind_addr, Gateway::new(&config)?);
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping gateway");
        }
        res = server.run() => {
            if let Err(e) = res {
                error!("Gateway failed: {:?}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
