use anyhow::{Context, Result};
use data_ingestion::logger::init_logger;
use inference_server::bundle::ModelBundle;
use inference_server::config::RecommenderConfig;
use inference_server::engine::InferenceEngine;
use inference_server::server::Server;
use log::*;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let config = RecommenderConfig::from_env()?;
    let bundle = ModelBundle::load(&config.model_path)
        .with_context(|| format!("model bundle not usable at {}", config.model_path))?;

    let server = Server::init(&config.bind_addr, Arc::new(InferenceEngine::with_bundle(bundle)));
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping recommender");
        }
        res = server.run() => {
            if let Err(e) = res {
                error!("Recommender failed: {:?}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
