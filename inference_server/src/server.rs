use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use feature_processing::misc::{FeatureVector, MAX_MINS_SINCE_NEWS};
use log::info;
use serde_json::json;
use std::sync::Arc;

use crate::engine::{InferenceEngine, Recommendation};
use crate::error::InferenceError;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<InferenceEngine>,
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let bundle = state.engine.bundle().ok();
    Json(json!({
        "status": "ok",
        "service": "recommender",
        "version": "v1",
        "model_loaded": bundle.is_some(),
        "model_version": bundle.map(|b| b.version.clone()),
    }))
}

fn validate(features: &FeatureVector) -> Result<(), InferenceError> {
    if features.mins_since_news > MAX_MINS_SINCE_NEWS {
        return Err(InferenceError::InvalidFeature(format!(
            "mins_since_news must be within 0..={MAX_MINS_SINCE_NEWS}, got {}",
            features.mins_since_news
        )));
    }
    Ok(())
}

/// POST /api/recommend
async fn recommend(
    State(state): State<AppState>,
    Json(features): Json<FeatureVector>,
) -> Result<Json<Recommendation>, InferenceError> {
    validate(&features)?;
    let inference = state.engine.recommend(&features)?;
    Ok(Json(inference.recommendation))
}

pub fn router(engine: Arc<InferenceEngine>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/recommend", post(recommend))
        .with_state(AppState { engine })
}

pub struct Server {
    bind_addr: String,
    engine: Arc<InferenceEngine>,
}

impl Server {
    pub fn init(bind_addr: &str, engine: Arc<InferenceEngine>) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            engine,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("🚀 Recommender listening on {}", listener.local_addr()?);
        axum::serve(listener, router(self.engine.clone())).await?;
        Ok(())
    }
}
