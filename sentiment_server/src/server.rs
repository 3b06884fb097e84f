use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use data_ingestion::Memoizer;
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SentimentError;
use crate::lexicon::{ENGINE, SentimentReport, analyze, normalize_texts};

type ReportCache = Memoizer<[String], Vec<String>, SentimentReport>;

#[derive(Clone)]
pub struct AppState {
    reports: Arc<ReportCache>,
}

impl AppState {
    pub fn new(ttl: Duration) -> Self {
        Self {
            reports: Arc::new(Memoizer::new("sentiment", ttl, |texts: &[String]| texts.to_vec())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentRequest {
    #[serde(default)]
    texts: Vec<String>,
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "sentiment",
        "version": "v1",
        "ttl_s": state.reports.cache().ttl().as_secs(),
        "engine": ENGINE,
    }))
}

/// POST /api/sentiment
async fn sentiment(
    State(state): State<AppState>,
    Json(req): Json<SentimentRequest>,
) -> Result<Json<SentimentReport>, SentimentError> {
    let texts = normalize_texts(&req.texts);
    if texts.is_empty() {
        return Err(SentimentError::EmptyInput);
    }

    let report = state
        .reports
        .get_or_try_fetch(texts.as_slice(), || async {
            Ok::<_, SentimentError>(analyze(&texts, Utc::now()))
        })
        .await?;
    Ok(Json(report))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/sentiment", post(sentiment))
        .with_state(state)
}

pub struct Server {
    bind_addr: String,
    state: AppState,
}

impl Server {
    pub fn init(bind_addr: &str, ttl: Duration) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            state: AppState::new(ttl),
        }
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("🚀 Sentiment service listening on {}", listener.local_addr()?);
        axum::serve(listener, router(self.state)).await?;
        Ok(())
    }
}
