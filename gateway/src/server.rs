use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use data_ingestion::timestamp::iso_seconds;
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::pipeline::{Gateway, RunResponse};

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    ticker: Option<String>,
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "gateway",
        "version": "v1",
        "ctx_url": state.gateway.ctx_url(),
        "rec_url": state.gateway.rec_url(),
        "ts": iso_seconds(Utc::now()),
    }))
}

/// GET /api/run?ticker=TSLA
async fn run(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> Result<Json<RunResponse>, GatewayError> {
    let ticker = query.ticker.unwrap_or_default();
    Ok(Json(state.gateway.run(&ticker).await?))
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/run", get(run))
        .with_state(AppState { gateway })
}

pub struct Server {
    bind_addr: String,
    gateway: Arc<Gateway>,
}

impl Server {
    pub fn init(bind_addr: &str, gateway: Gateway) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            gateway: Arc::new(gateway),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("🚀 Gateway listening on {}", listener.local_addr()?);
        axum::serve(listener, router(self.gateway.clone())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mocks::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use feature_processing::misc::FeatureVector;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use tower::ServiceExt;

    async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn app(features_status: StatusCode) -> Router {
        let ctx = spawn(context(
            payload(FeatureVector::stub(), None),
            features_status,
            true,
            Arc::new(AtomicUsize::new(0)),
        ))
        .await;
        let rec = spawn(recommender()).await;
        router(Arc::new(Gateway::new(&config(ctx, rec)).unwrap()))
    }

    #[tokio::test]
    async fn run_returns_composed_json() {
        let (status, body) = call(app(StatusCode::OK).await, "/api/run?ticker=TSLA").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "TSLA");
        assert_eq!(body["recommendation"]["class"], "DEBIT_CALL");
        assert!(body["one_liner"]["text"].as_str().unwrap().chars().count() <= 180);
        assert!(body["quote"].is_object());
        assert!(body["quote"]["bid"].is_null());
        assert!(body["features_used"].is_object());
        assert!(body.get("features_note").is_none());
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let (status, body) = call(
            app(StatusCode::SERVICE_UNAVAILABLE).await,
            "/api/run?ticker=TSLA",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["stage"], "FETCH_FEATURES");
    }

    #[tokio::test]
    async fn missing_ticker_is_bad_request() {
        let (status, _) = call(app(StatusCode::OK).await, "/api/run").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn healthz_lists_upstreams() {
        let (status, body) = call(app(StatusCode::OK).await, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "gateway");
        assert!(body["ctx_url"].as_str().unwrap().starts_with("http://127.0.0.1:"));
    }
}
