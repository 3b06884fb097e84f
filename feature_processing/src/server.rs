use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::aggregator::{FeatureAggregator, FeaturePayload};
use crate::error::FeatureError;
use crate::explain::{OneLiner, OneLinerRequest, one_liner};

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<FeatureAggregator>,
}

#[derive(Debug, Deserialize)]
struct FeaturesQuery {
    ticker: Option<String>,
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "context", "version": "v1" }))
}

/// GET /api/features?ticker=TSLA
async fn features(
    State(state): State<AppState>,
    Query(query): Query<FeaturesQuery>,
) -> Result<Json<FeaturePayload>, FeatureError> {
    let ticker = query.ticker.unwrap_or_default();
    let payload = state.aggregator.aggregate(&ticker).await?;
    Ok(Json(payload))
}

/// POST /api/one_liner
async fn explain(Json(req): Json<OneLinerRequest>) -> Json<OneLiner> {
    Json(one_liner(&req))
}

pub fn router(aggregator: Arc<FeatureAggregator>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/features", get(features))
        .route("/api/features/v2", get(features))
        .route("/api/one_liner", post(explain))
        .with_state(AppState { aggregator })
}

pub struct Server {
    bind_addr: String,
    app: Router,
}

impl Server {
    pub fn init(bind_addr: &str, aggregator: Arc<FeatureAggregator>) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            app: router(aggregator),
        }
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("🚀 Context service listening on {}", listener.local_addr()?);
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::SentimentScorer;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{DateTime, Utc};
    use data_ingestion::{Candle, DataIngestionError, EarningsCalendar, MarketData, Quote};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct NoMarket;

    #[async_trait]
    impl MarketData for NoMarket {
        async fn candles(&self, _ticker: &str) -> Result<Vec<Candle>, DataIngestionError> {
            Err(DataIngestionError::MissingToken { provider: "tiingo" })
        }

        async fn quote(&self, _ticker: &str) -> Result<Quote, DataIngestionError> {
            Ok(Quote::default())
        }
    }

    /// A handful of bars, too few for any 20-bar indicator.
    struct ShortHistory;

    #[async_trait]
    impl MarketData for ShortHistory {
        async fn candles(&self, _ticker: &str) -> Result<Vec<Candle>, DataIngestionError> {
            Ok((0..5)
                .map(|i| Candle {
                    ts: Utc::now(),
                    open: 100.0 + f64::from(i),
                    high: 101.0 + f64::from(i),
                    low: 99.0 + f64::from(i),
                    close: 100.0 + f64::from(i),
                    volume: 50_000,
                })
                .collect())
        }

        async fn quote(&self, _ticker: &str) -> Result<Quote, DataIngestionError> {
            Ok(Quote::default())
        }
    }

    struct NoEarnings;

    #[async_trait]
    impl EarningsCalendar for NoEarnings {
        async fn next_earnings(&self, _ticker: &str) -> Result<Option<DateTime<Utc>>, DataIngestionError> {
            Ok(None)
        }
    }

    struct Neutral;

    #[async_trait]
    impl SentimentScorer for Neutral {
        async fn score(&self, texts: &[String]) -> Result<Vec<f64>, FeatureError> {
            Ok(vec![0.0; texts.len()])
        }
    }

    fn app() -> Router {
        app_with(Arc::new(NoMarket))
    }

    fn app_with(market: Arc<dyn MarketData>) -> Router {
        router(Arc::new(FeatureAggregator::new(
            market,
            Vec::new(),
            Arc::new(NoEarnings),
            Arc::new(Neutral),
            Duration::from_secs(45),
            5,
        )))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_service() {
        let response = app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "context");
    }

    #[tokio::test]
    async fn features_degrade_to_stub_with_error() {
        let response = app()
            .oneshot(Request::get("/api/features?ticker=tsla").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["ticker"], "TSLA");
        assert_eq!(body["features"]["sent_mean"], 0.21);
        assert_eq!(body["features"]["mins_since_news"], 12);
        assert!(body["error"].as_str().unwrap().contains("tiingo token not set"));
        assert!(body.get("_cache").is_none());
    }

    #[tokio::test]
    async fn short_history_degrades_instead_of_failing() {
        let response = app_with(Arc::new(ShortHistory))
            .oneshot(Request::get("/api/features?ticker=AAPL").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["features"]["rv20"], 0.18);
        assert!(body["error"].as_str().unwrap().contains("insufficient data"));
    }

    #[tokio::test]
    async fn features_require_ticker() {
        for uri in ["/api/features", "/api/features?ticker=%20%20"] {
            let response = app()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(body_json(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn one_liner_endpoint() {
        let request = Request::post("/api/one_liner")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"class":"IRON_CONDOR","confidence":0.61,"title":"Apple: flat open","publisher":"Reuters","url":"https://r/1"}"#,
            ))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_json(response).await["text"].as_str().unwrap().to_string();
        assert!(text.starts_with("IRON_CONDOR: "));
        assert!(text.contains("Conf 61%"));
        assert!(text.chars().count() <= 180);
    }
}
