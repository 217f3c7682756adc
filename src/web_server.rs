//! HTTP surface for the trading bot.
//!
//! Three routes: trigger a cycle, list recent trades, and fetch the latest
//! market snapshot. Handlers never surface pipeline failures as HTTP errors;
//! a failed cycle still answers 200 with its ERROR-status result.

use axum::{
    extract::{ Query, State },
    http::StatusCode,
    response::Json,
    routing::{ get, post },
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::get_configs;
use crate::database::TradeStore;
use crate::engine::TradingEngine;
use crate::errors::BotResult;
use crate::logger::{ self, LogTag };
use crate::types::{ CycleResult, MarketSnapshot, TradeRecord };

const MAX_TRADES_LIMIT: u32 = 100;
const DEFAULT_TRADES_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TradingEngine>,
    pub trades: Arc<TradeStore>,
}

#[derive(Debug, Deserialize)]
struct SymbolQuery {
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TradesQuery {
    limit: Option<u32>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trading/run-cycle", post(run_cycle))
        .route("/trading/trades", get(list_trades))
        .route("/trading/market/latest", get(latest_market))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_web_server(state: AppState) -> BotResult<()> {
    let bind = get_configs().web_bind;
    let app = build_router(state);

    logger::info(LogTag::Web, &format!("API listening on http://{}", bind));
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

fn requested_symbol(query: &SymbolQuery) -> String {
    query.symbol.clone().unwrap_or_else(|| get_configs().default_symbol)
}

async fn run_cycle(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>
) -> Json<CycleResult> {
    let symbol = requested_symbol(&query);
    logger::info(LogTag::Web, &format!("POST /trading/run-cycle symbol={}", symbol));
    Json(state.engine.run_cycle(&symbol).await)
}

async fn list_trades(
    State(state): State<AppState>,
    Query(query): Query<TradesQuery>
) -> Result<Json<Vec<TradeRecord>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_TRADES_LIMIT).clamp(1, MAX_TRADES_LIMIT);
    match state.trades.list_recent(limit) {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            logger::error(LogTag::Web, &format!("Failed to list trades: {}", e));
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn latest_market(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>
) -> Result<Json<MarketSnapshot>, StatusCode> {
    let symbol = requested_symbol(&query);
    match state.engine.market_snapshot(&symbol).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            logger::error(LogTag::Web, &format!("Market fetch failed for {}: {}", symbol, e));
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::classifier::ClassifierStore;
    use crate::decision::DecisionEngine;
    use crate::errors::BotError;
    use crate::execution::ExecutionAgent;
    use crate::market_data::{ Candle, MarketDataSource };
    use crate::types::{ ExecutionStatus, TradeAction };
    use tower::ServiceExt;

    struct FailingMarket;

    #[async_trait]
    impl MarketDataSource for FailingMarket {
        async fn current_price(&self, _symbol: &str) -> BotResult<f64> {
            Err(BotError::Transport("offline".to_string()))
        }

        async fn recent_candles(
            &self,
            _symbol: &str,
            _interval: &str,
            _limit: u32
        ) -> BotResult<Vec<Candle>> {
            Err(BotError::Transport("offline".to_string()))
        }
    }

    fn test_state() -> AppState {
        let trades = Arc::new(TradeStore::open_in_memory().unwrap());
        let engine = Arc::new(
            TradingEngine::new(
                Arc::new(FailingMarket),
                DecisionEngine::new(Arc::new(ClassifierStore::new(0.5))),
                ExecutionAgent::new(trades.clone(), 0.6, 0.01),
                "1m".to_string(),
                100
            )
        );
        AppState { engine, trades }
    }

    #[tokio::test]
    async fn health_route_reports_healthy() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                axum::http::Request
                    ::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap()
            ).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn run_cycle_answers_ok_even_when_the_cycle_errors() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                axum::http::Request
                    ::builder()
                    .method("POST")
                    .uri("/trading/run-cycle?symbol=BTCUSDT")
                    .body(axum::body::Body::empty())
                    .unwrap()
            ).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let result: CycleResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result.execution.status, ExecutionStatus::Error);
        assert_eq!(result.decision.action, TradeAction::Hold);
    }

    #[tokio::test]
    async fn trades_route_lists_recent_records() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                axum::http::Request
                    ::builder()
                    .uri("/trading/trades?limit=5")
                    .body(axum::body::Body::empty())
                    .unwrap()
            ).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let records: Vec<TradeRecord> = serde_json::from_slice(&bytes).unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn market_route_maps_transport_failure_to_bad_gateway() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                axum::http::Request
                    ::builder()
                    .uri("/trading/market/latest?symbol=BTCUSDT")
                    .body(axum::body::Body::empty())
                    .unwrap()
            ).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
