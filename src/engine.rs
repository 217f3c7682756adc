//! Cycle orchestrator: sequences market fetch, decision, and simulated
//! execution into one atomic trading cycle.
//!
//! State machine per cycle:
//! STARTED -> MARKET_FETCHED -> DECIDED -> EXECUTED -> DONE, with ERROR
//! absorbing from any state. Whatever stage fails, the returned
//! `CycleResult` is structurally valid; only the market fetch can push the
//! whole cycle into ERROR, later stages are total.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{ AtomicU64, Ordering };

use crate::decision::DecisionEngine;
use crate::errors::BotResult;
use crate::execution::ExecutionAgent;
use crate::indicators;
use crate::logger::{ self, LogTag };
use crate::market_data::MarketDataSource;
use crate::types::{
    CycleLogs,
    CycleResult,
    Decision,
    ExecutionResult,
    ExecutionStatus,
    MarketSnapshot,
    TradeAction,
};

pub struct TradingEngine {
    market: Arc<dyn MarketDataSource>,
    decision: DecisionEngine,
    execution: ExecutionAgent,
    interval: String,
    klines_limit: u32,
    // Only state shared across concurrent cycle invocations.
    cycle_counter: AtomicU64,
}

impl TradingEngine {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        decision: DecisionEngine,
        execution: ExecutionAgent,
        interval: String,
        klines_limit: u32
    ) -> Self {
        Self {
            market,
            decision,
            execution,
            interval,
            klines_limit,
            cycle_counter: AtomicU64::new(0),
        }
    }

    /// Fetch the current price and candle history and derive the indicator
    /// snapshot. Shared by the cycle pipeline and the market API route.
    pub async fn market_snapshot(&self, symbol: &str) -> BotResult<MarketSnapshot> {
        let price = self.market.current_price(symbol).await?;
        let candles = self.market.recent_candles(
            symbol,
            &self.interval,
            self.klines_limit
        ).await?;

        let indicators = indicators::extract_features(&candles);

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price,
            indicators,
            source: "binance".to_string(),
        })
    }

    /// Run one trading cycle. Never fails: any stage failure is absorbed
    /// into the result's own status and reason fields.
    pub async fn run_cycle(&self, symbol: &str) -> CycleResult {
        let cycle_id = self.cycle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = Utc::now();
        let mut logs = CycleLogs::default();

        logger::info(LogTag::Engine, &format!("Cycle {}: fetching market data", cycle_id));
        let snapshot = match self.market_snapshot(symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let message = format!("Cycle {} failed during market fetch: {}", cycle_id, e);
                // Transient transport failures are expected to clear on the
                // next cycle; anything else is worth an error line.
                if e.is_recoverable() {
                    logger::warning(LogTag::Engine, &message);
                } else {
                    logger::error(LogTag::Engine, &message);
                }
                return Self::error_result(cycle_id, symbol, &e.to_string());
            }
        };
        logs.market_agent = format!(
            "Received live price and calculated indicators for {}",
            symbol
        );

        logger::info(LogTag::Engine, &format!("Cycle {}: running decision engine", cycle_id));
        let decision = self.decision.decide(&snapshot.indicators);
        logs.decision_agent = format!(
            "Model predicted {} with {:.2} confidence",
            decision.action,
            decision.confidence
        );

        logger::info(LogTag::Engine, &format!("Cycle {}: simulating execution", cycle_id));
        let execution = self.execution.execute(&decision, &snapshot);
        logs.execution_agent = if execution.executed {
            "Trade executed successfully".to_string()
        } else if execution.status == ExecutionStatus::Skipped {
            "Trade skipped (HOLD action)".to_string()
        } else {
            format!("Trade {}", execution.status.as_str().to_lowercase())
        };

        logger::info(LogTag::Engine, &format!("Cycle {} completed", cycle_id));

        CycleResult {
            cycle_id,
            timestamp,
            market_data: snapshot,
            decision,
            execution,
            logs,
        }
    }

    /// The ERROR contract: a well-formed result with the failure embedded in
    /// its own fields.
    fn error_result(cycle_id: u64, symbol: &str, error_message: &str) -> CycleResult {
        let timestamp = Utc::now();
        CycleResult {
            cycle_id,
            timestamp,
            market_data: MarketSnapshot {
                symbol: symbol.to_string(),
                price: 0.0,
                indicators: HashMap::new(),
                source: "error".to_string(),
            },
            decision: Decision {
                action: TradeAction::Hold,
                confidence: 0.0,
                reason: format!("Error: {}", error_message),
            },
            execution: ExecutionResult {
                executed: false,
                execution_price: 0.0,
                order_id: format!("ERROR-{}", cycle_id),
                status: ExecutionStatus::Error,
                time: timestamp,
            },
            logs: CycleLogs {
                market_agent: format!("Error: {}", error_message),
                decision_agent: String::new(),
                execution_agent: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::classifier::ClassifierStore;
    use crate::database::TradeStore;
    use crate::errors::BotError;
    use crate::market_data::Candle;

    struct FixedMarket {
        price: f64,
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl MarketDataSource for FixedMarket {
        async fn current_price(&self, _symbol: &str) -> BotResult<f64> {
            Ok(self.price)
        }

        async fn recent_candles(
            &self,
            _symbol: &str,
            _interval: &str,
            _limit: u32
        ) -> BotResult<Vec<Candle>> {
            Ok(self.candles.clone())
        }
    }

    struct FailingMarket;

    #[async_trait]
    impl MarketDataSource for FailingMarket {
        async fn current_price(&self, symbol: &str) -> BotResult<f64> {
            Err(BotError::Transport(format!("connection refused for {}", symbol)))
        }

        async fn recent_candles(
            &self,
            symbol: &str,
            _interval: &str,
            _limit: u32
        ) -> BotResult<Vec<Candle>> {
            Err(BotError::Transport(format!("connection refused for {}", symbol)))
        }
    }

    fn rising_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = 100.0 * (1.01f64).powi(i as i32);
                Candle {
                    open_time: (i as i64) * 60_000,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }

    fn build_engine(
        market: Arc<dyn MarketDataSource>,
        store: Arc<ClassifierStore>,
        trades: Arc<TradeStore>
    ) -> TradingEngine {
        TradingEngine::new(
            market,
            DecisionEngine::new(store),
            ExecutionAgent::new(trades, 0.6, 0.01),
            "1m".to_string(),
            100
        )
    }

    #[tokio::test]
    async fn cycle_ids_increase_from_one() {
        let market = Arc::new(FixedMarket { price: 100.0, candles: rising_candles(60) });
        let engine = build_engine(
            market,
            Arc::new(ClassifierStore::new(0.5)),
            Arc::new(TradeStore::open_in_memory().unwrap())
        );

        let first = engine.run_cycle("BTCUSDT").await;
        let second = engine.run_cycle("BTCUSDT").await;
        let third = engine.run_cycle("BTCUSDT").await;
        assert_eq!(first.cycle_id, 1);
        assert_eq!(second.cycle_id, 2);
        assert_eq!(third.cycle_id, 3);
    }

    #[tokio::test]
    async fn concurrent_cycles_never_share_an_id() {
        let market = Arc::new(FixedMarket { price: 100.0, candles: rising_candles(60) });
        let engine = Arc::new(
            build_engine(
                market,
                Arc::new(ClassifierStore::new(0.5)),
                Arc::new(TradeStore::open_in_memory().unwrap())
            )
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.run_cycle("BTCUSDT").await.cycle_id }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_the_error_contract() {
        let engine = build_engine(
            Arc::new(FailingMarket),
            Arc::new(ClassifierStore::new(0.5)),
            Arc::new(TradeStore::open_in_memory().unwrap())
        );

        let result = engine.run_cycle("BTCUSDT").await;
        assert_eq!(result.execution.status, ExecutionStatus::Error);
        assert_eq!(result.decision.action, TradeAction::Hold);
        assert_eq!(result.decision.confidence, 0.0);
        assert_eq!(result.market_data.source, "error");
        assert_eq!(result.execution.order_id, "ERROR-1");
        assert!(result.logs.market_agent.contains("connection refused"));
        assert!(!result.execution.executed);
    }

    #[tokio::test]
    async fn untrained_store_holds_and_skips() {
        let market = Arc::new(FixedMarket { price: 100.0, candles: rising_candles(60) });
        let trades = Arc::new(TradeStore::open_in_memory().unwrap());
        let engine = build_engine(market, Arc::new(ClassifierStore::new(0.5)), trades.clone());

        let result = engine.run_cycle("BTCUSDT").await;
        assert_eq!(result.decision.action, TradeAction::Hold);
        assert_eq!(result.execution.status, ExecutionStatus::Skipped);
        assert_eq!(result.logs.execution_agent, "Trade skipped (HOLD action)");
        assert_eq!(trades.list_recent(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn trained_store_completes_a_full_cycle() {
        let candles = rising_candles(100);
        let store = Arc::new(ClassifierStore::new(0.5));
        store.train(&candles).unwrap();

        let market = Arc::new(FixedMarket { price: 100.0, candles });
        let trades = Arc::new(TradeStore::open_in_memory().unwrap());
        let engine = build_engine(market, store, trades.clone());

        let result = engine.run_cycle("BTCUSDT").await;
        assert_ne!(result.execution.status, ExecutionStatus::Error);
        assert_eq!(result.market_data.source, "binance");
        assert!(!result.logs.market_agent.is_empty());
        assert!(!result.logs.decision_agent.is_empty());
        assert!(!result.logs.execution_agent.is_empty());
        assert_eq!(trades.list_recent(10).unwrap().len(), 1);
    }
}
