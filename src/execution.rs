//! Simulated order execution.
//!
//! Confidence-gated fill/reject/skip with a fixed slippage model. Every
//! attempt, whatever its status, gets a unique order id and is persisted as
//! a trade record; a storage failure degrades the attempt to an ERROR
//! record instead of crashing the cycle.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::TradeStore;
use crate::logger::{ self, LogTag };
use crate::types::{ Decision, ExecutionResult, ExecutionStatus, MarketSnapshot, TradeAction };

pub struct ExecutionAgent {
    store: Arc<TradeStore>,
    confidence_min: f64,
    slippage_percent: f64,
}

impl ExecutionAgent {
    pub fn new(store: Arc<TradeStore>, confidence_min: f64, slippage_percent: f64) -> Self {
        Self {
            store,
            confidence_min,
            slippage_percent,
        }
    }

    /// Date-stamped order id with a random suffix, e.g. ORD-20250601-3F91A2C4
    fn generate_order_id() -> String {
        let date = Utc::now().format("%Y%m%d");
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!("ORD-{}-{}", date, suffix)
    }

    /// Simulate one execution attempt and persist the outcome.
    pub fn execute(&self, decision: &Decision, snapshot: &MarketSnapshot) -> ExecutionResult {
        let action = decision.action;
        let price = snapshot.price;
        let order_id = Self::generate_order_id();
        let execution_time = Utc::now();

        let (status, executed, execution_price) = if action == TradeAction::Hold {
            (ExecutionStatus::Skipped, false, price)
        } else if decision.confidence < self.confidence_min {
            (ExecutionStatus::Rejected, false, price)
        } else {
            let slippage = (price * self.slippage_percent) / 100.0;
            let filled_price = if action == TradeAction::Buy {
                price + slippage
            } else {
                price - slippage
            };
            (ExecutionStatus::Filled, true, filled_price)
        };

        match
            self.store.append(
                &order_id,
                &snapshot.symbol,
                action,
                price,
                execution_price,
                status,
                execution_time
            )
        {
            Ok(_) => {
                logger::info(
                    LogTag::Execution,
                    &format!(
                        "Order {} - {} ({}) at {:.4}",
                        order_id,
                        action,
                        status,
                        execution_price
                    )
                );
                ExecutionResult {
                    executed,
                    execution_price,
                    order_id,
                    status,
                    time: execution_time,
                }
            }
            Err(e) => {
                logger::error(LogTag::Execution, &format!("Failed to persist trade: {}", e));
                ExecutionResult {
                    executed: false,
                    execution_price: price,
                    order_id: format!(
                        "ERROR-{}",
                        &Uuid::new_v4().simple().to_string()[..8]
                    ),
                    status: ExecutionStatus::Error,
                    time: Utc::now(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            price,
            indicators: HashMap::new(),
            source: "binance".to_string(),
        }
    }

    fn decision(action: TradeAction, confidence: f64) -> Decision {
        Decision {
            action,
            confidence,
            reason: "test".to_string(),
        }
    }

    fn agent() -> ExecutionAgent {
        let store = Arc::new(TradeStore::open_in_memory().unwrap());
        ExecutionAgent::new(store, 0.6, 0.01)
    }

    #[test]
    fn hold_is_skipped_without_execution() {
        let agent = agent();
        let result = agent.execute(&decision(TradeAction::Hold, 0.9), &snapshot(100.0));
        assert_eq!(result.status, ExecutionStatus::Skipped);
        assert!(!result.executed);
        assert!((result.execution_price - 100.0).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_non_hold_is_rejected_at_requested_price() {
        let agent = agent();
        let result = agent.execute(&decision(TradeAction::Buy, 0.55), &snapshot(100.0));
        assert_eq!(result.status, ExecutionStatus::Rejected);
        assert!(!result.executed);
        assert!((result.execution_price - 100.0).abs() < 1e-9);
    }

    #[test]
    fn confident_buy_fills_with_positive_slippage() {
        let agent = agent();
        let result = agent.execute(&decision(TradeAction::Buy, 0.9), &snapshot(100.0));
        assert_eq!(result.status, ExecutionStatus::Filled);
        assert!(result.executed);
        assert!((result.execution_price - 100.01).abs() < 1e-9);
    }

    #[test]
    fn confident_sell_fills_with_negative_slippage() {
        let agent = agent();
        let result = agent.execute(&decision(TradeAction::Sell, 0.9), &snapshot(100.0));
        assert_eq!(result.status, ExecutionStatus::Filled);
        assert!((result.execution_price - 99.99).abs() < 1e-9);
    }

    #[test]
    fn every_attempt_is_persisted() {
        let store = Arc::new(TradeStore::open_in_memory().unwrap());
        let agent = ExecutionAgent::new(store.clone(), 0.6, 0.01);

        agent.execute(&decision(TradeAction::Hold, 0.9), &snapshot(100.0));
        agent.execute(&decision(TradeAction::Buy, 0.9), &snapshot(100.0));

        let records = store.list_recent(10).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn order_ids_are_date_stamped_and_unique() {
        let agent = agent();
        let first = agent.execute(&decision(TradeAction::Buy, 0.9), &snapshot(100.0));
        let second = agent.execute(&decision(TradeAction::Buy, 0.9), &snapshot(100.0));
        assert!(first.order_id.starts_with("ORD-"));
        assert_ne!(first.order_id, second.order_id);
    }
}
