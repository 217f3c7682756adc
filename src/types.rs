use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;

/// Trading action recommended by the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "HOLD")]
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(TradeAction::Buy),
            "SELL" => Some(TradeAction::Sell),
            "HOLD" => Some(TradeAction::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome status of one simulated execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "SKIPPED")]
    Skipped,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "ERROR")]
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Filled => "FILLED",
            ExecutionStatus::Skipped => "SKIPPED",
            ExecutionStatus::Rejected => "REJECTED",
            ExecutionStatus::Error => "ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FILLED" => Some(ExecutionStatus::Filled),
            "SKIPPED" => Some(ExecutionStatus::Skipped),
            "REJECTED" => Some(ExecutionStatus::Rejected),
            "ERROR" => Some(ExecutionStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifier output for one cycle: action, confidence in [0,1], and a
/// human-readable justification. Produced fresh each cycle, never persisted
/// on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: TradeAction,
    pub confidence: f64,
    pub reason: String,
}

/// Market snapshot embedded in a cycle result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub indicators: HashMap<String, f64>,
    pub source: String,
}

/// Result of one simulated execution attempt as returned to the API caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub executed: bool,
    pub execution_price: f64,
    pub order_id: String,
    pub status: ExecutionStatus,
    pub time: DateTime<Utc>,
}

/// A durably persisted trade row (the only part of a cycle that survives it)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    pub order_id: String,
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub execution_price: f64,
    pub status: ExecutionStatus,
    pub timestamp: DateTime<Utc>,
}

/// Per-stage log lines attached to a cycle result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleLogs {
    pub market_agent: String,
    pub decision_agent: String,
    pub execution_agent: String,
}

/// Full result of one trading cycle.
///
/// Ephemeral: returned to the caller, never stored as its own entity (only
/// the execution record persists). Structurally valid regardless of which
/// stage failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: u64,
    pub timestamp: DateTime<Utc>,
    pub market_data: MarketSnapshot,
    pub decision: Decision,
    pub execution: ExecutionResult,
    pub logs: CycleLogs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&TradeAction::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&ExecutionStatus::Skipped).unwrap(), "\"SKIPPED\"");
    }

    #[test]
    fn cycle_result_round_trips_through_json() {
        let result = CycleResult {
            cycle_id: 1,
            timestamp: Utc::now(),
            market_data: MarketSnapshot {
                symbol: "BTCUSDT".to_string(),
                price: 50000.0,
                indicators: HashMap::new(),
                source: "binance".to_string(),
            },
            decision: Decision {
                action: TradeAction::Hold,
                confidence: 0.5,
                reason: "Model not initialized".to_string(),
            },
            execution: ExecutionResult {
                executed: false,
                execution_price: 50000.0,
                order_id: "ORD-20250101-AAAAAAAA".to_string(),
                status: ExecutionStatus::Skipped,
                time: Utc::now(),
            },
            logs: CycleLogs::default(),
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: CycleResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cycle_id, 1);
        assert_eq!(back.decision.action, TradeAction::Hold);
        assert_eq!(back.execution.status, ExecutionStatus::Skipped);
    }
}
