//! Binance market data client and the source trait the orchestrator
//! depends on.
//!
//! Transport failures never crash the process: they surface as
//! `BotError::Transport` and the cycle orchestrator degrades the cycle.

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use std::time::Duration;

use crate::arguments::is_debug_market_enabled;
use crate::errors::{ BotError, BotResult };
use crate::logger::{ self, LogTag };

const HTTP_TIMEOUT_SECS: u64 = 10;

/// One OHLCV price bar. Chronological order of a candle sequence is owned by
/// the exchange response and must be preserved by every consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Market data collaborator contract.
///
/// The orchestrator only sees this trait, which keeps cycles testable with
/// mock sources and keeps the HTTP client swappable.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn current_price(&self, symbol: &str) -> BotResult<f64>;

    async fn recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32
    ) -> BotResult<Vec<Candle>>;
}

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    price: String,
}

/// REST client for the Binance spot API
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client
            ::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { base_url, client }
    }

    fn value_to_f64(value: &Value) -> Option<f64> {
        match value {
            Value::String(s) => s.parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    fn value_to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Parse one Binance kline entry:
    /// [open_time, open, high, low, close, volume, close_time, ...]
    fn parse_kline(entry: &[Value]) -> Option<Candle> {
        if entry.len() < 6 {
            return None;
        }
        Some(Candle {
            open_time: Self::value_to_i64(&entry[0])?,
            open: Self::value_to_f64(&entry[1])?,
            high: Self::value_to_f64(&entry[2])?,
            low: Self::value_to_f64(&entry[3])?,
            close: Self::value_to_f64(&entry[4])?,
            volume: Self::value_to_f64(&entry[5])?,
        })
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn current_price(&self, symbol: &str) -> BotResult<f64> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        let response = self.client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send().await
            .map_err(|e| BotError::Transport(format!("price request for {}: {}", symbol, e)))?
            .error_for_status()
            .map_err(|e| BotError::Transport(format!("price request for {}: {}", symbol, e)))?;

        let ticker: TickerPriceResponse = response
            .json().await
            .map_err(|e| BotError::Transport(format!("price response for {}: {}", symbol, e)))?;

        let price = ticker.price
            .parse::<f64>()
            .map_err(|e| {
                BotError::Transport(format!("unparseable price for {}: {}", symbol, e))
            })?;

        if is_debug_market_enabled() {
            logger::debug(LogTag::Market, &format!("Current price {}: {}", symbol, price));
        }

        Ok(price)
    }

    async fn recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32
    ) -> BotResult<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit_str = limit.to_string();

        let response = self.client
            .get(&url)
            .query(
                &[
                    ("symbol", symbol),
                    ("interval", interval),
                    ("limit", limit_str.as_str()),
                ]
            )
            .send().await
            .map_err(|e| BotError::Transport(format!("klines request for {}: {}", symbol, e)))?
            .error_for_status()
            .map_err(|e| BotError::Transport(format!("klines request for {}: {}", symbol, e)))?;

        let raw: Vec<Vec<Value>> = response
            .json().await
            .map_err(|e| BotError::Transport(format!("klines response for {}: {}", symbol, e)))?;

        let candles: Vec<Candle> = raw
            .iter()
            .filter_map(|entry| Self::parse_kline(entry))
            .collect();

        logger::info(
            LogTag::Market,
            &format!("Fetched {} candles for {} ({})", candles.len(), symbol, interval)
        );

        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_binance_kline_entries() {
        let entry = vec![
            json!(1700000000000i64),
            json!("50000.10"),
            json!("50100.00"),
            json!("49900.00"),
            json!("50050.25"),
            json!("12.345"),
            json!(1700000059999i64)
        ];
        let candle = BinanceClient::parse_kline(&entry).unwrap();
        assert_eq!(candle.open_time, 1700000000000);
        assert!((candle.close - 50050.25).abs() < 1e-9);
        assert!((candle.volume - 12.345).abs() < 1e-9);
    }

    #[test]
    fn rejects_truncated_kline_entries() {
        let entry = vec![json!(1700000000000i64), json!("1.0")];
        assert!(BinanceClient::parse_kline(&entry).is_none());
    }
}
