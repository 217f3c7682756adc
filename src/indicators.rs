//! Indicator engine: converts raw candle history into the fixed feature set
//! consumed by the classifier.
//!
//! Pure and total: every function tolerates short or empty inputs by
//! returning a documented default instead of failing.

use std::collections::HashMap;

use crate::market_data::Candle;

/// Simple moving average over the last `window` prices.
/// With fewer than `window` points, falls back to the most recent price
/// (or 0 with no points at all).
pub fn sma(prices: &[f64], window: usize) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    if prices.len() < window || window == 0 {
        return prices[prices.len() - 1];
    }
    let tail = &prices[prices.len() - window..];
    tail.iter().sum::<f64>() / (window as f64)
}

/// Relative strength index over the last `period` deltas.
///
/// Average-gain/average-loss variant: with no losses the result saturates at
/// 100; with fewer than `period + 1` points the neutral value 50 is returned.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 50.0;
    }

    let deltas: Vec<f64> = prices
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .collect();
    let recent = &deltas[deltas.len() - period..];

    let avg_gain: f64 =
        recent
            .iter()
            .filter(|d| **d > 0.0)
            .sum::<f64>() / (period as f64);
    let avg_loss: f64 =
        -recent
            .iter()
            .filter(|d| **d < 0.0)
            .sum::<f64>() / (period as f64);

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Percent change between the last two prices; 0 with fewer than two points.
pub fn price_change_pct(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let prev = prices[prices.len() - 2];
    let last = prices[prices.len() - 1];
    if prev == 0.0 {
        return 0.0;
    }
    (last - prev) / prev * 100.0
}

/// Extract the feature mapping from a chronological candle sequence.
///
/// Output keys: sma_10, sma_50, rsi_14, current_price, price_change_1m.
/// An empty candle sequence yields an empty mapping.
pub fn extract_features(candles: &[Candle]) -> HashMap<String, f64> {
    if candles.is_empty() {
        return HashMap::new();
    }

    let closes: Vec<f64> = candles
        .iter()
        .map(|c| c.close)
        .collect();

    let mut features = HashMap::new();
    features.insert("sma_10".to_string(), sma(&closes, 10));
    features.insert("sma_50".to_string(), sma(&closes, 50));
    features.insert("rsi_14".to_string(), rsi(&closes, 14));
    features.insert("current_price".to_string(), closes[closes.len() - 1]);
    features.insert("price_change_1m".to_string(), price_change_pct(&closes));
    features
}
