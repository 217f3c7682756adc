//! Decision engine: turns a feature vector into a trading action with a
//! confidence score and a human-readable justification.
//!
//! Total by contract: whatever the classifier store state (empty, degraded,
//! throwing), `decide` returns a structurally valid `Decision` and never
//! propagates a failure.

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::HashMap;
use std::sync::Arc;

use crate::classifier::{ ClassifierStore, ModelBundle };
use crate::errors::{ BotError, BotResult };
use crate::logger::{ self, LogTag };
use crate::types::{ Decision, TradeAction };

/// Confidence gate applied on the degraded 2-class path only. The 3-class
/// path intentionally has no such gate; both behaviors are preserved as
/// documented.
const TWO_CLASS_CONFIDENCE_GATE: f64 = 0.6;

const DEFAULT_RSI: f64 = 50.0;
const DEFAULT_PRICE_CHANGE: f64 = 0.0;
const DEFAULT_VOLUME: f64 = 1_000_000.0;

pub struct DecisionEngine {
    store: Arc<ClassifierStore>,
}

impl DecisionEngine {
    pub fn new(store: Arc<ClassifierStore>) -> Self {
        Self { store }
    }

    /// Produce a decision for the given (possibly partial) feature mapping.
    pub fn decide(&self, features: &HashMap<String, f64>) -> Decision {
        let bundle = match self.store.snapshot() {
            Some(bundle) => bundle,
            None => {
                logger::warning(LogTag::Decision, "Model not initialized - returning HOLD");
                return Decision {
                    action: TradeAction::Hold,
                    confidence: 0.5,
                    reason: "Model not initialized".to_string(),
                };
            }
        };

        let (action, confidence) = match Self::predict(&bundle, features) {
            Ok((prediction, probabilities)) => {
                map_prediction(&bundle.classes, prediction, &probabilities)
            }
            Err(e) => {
                logger::error(LogTag::Decision, &format!("Prediction failed: {}", e));
                // `BotError::Prediction` already carries the "Prediction
                // error:" prefix in its display form.
                return Decision {
                    action: TradeAction::Hold,
                    confidence: 0.5,
                    reason: e.to_string(),
                };
            }
        };

        let decision = Decision {
            action,
            confidence,
            reason: build_reason(features),
        };

        logger::info(
            LogTag::Decision,
            &format!("Predicted {} (confidence: {:.2})", decision.action, decision.confidence)
        );
        decision
    }

    /// Assemble the ordered feature row, scale it, and run the forest.
    fn predict(
        bundle: &ModelBundle,
        features: &HashMap<String, f64>
    ) -> BotResult<(u32, Vec<f64>)> {
        let row = vec![
            features.get("sma_10").copied().unwrap_or(0.0),
            features.get("sma_50").copied().unwrap_or(0.0),
            features.get("rsi_14").copied().unwrap_or(DEFAULT_RSI),
            features.get("price_change_1m").copied().unwrap_or(DEFAULT_PRICE_CHANGE),
            features.get("volume").copied().unwrap_or(DEFAULT_VOLUME)
        ];

        if row.iter().any(|v| !v.is_finite()) {
            return Err(BotError::Prediction("non-finite feature value".to_string()));
        }

        let scaled = bundle.scaler.transform_row(&row);
        let matrix = DenseMatrix::from_2d_vec(&vec![scaled]).map_err(|e|
            BotError::Prediction(format!("feature matrix: {}", e))
        )?;

        let predictions = bundle.forest
            .predict(&matrix)
            .map_err(|e| BotError::Prediction(format!("predict: {}", e)))?;
        let prediction = *predictions
            .first()
            .ok_or_else(|| BotError::Prediction("empty prediction".to_string()))?;

        let proba = bundle.forest
            .predict_proba(&matrix)
            .map_err(|e| BotError::Prediction(format!("predict_proba: {}", e)))?;
        let probabilities: Vec<f64> = (0..bundle.classes.len())
            .map(|col| *proba.get((0, col)))
            .collect();

        Ok((prediction, probabilities))
    }
}

fn class_to_action(class: u32) -> Option<TradeAction> {
    match class {
        0 => Some(TradeAction::Buy),
        1 => Some(TradeAction::Sell),
        2 => Some(TradeAction::Hold),
        _ => None,
    }
}

/// Map a predicted class and its per-class probabilities to an action and a
/// confidence score.
///
/// 2-class path: predictions below the confidence gate are forced to HOLD
/// with confidence `1 - p`. 3-class path: the mapped action is used directly;
/// an out-of-table class degrades to HOLD with that class's own probability.
pub(crate) fn map_prediction(
    classes: &[u32],
    prediction: u32,
    probabilities: &[f64]
) -> (TradeAction, f64) {
    let predicted_probability = classes
        .iter()
        .position(|c| *c == prediction)
        .and_then(|idx| probabilities.get(idx).copied());

    if classes.len() == 2 {
        logger::warning(
            LogTag::Decision,
            "Model exposes only 2 classes - applying confidence gate"
        );
        let p = predicted_probability.unwrap_or(0.5);
        if p < TWO_CLASS_CONFIDENCE_GATE {
            return (TradeAction::Hold, 1.0 - p);
        }
        return match class_to_action(prediction) {
            Some(action) => (action, p),
            None => (TradeAction::Hold, 0.5),
        };
    }

    match class_to_action(prediction) {
        Some(action) => (action, predicted_probability.unwrap_or(0.5)),
        None => {
            logger::warning(
                LogTag::Decision,
                &format!("Model predicted unknown class {} - using HOLD", prediction)
            );
            (TradeAction::Hold, predicted_probability.unwrap_or(0.5))
        }
    }
}

/// Build the justification string from three independent signal checks:
/// moving-average relationship, RSI bounds, and momentum sign.
pub(crate) fn build_reason(features: &HashMap<String, f64>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    let sma_10 = features.get("sma_10").copied().unwrap_or(0.0);
    let sma_50 = features.get("sma_50").copied().unwrap_or(0.0);
    if sma_10 > sma_50 {
        parts.push("Price above SMA_50");
    } else {
        parts.push("Price below SMA_50");
    }

    let rsi = features.get("rsi_14").copied().unwrap_or(DEFAULT_RSI);
    if rsi > 70.0 {
        parts.push("RSI overbought");
    } else if rsi < 30.0 {
        parts.push("RSI oversold");
    }

    let price_change = features.get("price_change_1m").copied().unwrap_or(0.0);
    if price_change > 0.0 {
        parts.push("positive trend");
    } else {
        parts.push("negative trend");
    }

    if parts.is_empty() {
        "No clear signal".to_string()
    } else {
        parts.join(", ")
    }
}
