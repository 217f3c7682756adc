//! Label builder for classifier training.
//!
//! Converts a feature-bearing historical series into the three-class target
//! (rise / fall / flat) and repairs class balance so downstream training
//! always sees all three classes.

use crate::arguments::is_debug_model_enabled;
use crate::logger::{ self, LogTag };

/// Price expected to rise beyond +threshold
pub const LABEL_RISE: u32 = 0;
/// Price expected to fall beyond -threshold
pub const LABEL_FALL: u32 = 1;
/// No significant expected move
pub const LABEL_FLAT: u32 = 2;

/// Number of distinct label codes present
pub fn distinct_classes(labels: &[u32]) -> usize {
    let mut seen = [false; 3];
    for label in labels {
        if (*label as usize) < 3 {
            seen[*label as usize] = true;
        }
    }
    seen.iter()
        .filter(|s| **s)
        .count()
}

/// Build raw labels from the forward change of the smoothed price proxy.
///
/// For each row except the last, the label reflects the percent change of
/// `sma_10` to the next row against `threshold_percent`. The final row has no
/// lookahead and is always flat. A zero base value is labeled flat to avoid
/// division by zero.
pub fn build_labels(sma_10: &[f64], threshold_percent: f64) -> Vec<u32> {
    let mut labels = Vec::with_capacity(sma_10.len());
    if sma_10.is_empty() {
        return labels;
    }

    for i in 0..sma_10.len() - 1 {
        let current = sma_10[i];
        if current == 0.0 {
            labels.push(LABEL_FLAT);
            continue;
        }

        let change_pct = ((sma_10[i + 1] - current) / current) * 100.0;
        if change_pct > threshold_percent {
            labels.push(LABEL_RISE);
        } else if change_pct < -threshold_percent {
            labels.push(LABEL_FALL);
        } else {
            labels.push(LABEL_FLAT);
        }
    }
    labels.push(LABEL_FLAT);

    labels
}

/// Reassign the rows with the smallest absolute price change to flat.
/// Touches at most 20% of the rows (minimum 1).
fn reassign_quietest_to_flat(labels: &mut [u32], price_change: &[f64]) {
    let mut order: Vec<usize> = (0..price_change.len()).collect();
    order.sort_by(|a, b| {
        price_change[*a]
            .abs()
            .partial_cmp(&price_change[*b].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let count = (price_change.len() / 5).max(1);
    for idx in order.into_iter().take(count) {
        if idx < labels.len() {
            labels[idx] = LABEL_FLAT;
        }
    }
}

/// Last-resort repair: force one representative of every missing class.
///
/// Overwrites boundary rows (first row for rise, second for fall, last for
/// flat) so a training call never sees fewer than 3 classes. Requires at
/// least 3 rows; shorter inputs are left as-is (the classifier store falls
/// back to synthetic data well before this point).
pub fn ensure_three_classes(labels: &mut [u32]) {
    if labels.len() < 3 {
        return;
    }
    if !labels.contains(&LABEL_RISE) {
        labels[0] = LABEL_RISE;
    }
    if !labels.contains(&LABEL_FALL) {
        labels[1] = LABEL_FALL;
    }
    if !labels.contains(&LABEL_FLAT) {
        let last = labels.len() - 1;
        labels[last] = LABEL_FLAT;
    }
}

/// Build the training target with class-balance repair applied.
///
/// `sma_10` is the forward-looking price proxy; `price_change` is the
/// per-row percent change used to pick repair candidates.
pub fn build_balanced_labels(
    sma_10: &[f64],
    price_change: &[f64],
    threshold_percent: f64
) -> Vec<u32> {
    let mut labels = build_labels(sma_10, threshold_percent);

    let found = distinct_classes(&labels);
    if found < 3 && !labels.is_empty() {
        if is_debug_model_enabled() {
            logger::debug(
                LogTag::Model,
                &format!("Only {} label classes present - rebalancing quiet rows to flat", found)
            );
        }
        reassign_quietest_to_flat(&mut labels, price_change);
    }

    if distinct_classes(&labels) < 3 {
        logger::warning(
            LogTag::Model,
            "Label rebalancing left fewer than 3 classes - forcing boundary rows"
        );
        ensure_three_classes(&mut labels);
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_split_rise_fall_flat() {
        // +2%, -2%, +0.1% moves against a 0.5% threshold
        let sma = vec![100.0, 102.0, 99.96, 100.06];
        let labels = build_labels(&sma, 0.5);
        assert_eq!(labels, vec![LABEL_RISE, LABEL_FALL, LABEL_FLAT, LABEL_FLAT]);
    }

    #[test]
    fn final_row_is_always_flat() {
        let sma = vec![100.0, 110.0, 121.0];
        let labels = build_labels(&sma, 0.5);
        assert_eq!(*labels.last().unwrap(), LABEL_FLAT);
    }

    #[test]
    fn zero_base_value_is_flat_not_a_division() {
        let sma = vec![0.0, 50.0, 51.0];
        let labels = build_labels(&sma, 0.5);
        assert_eq!(labels[0], LABEL_FLAT);
    }

    #[test]
    fn balanced_labels_always_cover_three_classes() {
        // Strictly rising series: raw labels would be all-rise plus the
        // trailing flat, never any fall.
        let sma: Vec<f64> = (0..50).map(|i| 100.0 * (1.01f64).powi(i)).collect();
        let change: Vec<f64> = vec![1.0; 50];
        let labels = build_balanced_labels(&sma, &change, 0.5);
        assert_eq!(labels.len(), 50);
        assert_eq!(distinct_classes(&labels), 3);
    }

    #[test]
    fn flat_series_still_covers_three_classes() {
        let sma = vec![100.0; 30];
        let change = vec![0.0; 30];
        let labels = build_balanced_labels(&sma, &change, 0.5);
        assert_eq!(distinct_classes(&labels), 3);
    }

    #[test]
    fn ensure_three_classes_overwrites_boundary_rows() {
        let mut labels = vec![LABEL_FLAT; 10];
        ensure_three_classes(&mut labels);
        assert_eq!(labels[0], LABEL_RISE);
        assert_eq!(labels[1], LABEL_FALL);
        assert_eq!(distinct_classes(&labels), 3);
    }

    #[test]
    fn ensure_three_classes_leaves_tiny_inputs_alone() {
        let mut labels = vec![LABEL_FLAT, LABEL_FLAT];
        ensure_three_classes(&mut labels);
        assert_eq!(labels, vec![LABEL_FLAT, LABEL_FLAT]);
    }
}
