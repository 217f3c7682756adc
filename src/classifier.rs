//! Classifier store: owns the trained random forest and its input scaler.
//!
//! The store is either "empty" (no predictions possible) or "ready" (exactly
//! 3 classes, scaler fitted); nothing in between is ever observable. Readers
//! take an `Arc` snapshot of the whole bundle, so a retrain swap is atomic
//! from their perspective.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{ Rng, SeedableRng };
use serde::{ Deserialize, Serialize };
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier,
    RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::SplitCriterion;
use std::fs;
use std::path::Path;
use std::sync::{ Arc, RwLock };

use crate::errors::{ BotError, BotResult };
use crate::indicators;
use crate::labels;
use crate::logger::{ self, LogTag };
use crate::market_data::Candle;

/// Ordered training feature columns; inference must scale in the same order.
pub const TRAINING_FEATURES: [&str; 5] = ["sma_10", "sma_50", "rsi", "price_change", "volume"];

const MIN_TRAINING_ROWS: usize = 20;
const SYNTHETIC_SAMPLES_PER_CLASS: usize = 20;
const FOREST_SEED: u64 = 42;

pub type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Zero-mean/unit-variance scaler fitted per feature column.
/// Constant columns keep a unit deviation so transform stays finite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl FeatureScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let columns = rows.first().map_or(0, |r| r.len());
        let mut means = vec![0.0; columns];
        let mut stds = vec![1.0; columns];
        if rows.is_empty() {
            return Self { means, stds };
        }

        let n = rows.len() as f64;
        for col in 0..columns {
            let mean =
                rows.iter()
                    .map(|r| r[col])
                    .sum::<f64>() / n;
            let variance =
                rows.iter()
                    .map(|r| (r[col] - mean).powi(2))
                    .sum::<f64>() / n;
            means[col] = mean;
            let std = variance.sqrt();
            stds[col] = if std > 0.0 { std } else { 1.0 };
        }

        Self { means, stds }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(col, value)| {
                let mean = self.means.get(col).copied().unwrap_or(0.0);
                let std = self.stds.get(col).copied().unwrap_or(1.0);
                (value - mean) / std
            })
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| self.transform_row(row))
            .collect()
    }
}

/// Immutable trained state: forest + scaler + the class list the forest was
/// fitted on. Swapped as a whole, never mutated in place.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelBundle {
    pub forest: Forest,
    pub scaler: FeatureScaler,
    pub classes: Vec<u32>,
}

/// Outcome of restoring a persisted model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// All three classes present, store is fully ready
    Ready,
    /// Model installed but with fewer than 3 classes; caller should retrain
    InsufficientClasses(usize),
}

pub struct ClassifierStore {
    inner: RwLock<Option<Arc<ModelBundle>>>,
    threshold_percent: f64,
}

impl ClassifierStore {
    pub fn new(threshold_percent: f64) -> Self {
        Self {
            inner: RwLock::new(None),
            threshold_percent,
        }
    }

    /// Whether a trained bundle is installed
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Atomic read of the current bundle. Callers hold the `Arc` for the
    /// duration of one prediction; a concurrent retrain never tears it.
    pub fn snapshot(&self) -> Option<Arc<ModelBundle>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }

    fn install(&self, bundle: ModelBundle) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(Arc::new(bundle));
        }
    }

    /// Per-row rolling features over the candle history, in
    /// `TRAINING_FEATURES` order. Non-finite values are zeroed.
    pub fn build_training_rows(candles: &[Candle]) -> Vec<Vec<f64>> {
        let closes: Vec<f64> = candles
            .iter()
            .map(|c| c.close)
            .collect();

        candles
            .iter()
            .enumerate()
            .map(|(i, candle)| {
                let prefix = &closes[..=i];
                let row = vec![
                    indicators::sma(prefix, 10),
                    indicators::sma(prefix, 50),
                    indicators::rsi(prefix, 14),
                    indicators::price_change_pct(prefix),
                    candle.volume
                ];
                row.into_iter()
                    .map(|v| if v.is_finite() { v } else { 0.0 })
                    .collect()
            })
            .collect()
    }

    /// Train on candle history. Insufficient history degrades to synthetic
    /// balanced data so the store always ends up ready with exactly 3
    /// classes; other failures propagate.
    pub fn train(&self, candles: &[Candle]) -> BotResult<()> {
        let rows = Self::build_training_rows(candles);

        let bundle = match self.fit_from_history(rows) {
            Ok(bundle) => bundle,
            Err(BotError::DataInsufficient(detail)) => {
                logger::warning(
                    LogTag::Model,
                    &format!("{} - training on synthetic balanced data", detail)
                );
                Self::fit_synthetic()?
            }
            Err(e) => {
                return Err(e);
            }
        };

        logger::info(
            LogTag::Model,
            &format!("Model trained on classes: {:?}", bundle.classes)
        );
        self.install(bundle);
        Ok(())
    }

    /// Fit on real history, or refuse with `DataInsufficient` when there is
    /// too little of it to label meaningfully.
    fn fit_from_history(&self, rows: Vec<Vec<f64>>) -> BotResult<ModelBundle> {
        if rows.len() < MIN_TRAINING_ROWS {
            return Err(
                BotError::DataInsufficient(
                    format!("only {} usable rows, need {}", rows.len(), MIN_TRAINING_ROWS)
                )
            );
        }

        let sma_10: Vec<f64> = rows
            .iter()
            .map(|r| r[0])
            .collect();
        let price_change: Vec<f64> = rows
            .iter()
            .map(|r| r[3])
            .collect();
        let targets = labels::build_balanced_labels(
            &sma_10,
            &price_change,
            self.threshold_percent
        );
        Self::fit_bundle(rows, targets)
    }

    /// Serialize {forest, scaler, classes} atomically to `path`, creating
    /// parent directories as needed.
    pub fn save(&self, path: &Path) -> BotResult<()> {
        let bundle = self.snapshot().ok_or(BotError::NotTrained)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = bincode
            ::serialize(&*bundle)
            .map_err(|e| BotError::ModelFile(format!("serialize failed: {}", e)))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;

        logger::info(LogTag::Model, &format!("Model saved to {}", path.display()));
        Ok(())
    }

    /// Restore a persisted bundle. A missing or corrupt file is a
    /// `ModelFile` error; a bundle with fewer than 3 classes is installed
    /// but reported so the caller can retrain.
    pub fn load(&self, path: &Path) -> BotResult<LoadOutcome> {
        let bytes = fs
            ::read(path)
            .map_err(|e| BotError::ModelFile(format!("{}: {}", path.display(), e)))?;

        let bundle: ModelBundle = bincode
            ::deserialize(&bytes)
            .map_err(|e| BotError::ModelFile(format!("{}: {}", path.display(), e)))?;

        let found = bundle.classes.len();
        self.install(bundle);

        if found < 3 {
            logger::warning(
                LogTag::Model,
                &format!(
                    "Loaded model exposes only {} classes - retraining recommended",
                    found
                )
            );
            Ok(LoadOutcome::InsufficientClasses(found))
        } else {
            logger::info(LogTag::Model, &format!("Model loaded from {}", path.display()));
            Ok(LoadOutcome::Ready)
        }
    }

    fn sorted_classes(labels: &[u32]) -> Vec<u32> {
        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Duplicate minority-class rows until every class matches the majority
    /// count. Deterministic stand-in for per-class sample weights.
    fn oversample_balanced(rows: &mut Vec<Vec<f64>>, targets: &mut Vec<u32>) {
        let classes = Self::sorted_classes(targets);
        let max_count = classes
            .iter()
            .map(|class| {
                targets
                    .iter()
                    .filter(|t| *t == class)
                    .count()
            })
            .max()
            .unwrap_or(0);

        for class in classes {
            let indices: Vec<usize> = targets
                .iter()
                .enumerate()
                .filter(|(_, t)| **t == class)
                .map(|(i, _)| i)
                .collect();
            let mut need = max_count - indices.len();
            let mut cursor = 0;
            while need > 0 {
                let idx = indices[cursor % indices.len()];
                let row = rows[idx].clone();
                rows.push(row);
                targets.push(class);
                cursor += 1;
                need -= 1;
            }
        }
    }

    fn fit_forest(rows: &[Vec<f64>], targets: &[u32]) -> BotResult<(Forest, Vec<u32>)> {
        let matrix = DenseMatrix::from_2d_vec(&rows.to_vec()).map_err(|e|
            BotError::Training(format!("feature matrix: {}", e))
        )?;

        let parameters = RandomForestClassifierParameters {
            criterion: SplitCriterion::Gini,
            max_depth: Some(10), // Limit depth to prevent overfitting
            min_samples_leaf: 1,
            min_samples_split: 2,
            n_trees: 50,
            m: None,
            keep_samples: false,
            seed: FOREST_SEED, // Fixed seed for reproducibility
        };

        let forest = RandomForestClassifier::fit(&matrix, &targets.to_vec(), parameters).map_err(
            |e| BotError::Training(format!("forest fit: {}", e))
        )?;

        Ok((forest, Self::sorted_classes(targets)))
    }

    /// Fit scaler + forest on a deterministic 80/20 split, with the
    /// consolidated three-class invariant enforced before and after the fit.
    fn fit_bundle(rows: Vec<Vec<f64>>, targets: Vec<u32>) -> BotResult<ModelBundle> {
        let n = rows.len();
        let mut indices: Vec<usize> = (0..n).collect();

        let train_indices: Vec<usize> = if n > 10 {
            let mut rng = StdRng::seed_from_u64(FOREST_SEED);
            indices.shuffle(&mut rng);
            let train_len = ((n as f64) * 0.8).round() as usize;
            indices[..train_len.max(1)].to_vec()
        } else {
            indices
        };

        let x_train: Vec<Vec<f64>> = train_indices
            .iter()
            .map(|i| rows[*i].clone())
            .collect();
        let mut y_train: Vec<u32> = train_indices
            .iter()
            .map(|i| targets[*i])
            .collect();

        // The split can drop a minority class; repair before fitting.
        labels::ensure_three_classes(&mut y_train);

        let scaler = FeatureScaler::fit(&x_train);
        let mut x_scaled = scaler.transform(&x_train);
        Self::oversample_balanced(&mut x_scaled, &mut y_train);

        let (mut forest, mut classes) = Self::fit_forest(&x_scaled, &y_train)?;

        if classes.len() < 3 {
            logger::warning(
                LogTag::Model,
                &format!(
                    "Fitted forest exposes only {} classes - injecting missing classes and refitting",
                    classes.len()
                )
            );
            labels::ensure_three_classes(&mut y_train);
            let refit = Self::fit_forest(&x_scaled, &y_train)?;
            forest = refit.0;
            classes = refit.1;
        }

        if classes.len() < 3 {
            return Err(BotError::ClassCoverage { found: classes.len() });
        }

        Ok(ModelBundle { forest, scaler, classes })
    }

    /// Balanced synthetic fallback: 20 samples per class on random features.
    fn fit_synthetic() -> BotResult<ModelBundle> {
        let mut rng = StdRng::seed_from_u64(FOREST_SEED);
        let total = SYNTHETIC_SAMPLES_PER_CLASS * 3;

        let rows: Vec<Vec<f64>> = (0..total)
            .map(|_| {
                (0..TRAINING_FEATURES.len()).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect()
            })
            .collect();
        let targets: Vec<u32> = (0..total)
            .map(|i| (i / SYNTHETIC_SAMPLES_PER_CLASS) as u32)
            .collect();

        Self::fit_bundle(rows, targets)
    }
}
