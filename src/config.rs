use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use crate::logger::{ self, LogTag };

/// Main bot configuration
///
/// Loaded from a JSON config file (configs.json by default). Every field has
/// a default so the bot runs without any file present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    // Exchange settings
    pub binance_base_url: String,

    // Trading parameters
    pub default_symbol: String,
    pub default_interval: String,
    pub default_klines_limit: u32,

    // ML model
    pub model_threshold_percent: f64,
    pub model_path: Option<String>,

    // Persistence
    pub database_path: String,

    // Web API
    pub web_bind: String,

    // Simulated execution
    pub execution_confidence_min: f64,
    pub slippage_percent: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            binance_base_url: "https://api.binance.com".to_string(),
            default_symbol: "BTCUSDT".to_string(),
            default_interval: "1m".to_string(),
            default_klines_limit: 100,
            model_threshold_percent: 0.5,
            model_path: None,
            database_path: "trading.db".to_string(),
            web_bind: "127.0.0.1:8080".to_string(),
            execution_confidence_min: 0.6,
            slippage_percent: 0.01,
        }
    }
}

/// Global runtime configuration
pub static CONFIGS: Lazy<RwLock<BotConfig>> = Lazy::new(|| RwLock::new(BotConfig::default()));

/// Read a config file and install it as the global configuration.
/// A missing file is not an error: defaults stay in effect.
pub fn load_configs<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        logger::info(
            LogTag::Config,
            &format!("No config file at {} - using defaults", path.display())
        );
        return Ok(());
    }

    let data = fs::read_to_string(path)?;
    let config: BotConfig = serde_json::from_str(&data)?;
    if let Ok(mut configs) = CONFIGS.write() {
        *configs = config;
    }
    logger::info(LogTag::Config, &format!("Loaded configuration from {}", path.display()));
    Ok(())
}

/// Get a copy of the current configuration
pub fn get_configs() -> BotConfig {
    match CONFIGS.read() {
        Ok(configs) => configs.clone(),
        Err(_) => BotConfig::default(),
    }
}
