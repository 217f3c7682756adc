use std::path::Path;
use std::sync::Arc;

use tradebot::arguments;
use tradebot::classifier::{ ClassifierStore, LoadOutcome };
use tradebot::config::{ self, get_configs };
use tradebot::database::TradeStore;
use tradebot::decision::DecisionEngine;
use tradebot::engine::TradingEngine;
use tradebot::execution::ExecutionAgent;
use tradebot::logger::{ self, LogTag };
use tradebot::market_data::{ BinanceClient, MarketDataSource };
use tradebot::web_server::{ start_web_server, AppState };

#[tokio::main]
async fn main() {
    arguments::set_cmd_args(std::env::args().collect());
    logger::init();

    if arguments::is_help_requested() {
        arguments::print_help();
        std::process::exit(0);
    }

    logger::info(LogTag::System, "Trading bot starting up...");

    let config_path = arguments
        ::get_arg_value("--config")
        .unwrap_or_else(|| "configs.json".to_string());
    if let Err(e) = config::load_configs(&config_path) {
        logger::error(LogTag::Config, &format!("Failed to load {}: {}", config_path, e));
        std::process::exit(1);
    }
    let configs = get_configs();

    let trades = match TradeStore::open(&configs.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            logger::error(
                LogTag::Database,
                &format!("Failed to open {}: {}", configs.database_path, e)
            );
            std::process::exit(1);
        }
    };

    let market: Arc<dyn MarketDataSource> = Arc::new(
        BinanceClient::new(configs.binance_base_url.clone())
    );
    let store = Arc::new(ClassifierStore::new(configs.model_threshold_percent));

    bootstrap_model(
        &store,
        market.as_ref(),
        &configs.default_symbol,
        &configs.default_interval,
        configs.default_klines_limit,
        configs.model_path.as_deref()
    ).await;

    let engine = Arc::new(
        TradingEngine::new(
            market,
            DecisionEngine::new(store),
            ExecutionAgent::new(
                trades.clone(),
                configs.execution_confidence_min,
                configs.slippage_percent
            ),
            configs.default_interval.clone(),
            configs.default_klines_limit
        )
    );

    let state = AppState { engine, trades };
    if let Err(e) = start_web_server(state).await {
        logger::error(LogTag::Web, &format!("Web server stopped: {}", e));
        std::process::exit(1);
    }
}

/// Get the classifier into a usable state before serving traffic.
///
/// Order of preference: load a saved model, retrain from live candles,
/// fall back to a synthetic model. Every step degrades with a log line
/// instead of aborting; the decision engine answers HOLD until one of them
/// succeeds.
async fn bootstrap_model(
    store: &ClassifierStore,
    market: &dyn MarketDataSource,
    symbol: &str,
    interval: &str,
    klines_limit: u32,
    model_path: Option<&str>
) {
    if let Some(path) = model_path {
        match store.load(Path::new(path)) {
            Ok(LoadOutcome::Ready) => {
                logger::info(LogTag::Model, &format!("Loaded model from {}", path));
                return;
            }
            Ok(LoadOutcome::InsufficientClasses(found)) => {
                logger::warning(
                    LogTag::Model,
                    &format!("Saved model covers only {} classes - retraining", found)
                );
            }
            Err(e) => {
                logger::warning(LogTag::Model, &format!("Could not load {}: {}", path, e));
            }
        }
    }

    let candles = match market.recent_candles(symbol, interval, klines_limit).await {
        Ok(candles) => candles,
        Err(e) => {
            logger::warning(
                LogTag::Model,
                &format!("Market unavailable for training ({}), using synthetic data", e)
            );
            Vec::new()
        }
    };

    if let Err(e) = store.train(&candles) {
        logger::error(LogTag::Model, &format!("Training failed: {}", e));
        return;
    }
    logger::info(LogTag::Model, "Model trained and installed");

    if let Some(path) = model_path {
        if let Err(e) = store.save(Path::new(path)) {
            logger::warning(LogTag::Model, &format!("Could not save model to {}: {}", path, e));
        }
    }
}
