pub mod arguments;
pub mod classifier; // Random-forest model store
pub mod config;
pub mod database; // Trade persistence (sqlite)
pub mod decision;
pub mod engine; // Cycle orchestrator
pub mod errors;
pub mod execution;
pub mod indicators;
pub mod labels; // Training label construction
pub mod logger;
pub mod market_data;
pub mod types;
pub mod web_server;
