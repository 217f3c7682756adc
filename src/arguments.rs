/// Centralized argument handling for the trading bot
///
/// Consolidates command-line argument access and debug flag checking so the
/// rest of the code never touches `std::env::args()` directly.
///
/// Features:
/// - Thread-safe CMD_ARGS storage (overridable from tests and binaries)
/// - Per-module debug flag helpers (--debug-<module>)
/// - Simple flag/value lookup utilities
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args()
        .iter()
        .any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

pub fn is_debug_market_enabled() -> bool {
    has_arg("--debug-market")
}

pub fn is_debug_model_enabled() -> bool {
    has_arg("--debug-model")
}

pub fn is_debug_engine_enabled() -> bool {
    has_arg("--debug-engine")
}

pub fn is_debug_database_enabled() -> bool {
    has_arg("--debug-database")
}

pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Print usage information for the main binary
pub fn print_help() {
    println!("tradebot - simulated ML trading bot");
    println!();
    println!("USAGE:");
    println!("    tradebot [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>       Config file path (default: configs.json)");
    println!("    --quiet               Only show warnings and errors");
    println!("    --debug-market        Verbose market data client logging");
    println!("    --debug-model         Verbose classifier training/inference logging");
    println!("    --debug-engine        Verbose trading cycle logging");
    println!("    --debug-database      Verbose persistence logging");
    println!("    -h, --help            Show this help");
}
