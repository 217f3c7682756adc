//! Structured console logging for the trading bot
//!
//! Provides tagged, leveled logging with:
//! - Standard levels (Error/Warning/Info/Debug)
//! - Per-module debug gating via --debug-<module> flags
//! - --quiet mode that suppresses everything below warnings
//!
//! Usage:
//! ```rust
//! use tradebot::logger::{self, LogTag};
//!
//! logger::info(LogTag::Engine, "Cycle 7 completed");
//! logger::debug(LogTag::Model, "Scaled features: ..."); // only with --debug-model
//! ```

use chrono::Utc;
use colored::*;
use std::io::{ self, Write };

use crate::arguments;

/// Module tags for log attribution and debug filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Config,
    Market,
    Model,
    Decision,
    Execution,
    Database,
    Engine,
    Web,
}

impl LogTag {
    /// Short label shown in the console output
    pub fn label(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Market => "MARKET",
            LogTag::Model => "MODEL",
            LogTag::Decision => "DECISION",
            LogTag::Execution => "EXECUTION",
            LogTag::Database => "DATABASE",
            LogTag::Engine => "ENGINE",
            LogTag::Web => "WEB",
        }
    }

    /// Whether --debug-<module> is enabled for this tag
    fn debug_enabled(&self) -> bool {
        match self {
            LogTag::Market => arguments::is_debug_market_enabled(),
            LogTag::Model | LogTag::Decision => arguments::is_debug_model_enabled(),
            LogTag::Engine | LogTag::Execution => arguments::is_debug_engine_enabled(),
            LogTag::Database => arguments::is_debug_database_enabled(),
            _ => false,
        }
    }
}

/// Log levels ordered by severity (Error < Warning < Info < Debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Initialize the logger system
///
/// Call once at startup before any logging occurs. Currently this only
/// validates argument access so poisoned-mutex fallbacks are exercised early.
pub fn init() {
    let _ = arguments::get_cmd_args();
}

/// Filtering rules:
/// 1. Errors are always shown
/// 2. --quiet suppresses Info and below
/// 3. Debug level requires the --debug-<module> flag for the tag
fn should_log(tag: LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }
    if arguments::is_quiet_enabled() && level > LogLevel::Warning {
        return false;
    }
    if level == LogLevel::Debug {
        return tag.debug_enabled();
    }
    true
}

fn write_line(tag: LogTag, level: LogLevel, message: &str) {
    let timestamp = Utc::now().format("%H:%M:%S").to_string();
    let tag_label = match level {
        LogLevel::Error => tag.label().red().bold(),
        LogLevel::Warning => tag.label().yellow().bold(),
        LogLevel::Info => tag.label().cyan().bold(),
        LogLevel::Debug => tag.label().purple().bold(),
    };
    let body = match level {
        LogLevel::Error => message.red().to_string(),
        LogLevel::Warning => message.yellow().to_string(),
        LogLevel::Debug => message.dimmed().to_string(),
        LogLevel::Info => message.to_string(),
    };
    println!(
        "{} {} {} {}",
        format!("[{}]", timestamp).dimmed(),
        level.as_str().bold(),
        tag_label,
        body
    );
    let _ = io::stdout().flush();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    if should_log(tag, LogLevel::Error) {
        write_line(tag, LogLevel::Error, message);
    }
}

/// Log at WARNING level (shown unless explicitly disabled)
pub fn warning(tag: LogTag, message: &str) {
    if should_log(tag, LogLevel::Warning) {
        write_line(tag, LogLevel::Warning, message);
    }
}

/// Log at INFO level (standard operational messages)
pub fn info(tag: LogTag, message: &str) {
    if should_log(tag, LogLevel::Info) {
        write_line(tag, LogLevel::Info, message);
    }
}

/// Log at DEBUG level (gated by --debug-<module>)
pub fn debug(tag: LogTag, message: &str) {
    if should_log(tag, LogLevel::Debug) {
        write_line(tag, LogLevel::Debug, message);
    }
}
