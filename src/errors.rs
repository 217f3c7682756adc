use thiserror::Error;

/// Structured error types for the trading bot.
///
/// Every variant maps to one failure class of the pipeline. The orchestrator
/// never lets these escape to the API caller: they are absorbed into the
/// `status`/`reason` fields of the cycle result.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")] Config(String),

    #[error("Insufficient data: {0}")] DataInsufficient(String),

    #[error("Class coverage error: expected 3 classes, found {found}")] ClassCoverage {
        found: usize,
    },

    #[error("Model not trained")] NotTrained,

    #[error("Training error: {0}")] Training(String),

    #[error("Model file error: {0}")] ModelFile(String),

    #[error("Transport error: {0}")] Transport(String),

    #[error("Storage error: {0}")] Storage(#[from] rusqlite::Error),

    #[error("Prediction error: {0}")] Prediction(String),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),
}

impl BotError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BotError::Transport(_) | BotError::Storage(_))
    }
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_recoverable() {
        assert!(BotError::Transport("timeout".to_string()).is_recoverable());
        assert!(!BotError::NotTrained.is_recoverable());
        assert!(!BotError::DataInsufficient("3 rows".to_string()).is_recoverable());
    }
}
