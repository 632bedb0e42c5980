//! Error types for the windowed statistics engine

use thiserror::Error;

use crate::window::{MAX_WINDOW_EXPONENT, MIN_WINDOW_EXPONENT};

/// Main error type for tickstats operations
#[derive(Error, Debug)]
pub enum StatsError {
    /// A new symbol was rejected because the registry is full
    #[error("Maximum number of symbols ({capacity}) reached")]
    CapacityExceeded {
        /// Configured registry capacity
        capacity: usize,
    },

    /// Stats requested for a symbol that was never admitted
    #[error("Symbol not found: {0}")]
    UnknownKey(String),

    /// Symbol is known but holds no samples yet
    #[error("No data available for symbol: {0}")]
    NoData(String),

    /// Window exponent outside the supported range
    #[error("k must be between {min} and {max}, got {0}", min = MIN_WINDOW_EXPONENT, max = MAX_WINDOW_EXPONENT)]
    InvalidWindowExponent(i64),

    /// Symbol failed format validation
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Batch failed validation
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tickstats operations
pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    /// Whether the error was caused by the caller's input rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            StatsError::Configuration(_) | StatsError::TomlParse(_) | StatsError::Io(_)
        )
    }

    /// Message returned to API clients. Kept short and free of internal detail.
    pub fn detail(&self) -> String {
        match self {
            StatsError::CapacityExceeded { capacity } => {
                format!("Maximum number of symbols ({}) reached", capacity)
            }
            StatsError::UnknownKey(_) => "Symbol not found".to_string(),
            StatsError::NoData(_) => "No data available for this symbol".to_string(),
            StatsError::InvalidWindowExponent(_) => format!(
                "k must be between {} and {}",
                MIN_WINDOW_EXPONENT, MAX_WINDOW_EXPONENT
            ),
            StatsError::InvalidSymbol(msg) | StatsError::InvalidBatch(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}
