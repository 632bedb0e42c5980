//! In-memory windowed statistics over per-symbol numeric streams
//!
//! This library ingests batches of samples tagged by a symbol and answers
//! min / max / last / average / population-variance queries over the
//! trailing `10^k` samples of a symbol, for `k` in `1..=8`. A fixed number of
//! symbols is tracked at once; each keeps a bounded ring buffer mirrored by a
//! lazily rebuilt segment tree and a small per-window results cache.
//!
//! # Example
//!
//! ```
//! use tickstats::{StatsEngineBuilder, WindowExponent};
//!
//! # fn example() -> tickstats::Result<()> {
//! let engine = StatsEngineBuilder::new().max_symbols(10).build();
//!
//! let values: Vec<f64> = (1..=20).map(f64::from).collect();
//! engine.add_batch("AAPL", &values)?;
//!
//! let stats = engine.get_stats("AAPL", WindowExponent::new(1)?)?;
//! assert_eq!(stats.min, 11.0);
//! assert_eq!(stats.max, 20.0);
//! assert_eq!(stats.avg, 15.5);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

// Re-export commonly used items
pub use config::Config;
pub use engine::{BatchAck, StatsEngine};
pub use error::{Result, StatsError};
pub use registry::{Admission, KeyRegistry};
pub use window::{StreamAggregator, WindowExponent, WindowStats};

/// Error types
pub mod error;

/// Ring buffer, range tree, stats cache and per-symbol aggregator
pub mod window;

/// Capacity-bounded symbol registry
pub mod registry;

/// Core engine implementation
pub mod engine;

/// Request validation
pub mod validate;

/// TOML and environment configuration
pub mod config;

/// HTTP service layer with axum
#[cfg(feature = "service")]
pub mod service;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize JSON tracing at `info`, unless `RUST_LOG` says otherwise
pub fn init_tracing() {
    init_tracing_with("info");
}

/// Initialize JSON tracing, using `default_directive` when `RUST_LOG` is unset or invalid
pub fn init_tracing_with(default_directive: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// `RUST_LOG` filter, falling back to `default_directive`
pub fn env_filter(default_directive: &str) -> tracing_subscriber::EnvFilter {
    let rust_log = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    parse_env_filter(rust_log.as_deref(), default_directive)
}

fn parse_env_filter(
    rust_log: Option<&str>,
    default_directive: &str,
) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}

/// Builder for configuring the stats engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsEngineBuilder {
    /// Maximum number of symbols tracked at once
    pub max_symbols: usize,
    /// Samples retained per symbol
    pub buffer_capacity: usize,
}

impl Default for StatsEngineBuilder {
    fn default() -> Self {
        Self {
            max_symbols: registry::DEFAULT_MAX_SYMBOLS,
            buffer_capacity: window::DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl StatsEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the symbol capacity
    pub fn max_symbols(mut self, max: usize) -> Self {
        self.max_symbols = max;
        self
    }

    /// Set the per-symbol retention bound
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Build the engine
    pub fn build(self) -> StatsEngine {
        StatsEngine::new(self)
    }
}
