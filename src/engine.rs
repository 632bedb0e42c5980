//! Core statistics engine
//!
//! Ties the symbol registry to per-symbol aggregators and exposes the two
//! operations the service layer needs: append a batch, read window stats.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::registry::{Admission, KeyRegistry};
use crate::window::{StreamAggregator, WindowExponent, WindowStats};
use crate::{Result, StatsEngineBuilder, StatsError};

/// Shared handle to one symbol's aggregator
pub type SymbolHandle = Arc<Mutex<StreamAggregator>>;

/// Acknowledgement for an accepted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAck {
    /// Symbol the batch was appended to
    pub symbol: String,
    /// Number of samples appended
    pub points_added: usize,
    /// Whether this batch admitted the symbol
    pub new_symbol: bool,
}

/// In-memory windowed statistics engine
#[derive(Debug)]
pub struct StatsEngine {
    registry: KeyRegistry<Mutex<StreamAggregator>>,
    config: StatsEngineBuilder,
}

impl StatsEngine {
    /// Create an engine from a builder configuration
    pub fn new(config: StatsEngineBuilder) -> Self {
        Self {
            registry: KeyRegistry::with_capacity(config.max_symbols),
            config,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &StatsEngineBuilder {
        &self.config
    }

    /// Append a batch of validated samples to `symbol`, admitting it if new.
    ///
    /// Fails with [`StatsError::CapacityExceeded`] when `symbol` is new and
    /// every slot is taken; nothing is mutated in that case.
    pub fn add_batch(&self, symbol: &str, values: &[f64]) -> Result<BatchAck> {
        let buffer_capacity = self.config.buffer_capacity;
        let admission = self.registry.check_and_create(symbol, || {
            Mutex::new(StreamAggregator::new(buffer_capacity))
        });

        let new_symbol = admission.is_created();
        let Some(handle) = admission.into_handle() else {
            warn!(
                symbol,
                capacity = self.registry.capacity(),
                "rejecting batch for new symbol, capacity reached"
            );
            return Err(StatsError::CapacityExceeded {
                capacity: self.registry.capacity(),
            });
        };

        let points_added = handle.lock().add_batch(values);
        debug!(symbol, points_added, new_symbol, "batch appended");

        Ok(BatchAck {
            symbol: symbol.to_string(),
            points_added,
            new_symbol,
        })
    }

    /// Stats over the trailing `10^k` samples of `symbol`
    pub fn get_stats(&self, symbol: &str, k: WindowExponent) -> Result<WindowStats> {
        let handle = self
            .registry
            .get(symbol)
            .ok_or_else(|| StatsError::UnknownKey(symbol.to_string()))?;

        let mut aggregator = handle.lock();
        aggregator.get_stats(k).map_err(|e| match e {
            StatsError::NoData(_) => StatsError::NoData(symbol.to_string()),
            other => other,
        })
    }

    /// Shared handle to a symbol's aggregator, for inspection
    pub fn symbol(&self, symbol: &str) -> Option<SymbolHandle> {
        self.registry.get(symbol)
    }

    /// Whether `symbol` has been admitted
    pub fn contains(&self, symbol: &str) -> bool {
        self.registry.contains(symbol)
    }

    /// Number of admitted symbols
    pub fn symbol_count(&self) -> usize {
        self.registry.count()
    }

    /// Admitted symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        self.registry.keys()
    }

    /// Maximum number of symbols
    pub fn max_symbols(&self) -> usize {
        self.registry.capacity()
    }

    /// Forget every symbol. Administrative reset only.
    pub fn reset(&self) {
        self.registry.clear();
    }
}

impl Default for StatsEngine {
    fn default() -> Self {
        Self::new(StatsEngineBuilder::default())
    }
}
