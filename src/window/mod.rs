use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Bounded FIFO sample storage
pub mod ring_buffer;
/// Segment tree over min/max/sum/sum-of-squares
pub mod range_tree;
/// Per-symbol cache of computed window stats
pub mod cache;
/// Per-symbol aggregation pipeline
pub mod aggregator;

pub use aggregator::StreamAggregator;
pub use cache::WindowStatsCache;
pub use range_tree::{Aggregate, RangeAggregationTree, TreeState};
pub use ring_buffer::RingBuffer;

/// Default per-symbol retention, the largest window that can be requested (`10^8`)
pub const DEFAULT_BUFFER_CAPACITY: usize = 100_000_000;

/// Smallest supported window exponent
pub const MIN_WINDOW_EXPONENT: u8 = 1;

/// Largest supported window exponent
pub const MAX_WINDOW_EXPONENT: u8 = 8;

/// Number of distinct window exponents
pub const WINDOW_SLOTS: usize = (MAX_WINDOW_EXPONENT - MIN_WINDOW_EXPONENT + 1) as usize;

/// A window exponent `k`, selecting the trailing `10^k` samples.
///
/// Holding one of these means `k` has already been range-checked, so the
/// aggregation code never re-validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowExponent(u8);

impl WindowExponent {
    /// Validate a raw exponent
    pub fn new(k: i64) -> Result<Self> {
        if k < MIN_WINDOW_EXPONENT as i64 || k > MAX_WINDOW_EXPONENT as i64 {
            return Err(StatsError::InvalidWindowExponent(k));
        }
        Ok(Self(k as u8))
    }

    /// Raw exponent value
    pub fn get(self) -> u8 {
        self.0
    }

    /// Window length in samples, `10^k`
    pub fn window_len(self) -> usize {
        10usize.pow(self.0 as u32)
    }

    /// Zero-based slot for fixed-size per-exponent tables
    pub(crate) fn slot(self) -> usize {
        (self.0 - MIN_WINDOW_EXPONENT) as usize
    }

    /// Every supported exponent, smallest first
    pub fn all() -> impl Iterator<Item = WindowExponent> {
        (MIN_WINDOW_EXPONENT..=MAX_WINDOW_EXPONENT).map(WindowExponent)
    }
}

impl TryFrom<i64> for WindowExponent {
    type Error = StatsError;

    fn try_from(k: i64) -> Result<Self> {
        Self::new(k)
    }
}

impl std::fmt::Display for WindowExponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statistics over one trailing window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Smallest sample in the window
    pub min: f64,
    /// Largest sample in the window
    pub max: f64,
    /// Most recently appended sample
    pub last: f64,
    /// Arithmetic mean of the window
    pub avg: f64,
    /// Population variance of the window
    pub var: f64,
}
