use tracing::debug;

use super::{
    RangeAggregationTree, RingBuffer, TreeState, WindowExponent, WindowStats, WindowStatsCache,
};
use crate::error::{Result, StatsError};

/// Sample stream and query pipeline for one symbol.
///
/// Writes append to the ring buffer and stale both the tree and the cache.
/// Reads rebuild the tree at most once per write burst, then answer from
/// the cache or a tree query.
#[derive(Debug)]
pub struct StreamAggregator {
    buffer: RingBuffer,
    tree: RangeAggregationTree,
    cache: WindowStatsCache,
    last_value: Option<f64>,
}

impl StreamAggregator {
    /// Create an empty aggregator retaining at most `buffer_capacity` samples
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer: RingBuffer::new(buffer_capacity),
            tree: RangeAggregationTree::new(),
            cache: WindowStatsCache::new(),
            last_value: None,
        }
    }

    /// Append a batch of already validated samples, in order.
    ///
    /// Returns the number of samples appended. An empty batch changes nothing.
    pub fn add_batch(&mut self, values: &[f64]) -> usize {
        let Some(&last) = values.last() else {
            return 0;
        };

        self.buffer.extend_from_slice(values);
        self.last_value = Some(last);
        self.tree.mark_dirty();
        self.cache.invalidate_all();

        values.len()
    }

    /// Stats over the trailing `10^k` samples (or all of them, if fewer)
    pub fn get_stats(&mut self, k: WindowExponent) -> Result<WindowStats> {
        let Some(last) = self.last_value.filter(|_| !self.buffer.is_empty()) else {
            return Err(StatsError::NoData(format!("no samples for window k={}", k)));
        };

        if self.tree.is_dirty() {
            self.tree.build(self.buffer.as_slice());
            debug!(
                samples = self.tree.leaf_count(),
                rebuilds = self.tree.rebuild_count(),
                "rebuilt range tree"
            );
        }

        let n = self.buffer.len();
        let tree = &self.tree;
        self.cache
            .get_or_compute(k, || compute_window(tree, n, k, last))
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no samples have been retained
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Most recently appended sample
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    /// Staleness of the range tree
    pub fn tree_state(&self) -> TreeState {
        self.tree.state()
    }

    /// Number of range tree builds so far
    pub fn rebuild_count(&self) -> u64 {
        self.tree.rebuild_count()
    }

    /// Exponents with a cached result
    pub fn cached_windows(&self) -> Vec<WindowExponent> {
        self.cache.cached_exponents()
    }

    /// Ordered copy of the retained samples
    pub fn snapshot(&self) -> Vec<f64> {
        self.buffer.snapshot()
    }
}

fn compute_window(
    tree: &RangeAggregationTree,
    n: usize,
    k: WindowExponent,
    last: f64,
) -> Result<WindowStats> {
    let points = k.window_len().min(n);
    let agg = tree
        .query(n - points, n - 1)
        .ok_or_else(|| StatsError::NoData(format!("range tree unavailable for window k={}", k)))?;

    let count = points as f64;
    let avg = agg.sum / count;
    let var = if points > 1 {
        // E[X^2] - E[X]^2 can dip just below zero for near-constant windows
        (agg.sum_sq / count - avg * avg).max(0.0)
    } else {
        0.0
    };

    Ok(WindowStats {
        min: agg.min,
        max: agg.max,
        last,
        avg,
        var,
    })
}
