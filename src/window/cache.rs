use super::{WindowExponent, WindowStats, WINDOW_SLOTS};
use crate::error::Result;

/// Computed stats per window exponent, cleared wholesale on every write.
///
/// There is no per-entry invalidation: new samples shift every trailing
/// window, so one append stales all of them.
#[derive(Debug, Clone, Default)]
pub struct WindowStatsCache {
    slots: [Option<WindowStats>; WINDOW_SLOTS],
}

impl WindowStatsCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached stats for `k`, if present
    pub fn get(&self, k: WindowExponent) -> Option<WindowStats> {
        self.slots[k.slot()]
    }

    /// Return the cached stats for `k`, computing and storing them on a miss.
    ///
    /// A failed computation leaves the slot empty.
    pub fn get_or_compute<F>(&mut self, k: WindowExponent, compute: F) -> Result<WindowStats>
    where
        F: FnOnce() -> Result<WindowStats>,
    {
        let slot = &mut self.slots[k.slot()];
        if let Some(stats) = slot {
            return Ok(*stats);
        }

        let stats = compute()?;
        *slot = Some(stats);
        Ok(stats)
    }

    /// Drop every cached entry
    pub fn invalidate_all(&mut self) {
        self.slots = [None; WINDOW_SLOTS];
    }

    /// Exponents that currently have a cached entry
    pub fn cached_exponents(&self) -> Vec<WindowExponent> {
        WindowExponent::all()
            .filter(|k| self.slots[k.slot()].is_some())
            .collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
