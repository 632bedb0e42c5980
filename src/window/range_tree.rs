//! Array-backed segment tree answering min/max/sum/sum-of-squares over any
//! closed index range of the samples it was built from.
//!
//! The tree is never patched in place. Appending to the buffer it mirrors
//! marks it [`TreeState::Dirty`]; the next read rebuilds it wholesale.

use tracing::trace;

/// Range aggregate carried by every node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    /// Smallest value in range
    pub min: f64,
    /// Largest value in range
    pub max: f64,
    /// Sum of values in range
    pub sum: f64,
    /// Sum of squared values in range
    pub sum_sq: f64,
}

impl Aggregate {
    /// Neutral element: absorbed by [`Aggregate::combine`] without effect
    pub const IDENTITY: Aggregate = Aggregate {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        sum: 0.0,
        sum_sq: 0.0,
    };

    /// Aggregate of a single sample
    #[inline]
    pub fn leaf(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            sum_sq: value * value,
        }
    }

    /// Elementwise combination of two disjoint ranges
    #[inline]
    pub fn combine(self, other: Aggregate) -> Aggregate {
        Aggregate {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
        }
    }
}

/// Staleness of the tree relative to the buffer it mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    /// Leaves match the buffer; queries allowed
    Clean,
    /// Buffer changed since the last build; rebuild before querying
    Dirty,
}

/// Segment tree over a snapshot of samples
#[derive(Debug, Clone)]
pub struct RangeAggregationTree {
    nodes: Vec<Aggregate>,
    leaves: usize,
    state: TreeState,
    rebuilds: u64,
}

impl Default for RangeAggregationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeAggregationTree {
    /// Create an empty tree. It starts dirty: nothing has been built yet.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            leaves: 0,
            state: TreeState::Dirty,
            rebuilds: 0,
        }
    }

    /// Number of nodes needed for `n` leaves: `2 * 2^ceil(log2 n) - 1`
    pub fn node_count_for(n: usize) -> usize {
        if n == 0 {
            0
        } else {
            2 * n.next_power_of_two() - 1
        }
    }

    /// Discard the current tree and build a fresh one over `values`
    pub fn build(&mut self, values: &[f64]) {
        let n = values.len();
        self.nodes.clear();
        self.nodes.resize(Self::node_count_for(n), Aggregate::IDENTITY);
        self.leaves = n;

        if n > 0 {
            self.build_node(values, 0, n - 1, 0);
        }

        self.state = TreeState::Clean;
        self.rebuilds += 1;
        trace!(leaves = n, nodes = self.nodes.len(), "range tree rebuilt");
    }

    fn build_node(&mut self, values: &[f64], start: usize, end: usize, node: usize) {
        if start == end {
            self.nodes[node] = Aggregate::leaf(values[start]);
            return;
        }

        let mid = start + (end - start) / 2;
        self.build_node(values, start, mid, 2 * node + 1);
        self.build_node(values, mid + 1, end, 2 * node + 2);
        self.nodes[node] = self.nodes[2 * node + 1].combine(self.nodes[2 * node + 2]);
    }

    /// Aggregate over the closed leaf range `[qs, qe]`.
    ///
    /// Returns `None` if the tree is dirty or empty, or if the range is
    /// inverted or falls outside `[0, n-1]`.
    pub fn query(&self, qs: usize, qe: usize) -> Option<Aggregate> {
        if self.state == TreeState::Dirty || self.leaves == 0 || qs > qe || qe >= self.leaves {
            return None;
        }
        Some(self.query_node(0, self.leaves - 1, qs, qe, 0))
    }

    fn query_node(&self, start: usize, end: usize, qs: usize, qe: usize, node: usize) -> Aggregate {
        // total overlap
        if qs <= start && end <= qe {
            return self.nodes[node];
        }
        // no overlap
        if end < qs || start > qe {
            return Aggregate::IDENTITY;
        }

        let mid = start + (end - start) / 2;
        self.query_node(start, mid, qs, qe, 2 * node + 1)
            .combine(self.query_node(mid + 1, end, qs, qe, 2 * node + 2))
    }

    /// Flag the tree as stale after the mirrored buffer changed
    pub fn mark_dirty(&mut self) {
        self.state = TreeState::Dirty;
    }

    /// Current staleness state
    pub fn state(&self) -> TreeState {
        self.state
    }

    /// Whether a rebuild is required before querying
    pub fn is_dirty(&self) -> bool {
        self.state == TreeState::Dirty
    }

    /// Number of leaves as of the last build
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    /// Number of allocated nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of builds performed since creation
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}
