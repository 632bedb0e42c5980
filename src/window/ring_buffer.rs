use std::collections::VecDeque;

/// Bounded FIFO of samples. Once full, every append evicts the oldest sample.
///
/// Capacity is an upper bound only; storage grows as samples arrive so a
/// symbol that never sees `10^8` points never pays for them.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl RingBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::new(),
        }
    }

    /// Append a sample, evicting the oldest one when full
    #[inline]
    pub fn append(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Append every sample in order
    pub fn extend_from_slice(&mut self, values: &[f64]) {
        // Anything older than the last `capacity` values would be evicted anyway.
        let start = values.len().saturating_sub(self.capacity);
        for &value in &values[start..] {
            self.append(value);
        }
    }

    /// Ordered copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Ordered contiguous view of the current contents, oldest first
    pub fn as_slice(&mut self) -> &[f64] {
        self.samples.make_contiguous()
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples held
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
