//! Sliding sample buffers for plotting and analysis

use ecg_core::RawSample;
use std::collections::VecDeque;

/// Fixed-length plot buffer, always holding exactly `capacity` samples
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    capacity: usize,
    baseline: RawSample,
    samples: VecDeque<RawSample>,
}

impl DisplayBuffer {
    /// Create a buffer pre-filled with `baseline`
    pub fn new(capacity: usize, baseline: RawSample) -> Self {
        let capacity = capacity.max(1);

        DisplayBuffer {
            capacity,
            baseline,
            samples: std::iter::repeat(baseline).take(capacity).collect(),
        }
    }

    /// Evict the oldest sample and append `value`
    pub fn push(&mut self, value: RawSample) {
        self.samples.pop_front();
        self.samples.push_back(value);
    }

    /// Refill with the baseline
    pub fn reset(&mut self) {
        self.samples.iter_mut().for_each(|v| *v = self.baseline);
    }

    /// Contents oldest to newest
    pub fn snapshot_in_order(&self) -> Vec<RawSample> {
        self.samples.iter().copied().collect()
    }

    /// Newest sample
    pub fn latest(&self) -> RawSample {
        self.samples.back().copied().unwrap_or(self.baseline)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn baseline(&self) -> RawSample {
        self.baseline
    }
}

/// Growing window of at most `capacity` samples used for metrics
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    capacity: usize,
    samples: VecDeque<RawSample>,
}

impl AnalysisWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        AnalysisWindow {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `value`, evicting the oldest sample on overflow
    pub fn push(&mut self, value: RawSample) {
        self.samples.push_back(value);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Contents oldest to newest
    pub fn snapshot_in_order(&self) -> Vec<RawSample> {
        self.samples.iter().copied().collect()
    }

    /// Contiguous view of the contents, oldest to newest
    pub fn as_slice(&mut self) -> &[RawSample] {
        self.samples.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
