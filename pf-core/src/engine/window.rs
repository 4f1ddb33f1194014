//! Bounded moving-average window over temperature samples
//!
//! Smooths out single-tick spikes so the policy reacts to a short trend
//! rather than instantaneous readings.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent temperature samples
///
/// Holds at most `capacity` samples; pushing at capacity evicts the
/// oldest. The average is defined over whatever is currently held, so the
/// window is usable from the very first sample.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    /// Create an empty window holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample window capacity must be non-zero");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest if at capacity, and return the
    /// updated average
    pub fn push(&mut self, sample: f32) -> f32 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    /// Arithmetic mean of the currently held samples, `None` when empty
    pub fn average(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f32>() / self.samples.len() as f32)
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
