//! Bounded sliding window with a running simple moving average

use crate::error::TrackerError;
use std::collections::VecDeque;

/// Neumaier compensated sum
///
/// Keeps the low-order bits lost by each addition so that subtracting an
/// evicted value that dwarfed its neighbours does not corrupt the remainder.
#[derive(Debug, Clone, Copy, Default)]
struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    fn add(&mut self, value: f64) {
        let total = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - total) + value;
        } else {
            self.compensation += (value - total) + self.sum;
        }
        self.sum = total;
    }

    fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Fixed-capacity FIFO of prices
///
/// Keeps a running sum so both insertion and averaging are O(1) amortized.
/// The sum is rebuilt from the held values every `capacity` evictions.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    sum: CompensatedSum,
    evictions: usize,
}

impl SlidingWindow {
    /// Creates an empty window. A capacity of zero is rejected.
    pub fn new(capacity: usize) -> Result<Self, TrackerError> {
        if capacity == 0 {
            return Err(TrackerError::invalid_config(
                "SMA window size must be at least 1",
            ));
        }

        Ok(Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: CompensatedSum::default(),
            evictions: 0,
        })
    }

    /// Appends `value`, evicting the oldest entry when full
    ///
    /// Returns the number of held values and their mean.
    pub fn push(&mut self, value: f64) -> (usize, f64) {
        if self.values.len() == self.capacity {
            if let Some(evicted) = self.values.pop_front() {
                self.sum.add(-evicted);
                self.evictions += 1;
            }
        }
        self.values.push_back(value);

        if self.evictions >= self.capacity {
            self.evictions = 0;
            self.sum = self.values.iter().fold(CompensatedSum::default(), |mut acc, &v| {
                acc.add(v);
                acc
            });
        } else {
            self.sum.add(value);
        }

        (self.len(), self.average())
    }

    /// Mean of the held values, 0.0 when empty
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum.total() / self.values.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
