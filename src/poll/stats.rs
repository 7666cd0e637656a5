/// Fixed-capacity ring of the most recent samples with an incrementally
/// maintained sum.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    ring: Vec<f64>,
    capacity: usize,
    next: usize,
    sum: f64,
}

impl MovingAverage {
    /// `capacity` must be at least 1; a zero capacity is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        MovingAverage {
            ring: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.ring.len() < self.capacity {
            self.ring.push(value);
        } else {
            let evicted = std::mem::replace(&mut self.ring[self.next], value);
            self.sum -= evicted;
        }
        self.sum += value;
        self.next = (self.next + 1) % self.capacity;
        if self.next == 0 {
            // Drop rounding error accumulated by the evictions of the last lap.
            self.sum = self.ring.iter().sum();
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of the samples currently held, `None` before the first sample.
    pub fn average(&self) -> Option<f64> {
        if self.ring.is_empty() {
            None
        } else {
            Some(self.sum / self.ring.len() as f64)
        }
    }
}

/// Consistent point-in-time copy of the running statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    pub count: u64,
    pub sum: f64,
    pub windowed_mean: Option<f64>,
}

impl Snapshot {
    pub fn cumulative_mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Cumulative count/sum plus the moving-average window.
#[derive(Debug, Clone)]
pub struct RunningStatistics {
    count: u64,
    sum: f64,
    window: MovingAverage,
}

impl RunningStatistics {
    pub fn new(window: usize) -> Self {
        RunningStatistics {
            count: 0,
            sum: 0.0,
            window: MovingAverage::new(window),
        }
    }

    pub fn apply(&mut self, sample: f64) {
        self.count += 1;
        self.sum += sample;
        self.window.add(sample);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            count: self.count,
            sum: self.sum,
            windowed_mean: self.window.average(),
        }
    }
}
