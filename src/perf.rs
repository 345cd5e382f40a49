//! Step-rate measurement for performance runs.
//!
//! # Example
//!
//! ```
//! use flock_grid::perf::PerfMonitor;
//!
//! let mut perf = PerfMonitor::new();
//! // after every simulation step:
//! perf.record_step();
//! println!("{:.1} steps/s", perf.rate());
//! ```

use std::time::{Duration, Instant};

/// Counts steps and samples the step rate at a fixed interval.
#[derive(Debug)]
pub struct PerfMonitor {
    /// When the monitor was created.
    start: Instant,
    /// Start of the current sampling window.
    window_start: Instant,
    /// Steps recorded in the current window.
    window_steps: u64,
    /// Total steps since creation.
    total_steps: u64,
    /// Most recent sampled rate.
    rate: f64,
    /// Every sampled rate, oldest first.
    history: Vec<f64>,
    /// Length of a sampling window.
    interval: Duration,
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfMonitor {
    /// Monitor sampling once per second.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    /// Monitor sampling every `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            window_start: now,
            window_steps: 0,
            total_steps: 0,
            rate: 0.0,
            history: Vec::new(),
            interval,
        }
    }

    /// Count one step. Returns the new rate when a window closes.
    pub fn record_step(&mut self) -> Option<f64> {
        self.record_step_at(Instant::now())
    }

    fn record_step_at(&mut self, now: Instant) -> Option<f64> {
        self.window_steps += 1;
        self.total_steps += 1;

        let window = now.duration_since(self.window_start);
        if window < self.interval {
            return None;
        }

        self.rate = self.window_steps as f64 / window.as_secs_f64();
        self.history.push(self.rate);
        self.window_steps = 0;
        self.window_start = now;
        Some(self.rate)
    }

    /// Most recently sampled steps per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Mean of all sampled rates, or 0 before the first sample.
    pub fn average_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    /// Every sampled rate.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Total steps recorded.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Time since the monitor was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
