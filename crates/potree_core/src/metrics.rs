//! Engine-agnostic scheduler statistics.
//!
//! Collected only with the `metrics` feature, and only while
//! [`COLLECT_METRICS`] is set.
//!
//! # Usage
//!
//! ```ignore
//! use potree_core::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // Read after each update:
//! let metrics = potree.metrics();
//! println!("{} points, {:.1} us avg", metrics.last_visible_points, metrics.avg_update_us());
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::constants::UPDATE_TIMING_WINDOW;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Microsecond timings of the most recent frames or updates.
#[derive(Debug, Clone)]
pub struct TimingWindow {
  samples: VecDeque<u64>,
  capacity: usize,
}

impl TimingWindow {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      samples: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Drops the oldest sample once full.
  pub fn push(&mut self, micros: u64) {
    if self.samples.len() == self.capacity {
      self.samples.pop_front();
    }
    self.samples.push_back(micros);
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn clear(&mut self) {
    self.samples.clear();
  }

  /// Mean of the held samples, 0 when empty.
  pub fn average(&self) -> f64 {
    if self.samples.is_empty() {
      return 0.0;
    }
    self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
  }
}

impl Default for TimingWindow {
  fn default() -> Self {
    Self::new(UPDATE_TIMING_WINDOW)
  }
}

/// Scheduler statistics updated by every `update_point_clouds` call.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics {
  // Last frame snapshot
  pub last_visible_points: u64,
  pub last_visible_nodes: usize,
  pub last_update_us: u64,

  // Cumulative totals
  pub total_promotions: u64,
  pub total_evictions: u64,
  pub total_loads_started: u64,
  pub total_loads_completed: u64,
  pub total_load_failures: u64,

  /// Rolling window of update times in microseconds.
  pub update_timings: TimingWindow,
}

impl SchedulerMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the outcome of one update.
  pub fn record_update(&mut self, timing_us: u64, visible_points: u64, visible_nodes: usize) {
    if !is_enabled() {
      return;
    }
    self.update_timings.push(timing_us);
    self.last_update_us = timing_us;
    self.last_visible_points = visible_points;
    self.last_visible_nodes = visible_nodes;
  }

  pub fn record_promotions(&mut self, count: usize) {
    if is_enabled() {
      self.total_promotions += count as u64;
    }
  }

  pub fn record_evictions(&mut self, count: usize) {
    if is_enabled() {
      self.total_evictions += count as u64;
    }
  }

  pub fn record_loads_started(&mut self, count: usize) {
    if is_enabled() {
      self.total_loads_started += count as u64;
    }
  }

  pub fn record_load_outcomes(&mut self, completed: usize, failed: usize) {
    if is_enabled() {
      self.total_loads_completed += completed as u64;
      self.total_load_failures += failed as u64;
    }
  }

  pub fn avg_update_us(&self) -> f64 {
    self.update_timings.average()
  }
}
