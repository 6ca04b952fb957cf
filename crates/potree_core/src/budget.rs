//! Frame-time driven point budget tuning.
//!
//! Averages the last few frame times and nudges the point budget one step at
//! a time: down while frames are slower than the target rate, up while they
//! are faster. Feed the result through
//! [`Potree::apply_adaptive_budget`](crate::potree::Potree::apply_adaptive_budget)
//! so the recency cache evicts immediately when the budget drops.

use std::time::Duration;

use crate::constants::{DEFAULT_BUDGET_STEP, DEFAULT_FRAME_WINDOW, DEFAULT_TARGET_FPS};
use crate::metrics::TimingWindow;

/// Adaptive point budget controller.
#[derive(Clone, Debug)]
pub struct AdaptiveBudget {
  /// Frame rate to steer towards.
  pub target_fps: f64,
  /// Points added or removed per adjustment.
  pub step: u64,
  /// Lower clamp.
  pub min: u64,
  /// Upper clamp.
  pub max: u64,
  /// Recent frame times in microseconds.
  frame_times: TimingWindow,
}

impl AdaptiveBudget {
  pub fn new(min: u64, max: u64) -> Self {
    Self {
      target_fps: DEFAULT_TARGET_FPS,
      step: DEFAULT_BUDGET_STEP,
      min,
      max,
      frame_times: TimingWindow::new(DEFAULT_FRAME_WINDOW),
    }
  }

  pub fn with_target_fps(mut self, target_fps: f64) -> Self {
    self.target_fps = target_fps;
    self
  }

  pub fn with_step(mut self, step: u64) -> Self {
    self.step = step;
    self
  }

  /// Average frame rate over the window, `None` before the first frame.
  pub fn average_fps(&self) -> Option<f64> {
    let average_us = self.frame_times.average();
    if self.frame_times.is_empty() || average_us <= 0.0 {
      return None;
    }
    Some(1_000_000.0 / average_us)
  }

  /// Record one frame and return the adjusted budget.
  pub fn record_frame(&mut self, frame_time: Duration, current_budget: u64) -> u64 {
    self.frame_times.push(frame_time.as_micros() as u64);

    let adjusted = match self.average_fps() {
      Some(fps) if fps < self.target_fps => current_budget.saturating_sub(self.step),
      Some(fps) if fps > self.target_fps => current_budget.saturating_add(self.step),
      _ => current_budget,
    };

    adjusted.clamp(self.min, self.max.max(self.min))
  }

  /// Forget recorded frames.
  pub fn reset(&mut self) {
    self.frame_times.clear();
  }
}
