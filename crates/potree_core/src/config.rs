//! Scheduler configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! point_budget = 2_000_000
//! load_mode = "background"
//!
//! [failure_policy]
//! kind = "retry"
//! after_frames = 120
//! max_attempts = 3
//!
//! [[lod_weighting.tiers]]
//! max_distance = 10.0
//! max_level = 7
//! multiplier = 10.0
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{
  DEFAULT_MIN_NODE_PIXEL_SIZE, DEFAULT_POINT_BUDGET, MAX_LOADS_TO_GPU, MAX_NUM_NODES_LOADING,
};
use crate::error::{PotreeError, PotreeResult};
use crate::loading::LoadMode;
use crate::octree::LodWeighting;

/// What happens to a node whose fetch failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicy {
  /// Skip the node and its subtree for the lifetime of the cloud.
  #[default]
  Prune,
  /// Fetch again once `after_frames` updates have passed, up to
  /// `max_attempts` failures in total.
  Retry { after_frames: u64, max_attempts: u32 },
}

/// Scheduler limits and tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotreeConfig {
  /// Global cap on visible points per frame.
  pub point_budget: u64,
  /// Promotions to GPU-resident per frame.
  pub max_loads_to_gpu: usize,
  /// Node fetches in flight at once.
  pub max_num_nodes_loading: usize,
  /// Initial `min_node_pixel_size` of clouds loaded from a manifest.
  pub default_min_node_pixel_size: f64,
  pub lod_weighting: LodWeighting,
  pub failure_policy: FailurePolicy,
  pub load_mode: LoadMode,
}

impl Default for PotreeConfig {
  fn default() -> Self {
    Self {
      point_budget: DEFAULT_POINT_BUDGET,
      max_loads_to_gpu: MAX_LOADS_TO_GPU,
      max_num_nodes_loading: MAX_NUM_NODES_LOADING,
      default_min_node_pixel_size: DEFAULT_MIN_NODE_PIXEL_SIZE,
      lod_weighting: LodWeighting::default(),
      failure_policy: FailurePolicy::default(),
      load_mode: LoadMode::default(),
    }
  }
}

impl PotreeConfig {
  /// Parse and validate a TOML document.
  pub fn from_toml_str(source: &str) -> PotreeResult<Self> {
    let config: Self = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> PotreeResult<()> {
    if self.max_num_nodes_loading == 0 {
      return Err(PotreeError::InvalidConfig(
        "max_num_nodes_loading must be at least 1".into(),
      ));
    }
    if !(self.default_min_node_pixel_size.is_finite() && self.default_min_node_pixel_size >= 0.0) {
      return Err(PotreeError::InvalidConfig(format!(
        "default_min_node_pixel_size must be finite and non-negative, got {}",
        self.default_min_node_pixel_size
      )));
    }
    if let FailurePolicy::Retry { max_attempts: 0, .. } = self.failure_policy {
      return Err(PotreeError::InvalidConfig(
        "retry policy needs max_attempts >= 1".into(),
      ));
    }
    self.lod_weighting.validate()
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
