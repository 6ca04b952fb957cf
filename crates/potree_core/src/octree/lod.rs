//! Screen-space error and queue weighting for octree children.
//!
//! ```text
//! perspective:   projection_factor = half_height / (tan(fov / 2) * distance)
//! orthographic:  projection_factor = 2 * half_height / (top - bottom)
//!
//! screen_pixel_radius = sphere_radius * projection_factor
//!
//! weight = MAX_WEIGHT                                   if distance < radius
//!        = screen_pixel_radius / 2 + tier / distance    otherwise
//! ```

use serde::{Deserialize, Serialize};

use crate::camera::Projection;
use crate::constants::{DEFAULT_WEIGHT_TIERS, MAX_WEIGHT};
use crate::error::{PotreeError, PotreeResult};

/// Pixels per local unit at `distance` from the camera.
pub fn projection_factor(projection: &Projection, half_height: f64, distance: f64) -> f64 {
  match *projection {
    Projection::Perspective { fov_y_degrees, .. } => {
      let slope = (fov_y_degrees.to_radians() / 2.0).tan();
      half_height / (slope * distance)
    }
    Projection::Orthographic { top, bottom, .. } => (2.0 * half_height) / (top - bottom),
  }
}

/// Near-camera boost for shallow nodes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightTier {
  /// Applies when the camera is closer than this.
  pub max_distance: f64,
  /// Applies to nodes shallower than this level.
  pub max_level: u32,
  /// Factor on the `1 / distance` term.
  pub multiplier: f64,
}

/// Tiered child weighting. First matching tier wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodWeighting {
  pub tiers: Vec<WeightTier>,
}

impl Default for LodWeighting {
  fn default() -> Self {
    Self {
      tiers: DEFAULT_WEIGHT_TIERS
        .iter()
        .map(|&(max_distance, max_level, multiplier)| WeightTier {
          max_distance,
          max_level,
          multiplier,
        })
        .collect(),
    }
  }
}

impl LodWeighting {
  /// No tiers: plain `1 / distance`.
  pub fn flat() -> Self {
    Self { tiers: Vec::new() }
  }

  #[inline]
  pub fn tier_multiplier(&self, distance: f64, level: u32) -> f64 {
    self
      .tiers
      .iter()
      .find(|tier| distance < tier.max_distance && level < tier.max_level)
      .map_or(1.0, |tier| tier.multiplier)
  }

  /// Queue weight of a child that passed the pixel-size test.
  pub fn weight(&self, distance: f64, radius: f64, screen_pixel_radius: f64, level: u32) -> f64 {
    if distance < radius || distance <= 0.0 {
      return MAX_WEIGHT;
    }
    screen_pixel_radius * 0.5 + self.tier_multiplier(distance, level) / distance
  }

  pub fn validate(&self) -> PotreeResult<()> {
    for (index, tier) in self.tiers.iter().enumerate() {
      if !(tier.max_distance.is_finite() && tier.max_distance >= 0.0) {
        return Err(PotreeError::InvalidConfig(format!(
          "weight tier {index}: max_distance must be finite and non-negative"
        )));
      }
      if !(tier.multiplier.is_finite() && tier.multiplier >= 0.0) {
        return Err(PotreeError::InvalidConfig(format!(
          "weight tier {index}: multiplier must be finite and non-negative"
        )));
      }
    }
    Ok(())
  }
}

/// Scale a weight down while the node's scene material is mid-fade.
#[inline]
pub fn fade_adjusted(weight: f64, transition_alpha: f32) -> f64 {
  if transition_alpha == 0.0 {
    return weight;
  }
  weight * (1.0 - (transition_alpha as f64).abs()).max(0.0)
}
