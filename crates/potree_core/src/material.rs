//! Point cloud material state handed to the scene for every visible node.
//!
//! Only the clip boxes influence scheduling; the rest is passed through to the
//! renderer untouched.

use glam::{DMat4, DVec3};

use crate::octree::Aabb;

/// How clip boxes affect points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipMode {
  #[default]
  Disabled,
  /// Points outside every clip box are discarded; nodes outside are skipped.
  ClipOutside,
  /// Points inside a clip box are highlighted; no scheduling effect.
  HighlightInside,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointShape {
  Square,
  Circle,
  #[default]
  Paraboloid,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointSizeType {
  Fixed,
  Attenuated,
  #[default]
  Adaptive,
}

/// Oriented clip box: the unit cube `[-0.5, 0.5]^3` under `matrix`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipBox {
  pub matrix: DMat4,
}

impl ClipBox {
  pub fn new(matrix: DMat4) -> Self {
    Self { matrix }
  }

  /// Axis-aligned clip box centered at `center` with edge lengths `size`.
  pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
    Self {
      matrix: DMat4::from_scale_rotation_translation(size, glam::DQuat::IDENTITY, center),
    }
  }

  /// World-space bounds of the box.
  pub fn world_box(&self) -> Aabb {
    Aabb::from_center_half_extents(DVec3::ZERO, DVec3::splat(0.5)).transformed(&self.matrix)
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointCloudMaterial {
  pub size: f32,
  pub min_size: f32,
  pub max_size: f32,
  pub opacity: f32,
  pub point_size_type: PointSizeType,
  pub shape: PointShape,
  pub clip_mode: ClipMode,
  pub clip_boxes: Vec<ClipBox>,
}

impl Default for PointCloudMaterial {
  fn default() -> Self {
    Self {
      size: 1.0,
      min_size: 2.0,
      max_size: 50.0,
      opacity: 1.0,
      point_size_type: PointSizeType::default(),
      shape: PointShape::default(),
      clip_mode: ClipMode::default(),
      clip_boxes: Vec::new(),
    }
  }
}

impl PointCloudMaterial {
  #[inline]
  pub fn num_clip_boxes(&self) -> usize {
    self.clip_boxes.len()
  }

  /// True when a node with this world-space box lies outside every clip box
  /// while clipping to the outside is active.
  pub fn excludes(&self, world_box: &Aabb) -> bool {
    if self.clip_boxes.is_empty() || self.clip_mode != ClipMode::ClipOutside {
      return false;
    }

    !self
      .clip_boxes
      .iter()
      .any(|clip_box| world_box.intersects(&clip_box.world_box()))
  }
}
