//! Ray picking against resident point data.
//!
//! Only nodes shown by the last update are tested and nothing is ever
//! loaded. A point counts as hit when it lies within half the pick window
//! (in screen pixels) of the ray; the hit nearest the ray origin wins.

use glam::DVec3;

use crate::camera::{Camera, Ray, Viewport};
use crate::constants::DEFAULT_PICK_WINDOW_SIZE;
use crate::error::PotreeResult;
use crate::octree::{projection_factor, NodeId};
use crate::point_cloud::{CloudId, PointCloud};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickParams {
  /// Pick window edge in screen pixels.
  pub pick_window_size: f64,
  /// Ignore hits farther along the ray.
  pub max_distance: Option<f64>,
}

impl Default for PickParams {
  fn default() -> Self {
    Self {
      pick_window_size: DEFAULT_PICK_WINDOW_SIZE,
      max_distance: None,
    }
  }
}

/// Nearest hit of a pick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickPoint {
  pub cloud: CloudId,
  pub node: NodeId,
  /// Index into the node payload's positions.
  pub point_index: usize,
  /// World-space position.
  pub position: DVec3,
  /// Distance along the ray.
  pub distance: f64,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
  cloud: usize,
  node: NodeId,
  entry: f64,
}

/// Reusable pick state. Owned by the caller; holds only scratch buffers.
#[derive(Debug, Default)]
pub struct Picker {
  candidates: Vec<Candidate>,
}

impl Picker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn pick<'a>(
    &mut self,
    clouds: impl IntoIterator<Item = &'a PointCloud>,
    camera: &Camera,
    viewport: &Viewport,
    ray: &Ray,
    params: &PickParams,
  ) -> PotreeResult<Option<PickPoint>> {
    camera.validate()?;
    viewport.validate()?;
    let half_height = viewport.half_height();
    let eye = camera.position();
    let half_window = params.pick_window_size.max(0.0) * 0.5;

    // World-space tolerance of the pick window at `distance` from the eye
    let tolerance = |distance: f64| {
      let factor = projection_factor(&camera.projection, half_height, distance);
      if factor.is_finite() && factor > 0.0 {
        half_window / factor
      } else {
        0.0
      }
    };

    let clouds: Vec<&PointCloud> = clouds
      .into_iter()
      .filter(|cloud| cloud.visible && !cloud.is_disposed())
      .collect();

    // Candidate nodes ordered by where the ray enters their padded box
    self.candidates.clear();
    for (slot, cloud) in clouds.iter().enumerate() {
      let world = cloud.world_matrix();
      for &id in cloud.visible_nodes() {
        let Some(node) = cloud.node(id) else {
          continue;
        };
        let world_box = node.geometry().bounding_box.transformed(&world);
        let padding = tolerance(world_box.center().distance(eye) + world_box.size().length() * 0.5);
        if let Some(entry) = world_box.expanded(padding).ray_entry(ray.origin, ray.direction) {
          self.candidates.push(Candidate {
            cloud: slot,
            node: id,
            entry,
          });
        }
      }
    }
    self.candidates.sort_by(|a, b| a.entry.total_cmp(&b.entry));

    let mut best: Option<PickPoint> = None;
    for candidate in &self.candidates {
      if best.is_some_and(|hit| hit.distance <= candidate.entry) {
        break;
      }
      if params.max_distance.is_some_and(|max| candidate.entry > max) {
        break;
      }

      let cloud = clouds[candidate.cloud];
      let Some(payload) = cloud
        .node(candidate.node)
        .filter(|node| node.is_resident())
        .and_then(|node| node.geometry().load.payload())
      else {
        continue;
      };
      let world = cloud.world_matrix();

      for (point_index, local) in payload.positions.iter().enumerate() {
        let position = world.transform_point3(local.as_dvec3());
        let t = (position - ray.origin).dot(ray.direction);
        if t < 0.0 || params.max_distance.is_some_and(|max| t > max) {
          continue;
        }
        if best.is_some_and(|hit| hit.distance <= t) {
          continue;
        }
        if position.distance(ray.at(t)) <= tolerance(position.distance(eye)) {
          best = Some(PickPoint {
            cloud: cloud.id(),
            node: candidate.node,
            point_index,
            position,
            distance: t,
          });
        }
      }
    }

    Ok(best)
  }
}
