//! View frustum for visibility culling.

use glam::{DMat4, DVec3, DVec4};

use super::Aabb;

/// Six clip planes extracted from a clip-space matrix.
///
/// Plane order: left, right, bottom, top, near, far. Each plane is stored as
/// `(normal, d)` with the normal pointing into the frustum, so a point is
/// inside when `dot(normal, p) + d >= 0` for every plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
  pub planes: [DVec4; 6],
}

impl Frustum {
  /// Extract planes from `projection * view * model` (OpenGL clip volume,
  /// z in [-1, 1]).
  ///
  /// When the model matrix is a point cloud's world transform, the planes are
  /// in that cloud's local space and node boxes can be tested directly.
  pub fn from_matrix(matrix: &DMat4) -> Self {
    let r0 = matrix.row(0);
    let r1 = matrix.row(1);
    let r2 = matrix.row(2);
    let r3 = matrix.row(3);

    let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2].map(normalize_plane);
    Self { planes }
  }

  /// True when the box is at least partially inside.
  ///
  /// Tests the corner furthest along each plane normal; conservative near
  /// frustum edges, exact for boxes fully outside one plane.
  pub fn intersects_box(&self, aabb: &Aabb) -> bool {
    self.planes.iter().all(|plane| {
      let positive = DVec3::new(
        if plane.x > 0.0 { aabb.max.x } else { aabb.min.x },
        if plane.y > 0.0 { aabb.max.y } else { aabb.min.y },
        if plane.z > 0.0 { aabb.max.z } else { aabb.min.z },
      );
      plane.truncate().dot(positive) + plane.w >= 0.0
    })
  }

  pub fn contains_point(&self, point: DVec3) -> bool {
    self
      .planes
      .iter()
      .all(|plane| plane.truncate().dot(point) + plane.w >= 0.0)
  }
}

fn normalize_plane(plane: DVec4) -> DVec4 {
  let length = plane.truncate().length();
  if length > 0.0 {
    plane / length
  } else {
    plane
  }
}
