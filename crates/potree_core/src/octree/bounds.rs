//! Axis-aligned boxes and bounding spheres with double precision.
//!
//! Point cloud datasets commonly sit at geo-referenced offsets in the
//! millions, so bounds stay in `f64` until positions reach the renderer.

use glam::{DMat4, DVec3};

/// Double-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl Aabb {
  /// Create a new AABB from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Create a new AABB from center and half-extents.
  pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
    Self {
      min: center - half_extents,
      max: center + half_extents,
    }
  }

  /// Smallest box containing every point, `None` for an empty iterator.
  pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
    let mut points = points.into_iter();
    let first = points.next()?;
    let mut bounds = Self { min: first, max: first };
    for point in points {
      bounds.min = bounds.min.min(point);
      bounds.max = bounds.max.max(point);
    }
    Some(bounds)
  }

  /// Check if this AABB overlaps with another (touching counts).
  #[inline]
  pub fn intersects(&self, other: &Aabb) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  /// Check if this AABB contains a point.
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.x >= self.min.x
      && point.x <= self.max.x
      && point.y >= self.min.y
      && point.y <= self.max.y
      && point.z >= self.min.z
      && point.z <= self.max.z
  }

  /// Get the size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Get the center of the AABB.
  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Union of two boxes.
  pub fn union(&self, other: &Aabb) -> Aabb {
    Aabb {
      min: self.min.min(other.min),
      max: self.max.max(other.max),
    }
  }

  /// Grow the box by `margin` on every side.
  pub fn expanded(&self, margin: f64) -> Aabb {
    Aabb {
      min: self.min - DVec3::splat(margin),
      max: self.max + DVec3::splat(margin),
    }
  }

  /// The 8 corners, indexed with bit 2 = x, bit 1 = y, bit 0 = z.
  pub fn corners(&self) -> [DVec3; 8] {
    std::array::from_fn(|i| {
      DVec3::new(
        if i & 0b100 != 0 { self.max.x } else { self.min.x },
        if i & 0b010 != 0 { self.max.y } else { self.min.y },
        if i & 0b001 != 0 { self.max.z } else { self.min.z },
      )
    })
  }

  /// Axis-aligned box enclosing this box after an affine transform.
  pub fn transformed(&self, matrix: &DMat4) -> Aabb {
    let corners = self.corners().map(|corner| matrix.transform_point3(corner));
    let mut bounds = Aabb {
      min: corners[0],
      max: corners[0],
    };
    for corner in &corners[1..] {
      bounds.min = bounds.min.min(*corner);
      bounds.max = bounds.max.max(*corner);
    }
    bounds
  }

  /// Child box for an octree octant.
  ///
  /// Potree convention: bit 2 selects the upper x half, bit 1 the upper y
  /// half, bit 0 the upper z half.
  pub fn octant(&self, index: u8) -> Aabb {
    let half = self.size() * 0.5;
    let mut min = self.min;
    let mut max = self.max;

    if index & 0b100 != 0 {
      min.x += half.x;
    } else {
      max.x -= half.x;
    }
    if index & 0b010 != 0 {
      min.y += half.y;
    } else {
      max.y -= half.y;
    }
    if index & 0b001 != 0 {
      min.z += half.z;
    } else {
      max.z -= half.z;
    }

    Aabb { min, max }
  }

  /// Sphere through all 8 corners.
  pub fn bounding_sphere(&self) -> BoundingSphere {
    BoundingSphere {
      center: self.center(),
      radius: self.size().length() * 0.5,
    }
  }

  /// Entry distance of a ray into the box (slab test).
  ///
  /// Returns 0 when the origin is inside, `None` when the ray misses or the
  /// box lies entirely behind the origin.
  pub fn ray_entry(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
    let inv = direction.recip();
    let t1 = (self.min - origin) * inv;
    let t2 = (self.max - origin) * inv;

    let t_near = t1.min(t2).max_element();
    let t_far = t1.max(t2).min_element();

    if t_near > t_far || t_far < 0.0 || t_near.is_nan() || t_far.is_nan() {
      return None;
    }
    Some(t_near.max(0.0))
  }
}

/// Bounding sphere in the same space as its box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
  pub center: DVec3,
  pub radius: f64,
}

impl BoundingSphere {
  #[inline]
  pub fn distance_to(&self, point: DVec3) -> f64 {
    self.center.distance(point)
  }
}
