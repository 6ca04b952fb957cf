//! Decoded node geometry as delivered by a fetcher.

use glam::Vec3;
use smallvec::SmallVec;

use crate::constants::MAX_CHILDREN;
use crate::error::FetchError;

/// Child presence reported by a loaded parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildDescriptor {
  /// Bit 2 = x, bit 1 = y, bit 0 = z.
  pub octant: u8,
  pub num_points: u64,
}

/// Node geometry plus the hierarchy fields the scheduler needs.
///
/// Positions are optional: schedulers only need the counts and child
/// presence, pickers need positions in local point-cloud space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryPayload {
  pub num_points: u64,
  pub positions: Vec<Vec3>,
  pub children: SmallVec<[ChildDescriptor; MAX_CHILDREN]>,
}

impl GeometryPayload {
  pub fn new(num_points: u64) -> Self {
    Self {
      num_points,
      ..Default::default()
    }
  }

  pub fn with_child(mut self, octant: u8, num_points: u64) -> Self {
    self.children.push(ChildDescriptor { octant, num_points });
    self
  }

  pub fn with_positions(mut self, positions: Vec<Vec3>) -> Self {
    self.positions = positions;
    self
  }

  /// Reject payloads the octree cannot represent.
  pub fn validate(&self) -> Result<(), FetchError> {
    let mut seen = 0u8;
    for child in &self.children {
      if child.octant as usize >= MAX_CHILDREN {
        return Err(FetchError::MalformedPayload(format!(
          "child octant {} out of range",
          child.octant
        )));
      }
      let bit = 1u8 << child.octant;
      if seen & bit != 0 {
        return Err(FetchError::MalformedPayload(format!(
          "duplicate child octant {}",
          child.octant
        )));
      }
      seen |= bit;
    }

    if !self.positions.is_empty() && self.positions.len() as u64 != self.num_points {
      return Err(FetchError::MalformedPayload(format!(
        "{} positions for {} points",
        self.positions.len(),
        self.num_points
      )));
    }

    Ok(())
  }
}
