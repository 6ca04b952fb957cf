//! Dual-state octree nodes stored in a per-cloud arena.
//!
//! A node starts as a [`GeometryNode`] (descriptor plus load state). Once its
//! payload is loaded and the scheduler has GPU budget for it, it is promoted to
//! a [`ResidentNode`] that additionally owns a scene handle. Eviction demotes
//! it back, keeping the loaded payload.
//!
//! ```text
//! Unloaded ──dispatch──► Loading ──ok──► Loaded ──promote──► Resident
//!                           │                ▲                   │
//!                           └──err──► Failed └─────evict─────────┘
//! ```

use std::sync::Arc;

use super::{Aabb, BoundingSphere};
use crate::constants::MAX_CHILDREN;
use crate::loading::{FetchHandle, GeometryPayload};
use crate::scene::SceneHandle;

/// Index of a node inside its point cloud's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
  /// Every cloud's root occupies the first arena slot.
  pub const ROOT: NodeId = NodeId(0);

  #[inline]
  pub fn from_index(index: usize) -> Self {
    Self(index as u32)
  }

  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Fetch progress of a node's geometry.
#[derive(Debug, Default)]
pub enum LoadState {
  #[default]
  Unloaded,
  /// Fetch in flight; the handle is polled at the start of each update.
  Loading(FetchHandle),
  Loaded(Arc<GeometryPayload>),
  Failed {
    failed_at_frame: u64,
  },
}

impl LoadState {
  #[inline]
  pub fn is_loaded(&self) -> bool {
    matches!(self, LoadState::Loaded(_))
  }

  #[inline]
  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading(_))
  }

  #[inline]
  pub fn is_failed(&self) -> bool {
    matches!(self, LoadState::Failed { .. })
  }

  pub fn payload(&self) -> Option<&Arc<GeometryPayload>> {
    match self {
      LoadState::Loaded(payload) => Some(payload),
      _ => None,
    }
  }
}

/// Descriptor shared by both node states.
#[derive(Debug, Default)]
pub struct GeometryNode {
  /// Potree node name: `r` for the root, then one octant digit per level.
  pub name: String,
  pub level: u32,
  /// Local point-cloud space.
  pub bounding_box: Aabb,
  pub bounding_sphere: BoundingSphere,
  pub num_points: u64,
  pub load: LoadState,
  /// Failed fetch attempts, kept across retries.
  pub failures: u32,
}

impl GeometryNode {
  pub fn new(name: impl Into<String>, level: u32, bounding_box: Aabb, num_points: u64) -> Self {
    Self {
      name: name.into(),
      level,
      bounding_sphere: bounding_box.bounding_sphere(),
      bounding_box,
      num_points,
      load: LoadState::Unloaded,
      failures: 0,
    }
  }
}

/// GPU-resident node: the geometry descriptor plus its live scene handle.
#[derive(Debug)]
pub struct ResidentNode {
  pub geometry: GeometryNode,
  pub scene: SceneHandle,
}

#[derive(Debug)]
pub enum NodeState {
  Geometry(GeometryNode),
  Resident(ResidentNode),
}

/// Arena entry with non-owning links to parent and children.
#[derive(Debug)]
pub struct OctreeNode {
  pub id: NodeId,
  pub parent: Option<NodeId>,
  /// Indexed by octant (bit 2 = x, bit 1 = y, bit 0 = z).
  pub children: [Option<NodeId>; MAX_CHILDREN],
  pub state: NodeState,
}

impl OctreeNode {
  pub fn new(id: NodeId, parent: Option<NodeId>, geometry: GeometryNode) -> Self {
    Self {
      id,
      parent,
      children: [None; MAX_CHILDREN],
      state: NodeState::Geometry(geometry),
    }
  }

  #[inline]
  pub fn geometry(&self) -> &GeometryNode {
    match &self.state {
      NodeState::Geometry(geometry) => geometry,
      NodeState::Resident(resident) => &resident.geometry,
    }
  }

  #[inline]
  pub fn geometry_mut(&mut self) -> &mut GeometryNode {
    match &mut self.state {
      NodeState::Geometry(geometry) => geometry,
      NodeState::Resident(resident) => &mut resident.geometry,
    }
  }

  #[inline]
  pub fn is_resident(&self) -> bool {
    matches!(self.state, NodeState::Resident(_))
  }

  #[inline]
  pub fn scene_handle(&self) -> Option<SceneHandle> {
    match &self.state {
      NodeState::Resident(resident) => Some(resident.scene),
      NodeState::Geometry(_) => None,
    }
  }

  #[inline]
  pub fn level(&self) -> u32 {
    self.geometry().level
  }

  /// Ids of existing children in octant order.
  pub fn child_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
    self.children.iter().flatten().copied()
  }

  /// Geometry -> Resident. Returns false when already resident.
  pub fn promote(&mut self, handle: SceneHandle) -> bool {
    let state = std::mem::replace(&mut self.state, NodeState::Geometry(GeometryNode::default()));
    match state {
      NodeState::Geometry(geometry) => {
        self.state = NodeState::Resident(ResidentNode {
          geometry,
          scene: handle,
        });
        true
      }
      resident @ NodeState::Resident(_) => {
        self.state = resident;
        false
      }
    }
  }

  /// Resident -> Geometry, returning the released scene handle.
  pub fn demote(&mut self) -> Option<SceneHandle> {
    let state = std::mem::replace(&mut self.state, NodeState::Geometry(GeometryNode::default()));
    match state {
      NodeState::Resident(ResidentNode { geometry, scene }) => {
        self.state = NodeState::Geometry(geometry);
        Some(scene)
      }
      geometry @ NodeState::Geometry(_) => {
        self.state = geometry;
        None
      }
    }
  }
}

/// Name of the child in `octant` under `parent`.
pub fn child_name(parent: &str, octant: u8) -> String {
  format!("{parent}{octant}")
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
