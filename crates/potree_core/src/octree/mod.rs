//! Octree node model, bounding volumes and LOD math.
//!
//! Nodes live in a per-cloud arena addressed by [`NodeId`]. Everything here is
//! in the point cloud's local space; the scheduler moves the camera into that
//! space once per cloud per frame.
//!
//! # Module Structure
//!
//! - [`bounds`]: `Aabb`, `BoundingSphere`
//! - [`frustum`]: six-plane culling volume
//! - [`node`]: `OctreeNode` with its `Geometry` / `Resident` state
//! - [`lod`]: projection factor and queue weighting

pub mod bounds;
pub mod frustum;
pub mod lod;
pub mod node;

// Re-exports
pub use bounds::{Aabb, BoundingSphere};
pub use frustum::Frustum;
pub use lod::{fade_adjusted, projection_factor, LodWeighting, WeightTier};
pub use node::{child_name, GeometryNode, LoadState, NodeId, NodeState, OctreeNode, ResidentNode};
