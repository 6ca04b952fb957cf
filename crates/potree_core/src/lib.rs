//! potree_core - Framework/engine independent point cloud streaming
//!
//! Schedules which nodes of one or more Potree octrees are shown each frame.
//! Nodes are fetched lazily, promoted to the host scene a few per frame and
//! evicted least-recently-used first, all under a global point budget.
//!
//! # Features
//!
//! - **Visibility scheduling**: weighted best-first traversal with frustum,
//!   clip box, level and screen-size culling
//! - **Streaming**: node fetches on the rayon pool, polled without blocking
//! - **Recency cache**: LRU eviction of whole resident subtrees
//! - **Picking**: nearest point along a ray among resident nodes
//! - **Engine agnostic**: the host scene sits behind [`SceneGraph`]
//!
//! # Example
//!
//! ```ignore
//! use potree_core::{identity_resolver, Camera, HeadlessScene, Potree, Viewport};
//!
//! let mut potree = Potree::new(HeadlessScene::new());
//! let cloud = potree.load_point_cloud("scans/cloud.js", identity_resolver(), fetcher)?;
//!
//! // Once per frame
//! let result = potree.update_point_clouds(&[cloud], &camera, &Viewport::new(1920, 1080))?;
//! println!("{} points in {} nodes", result.num_visible_points, result.visible_nodes.len());
//! ```

pub mod constants;
pub mod error;
pub use error::{FetchError, PotreeError, PotreeResult};

// Camera, viewport and rays
pub mod camera;
pub use camera::{Camera, Projection, Ray, Viewport};

// Octree nodes, bounds and LOD math
pub mod octree;
pub use octree::{Aabb, LodWeighting, NodeId, OctreeNode, WeightTier};

// Manifests, payloads and fetch dispatch
pub mod loading;
pub use loading::{
  base_url_resolver, identity_resolver, GeometryFetcher, GeometryPayload, LoadMode, Manifest,
  NodeRequest, UrlResolver,
};

pub mod heap;
pub mod lru;
pub use lru::RecencyCache;

pub mod material;
pub use material::{ClipBox, ClipMode, PointCloudMaterial};

// Host scene contract
pub mod scene;
pub use scene::{HeadlessScene, SceneGraph, SceneHandle};

pub mod point_cloud;
pub use point_cloud::{CloudId, NodeKey, PointCloud};

pub mod config;
pub use config::{FailurePolicy, PotreeConfig};

pub mod budget;
pub use budget::AdaptiveBudget;

pub mod metrics;
pub use metrics::SchedulerMetrics;

pub mod picker;
pub use picker::{PickParams, PickPoint, Picker};

// Per-frame scheduler
pub mod potree;
pub use potree::{Potree, VisibilityResult};

#[cfg(test)]
mod test_utils;
