//! PointCloud - one streamed octree dataset.
//!
//! Each cloud owns its node arena, transform, material and fetch plumbing.
//! Clouds are independent: several can be scheduled in the same frame and
//! share one global point budget.
//!
//! # Transform
//!
//! Node bounds live in local space. `transform` places the cloud in world
//! space; the scheduler moves the camera into local space instead of moving
//! every node box out of it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::{DAffine3, DMat4, DVec3};

use crate::config::FailurePolicy;
use crate::constants::DEFAULT_MIN_NODE_PIXEL_SIZE;
use crate::error::FetchError;
use crate::loading::{
  FetchHandle, GeometryFetcher, GeometryPayload, LoadMode, Manifest, NodeLayout, NodeRequest,
  UrlResolver,
};
use crate::material::PointCloudMaterial;
use crate::octree::{child_name, Aabb, GeometryNode, LoadState, NodeId, OctreeNode};
use crate::scene::{SceneGraph, SceneHandle};

// =============================================================================
// CloudId / NodeKey - identifiers
// =============================================================================

/// Atomic counter for generating unique CloudIds.
static CLOUD_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque point cloud identifier, unique within the process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct CloudId(u64);

impl CloudId {
  /// Generate a new unique CloudId.
  pub fn new() -> Self {
    Self(CLOUD_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for CloudId {
  fn default() -> Self {
    Self::new()
  }
}

/// Globally unique node address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeKey {
  pub cloud: CloudId,
  pub node: NodeId,
}

/// Fetch completions observed by one poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadOutcome {
  pub loaded: Vec<NodeId>,
  pub failed: Vec<NodeId>,
}

// =============================================================================
// PointCloud
// =============================================================================

pub struct PointCloud {
  id: CloudId,
  name: String,
  nodes: Vec<OctreeNode>,
  fetcher: Arc<dyn GeometryFetcher>,
  resolver: UrlResolver,
  layout: NodeLayout,
  /// Nodes with a fetch in flight.
  loading: Vec<NodeId>,
  disposed: bool,

  /// Local-to-world transform.
  pub transform: DAffine3,
  pub material: PointCloudMaterial,
  /// Per-cloud cap on visible points; nodes over it are skipped.
  pub point_budget: Option<u64>,
  pub min_node_pixel_size: f64,
  /// Deepest level allowed to become visible.
  pub max_level: Option<u32>,
  /// Invisible clouds are reset and hidden but not traversed.
  pub visible: bool,
  pub show_bounding_box: bool,

  // Per-frame statistics, reset at the start of every update
  pub(crate) visible_nodes: Vec<NodeId>,
  pub(crate) visible_geometry: Vec<NodeId>,
  pub(crate) num_visible_points: u64,
}

impl std::fmt::Debug for PointCloud {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PointCloud")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("nodes", &self.nodes.len())
      .field("loading", &self.loading.len())
      .field("disposed", &self.disposed)
      .finish_non_exhaustive()
  }
}

impl PointCloud {
  /// Cloud with a single unloaded root node.
  ///
  /// `root_points` is the root's point count if known up front; a loaded
  /// payload overrides it.
  pub fn new(
    name: impl Into<String>,
    root_box: Aabb,
    root_points: u64,
    fetcher: Arc<dyn GeometryFetcher>,
    resolver: UrlResolver,
  ) -> Self {
    let root = OctreeNode::new(NodeId::ROOT, None, GeometryNode::new("r", 0, root_box, root_points));

    Self {
      id: CloudId::new(),
      name: name.into(),
      nodes: vec![root],
      fetcher,
      resolver,
      layout: NodeLayout::default(),
      loading: Vec::new(),
      disposed: false,
      transform: DAffine3::IDENTITY,
      material: PointCloudMaterial::default(),
      point_budget: None,
      min_node_pixel_size: DEFAULT_MIN_NODE_PIXEL_SIZE,
      max_level: None,
      visible: true,
      show_bounding_box: false,
      visible_nodes: Vec::new(),
      visible_geometry: Vec::new(),
      num_visible_points: 0,
    }
  }

  /// Cloud described by a parsed manifest. The root counts 0 points until
  /// its payload arrives.
  pub fn from_manifest(
    manifest: &Manifest,
    fetcher: Arc<dyn GeometryFetcher>,
    resolver: UrlResolver,
  ) -> Self {
    Self::new(manifest.name.clone(), manifest.bounding_box, 0, fetcher, resolver)
      .with_layout(manifest.layout.clone())
  }

  pub fn with_layout(mut self, layout: NodeLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn with_transform(mut self, transform: DAffine3) -> Self {
    self.transform = transform;
    self
  }

  #[inline]
  pub fn id(&self) -> CloudId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  #[inline]
  pub fn root(&self) -> &OctreeNode {
    &self.nodes[NodeId::ROOT.index()]
  }

  #[inline]
  pub fn node(&self, id: NodeId) -> Option<&OctreeNode> {
    self.nodes.get(id.index())
  }

  #[inline]
  pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut OctreeNode> {
    self.nodes.get_mut(id.index())
  }

  /// Look up a node by Potree name (`r`, `r0`, `r07`, ...).
  pub fn find_node(&self, name: &str) -> Option<NodeId> {
    self
      .nodes
      .iter()
      .find(|node| node.geometry().name == name)
      .map(|node| node.id)
  }

  pub fn nodes(&self) -> impl Iterator<Item = &OctreeNode> {
    self.nodes.iter()
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  #[inline]
  pub fn key(&self, node: NodeId) -> NodeKey {
    NodeKey {
      cloud: self.id,
      node,
    }
  }

  #[inline]
  pub fn is_disposed(&self) -> bool {
    self.disposed
  }

  #[inline]
  pub fn world_matrix(&self) -> DMat4 {
    DMat4::from(self.transform)
  }

  /// Convert a world-space position into local octree space.
  #[inline]
  pub fn viewer_to_local(&self, position: DVec3) -> DVec3 {
    self.transform.inverse().transform_point3(position)
  }

  /// Nodes shown this frame, in traversal order.
  pub fn visible_nodes(&self) -> &[NodeId] {
    &self.visible_nodes
  }

  /// Nodes whose geometry was needed this frame (shown or waiting on a load).
  pub fn visible_geometry(&self) -> &[NodeId] {
    &self.visible_geometry
  }

  pub fn num_visible_points(&self) -> u64 {
    self.num_visible_points
  }

  pub fn num_nodes_loading(&self) -> usize {
    self.loading.len()
  }

  pub fn resident_count(&self) -> usize {
    self.nodes.iter().filter(|node| node.is_resident()).count()
  }

  /// Union of this frame's visible node boxes in local space.
  pub fn visible_bounds(&self) -> Option<Aabb> {
    self
      .visible_nodes
      .iter()
      .filter_map(|&id| self.node(id))
      .map(|node| node.geometry().bounding_box)
      .reduce(|acc, bounds| acc.union(&bounds))
  }

  /// World-space boxes of this frame's visible nodes, empty unless
  /// `show_bounding_box` is set.
  pub fn visible_bounding_boxes(&self) -> Vec<Aabb> {
    if !self.show_bounding_box {
      return Vec::new();
    }
    let world = self.world_matrix();
    self
      .visible_nodes
      .iter()
      .filter_map(|&id| self.node(id))
      .map(|node| node.geometry().bounding_box.transformed(&world))
      .collect()
  }

  pub(crate) fn reset_frame_stats(&mut self) {
    self.visible_nodes.clear();
    self.visible_geometry.clear();
    self.num_visible_points = 0;
  }

  /// Append a child in `octant` of `parent`, or return the existing one.
  pub fn add_child(&mut self, parent: NodeId, octant: u8, num_points: u64) -> Option<NodeId> {
    let slot = octant as usize;
    let parent_node = self.nodes.get(parent.index())?;
    if slot >= parent_node.children.len() {
      return None;
    }
    if let Some(existing) = parent_node.children[slot] {
      return Some(existing);
    }

    let parent_geometry = parent_node.geometry();
    let geometry = GeometryNode::new(
      child_name(&parent_geometry.name, octant),
      parent_geometry.level + 1,
      parent_geometry.bounding_box.octant(octant),
      num_points,
    );

    let id = NodeId::from_index(self.nodes.len());
    self.nodes.push(OctreeNode::new(id, Some(parent), geometry));
    self.nodes[parent.index()].children[slot] = Some(id);
    Some(id)
  }

  // ===========================================================================
  // Loading
  // ===========================================================================

  /// Start fetching an unloaded node. Returns false for any other state.
  pub(crate) fn dispatch_load(&mut self, id: NodeId, mode: LoadMode) -> bool {
    if self.disposed {
      return false;
    }
    let cloud = self.id;
    let Some(node) = self.nodes.get_mut(id.index()) else {
      return false;
    };
    let geometry = node.geometry_mut();
    if !matches!(geometry.load, LoadState::Unloaded) {
      return false;
    }

    let request = NodeRequest {
      cloud,
      node: id,
      name: geometry.name.clone(),
      level: geometry.level,
      url: (self.resolver)(&self.layout.relative_url(&geometry.name)),
    };
    tracing::trace!(node = %request.name, url = %request.url, "dispatching node load");

    geometry.load = LoadState::Loading(FetchHandle::dispatch(self.fetcher.clone(), request, mode));
    self.loading.push(id);
    true
  }

  /// Apply every finished fetch without blocking.
  pub fn poll_loads(&mut self, frame: u64) -> LoadOutcome {
    self.collect_loads(frame, |handle| handle.try_take())
  }

  /// Block up to `timeout` per in-flight fetch, then apply the results.
  pub fn wait_for_loads(&mut self, timeout: Duration, frame: u64) -> LoadOutcome {
    self.collect_loads(frame, |handle| handle.wait(timeout))
  }

  fn collect_loads<F>(&mut self, frame: u64, mut take: F) -> LoadOutcome
  where
    F: FnMut(&FetchHandle) -> Option<Result<GeometryPayload, FetchError>>,
  {
    let mut outcome = LoadOutcome::default();
    let pending = std::mem::take(&mut self.loading);

    for id in pending {
      let result = match self.nodes.get(id.index()).map(|node| &node.geometry().load) {
        Some(LoadState::Loading(handle)) => take(handle),
        _ => continue,
      };

      match result {
        Some(Ok(payload)) => {
          self.apply_payload(id, payload);
          outcome.loaded.push(id);
        }
        Some(Err(error)) => {
          self.apply_failure(id, &error, frame);
          outcome.failed.push(id);
        }
        None => self.loading.push(id),
      }
    }

    outcome
  }

  fn apply_payload(&mut self, id: NodeId, payload: GeometryPayload) {
    for child in &payload.children {
      if let Some(child_id) = self.add_child(id, child.octant, child.num_points) {
        if let Some(node) = self.nodes.get_mut(child_id.index()) {
          node.geometry_mut().num_points = child.num_points;
        }
      }
    }

    if let Some(node) = self.nodes.get_mut(id.index()) {
      let geometry = node.geometry_mut();
      geometry.num_points = payload.num_points;
      geometry.load = LoadState::Loaded(Arc::new(payload));
    }
  }

  fn apply_failure(&mut self, id: NodeId, error: &FetchError, frame: u64) {
    if let Some(node) = self.nodes.get_mut(id.index()) {
      let geometry = node.geometry_mut();
      geometry.failures += 1;
      geometry.load = LoadState::Failed {
        failed_at_frame: frame,
      };
      tracing::warn!(
        cloud = %self.name,
        node = %geometry.name,
        attempts = geometry.failures,
        %error,
        "node load failed"
      );
    }
  }

  /// Return eligible failed nodes to `Unloaded`. Returns how many.
  pub(crate) fn retry_failed(&mut self, policy: &FailurePolicy, frame: u64) -> usize {
    let FailurePolicy::Retry {
      after_frames,
      max_attempts,
    } = *policy
    else {
      return 0;
    };

    let mut retried = 0;
    for node in &mut self.nodes {
      let geometry = node.geometry_mut();
      if let LoadState::Failed { failed_at_frame } = geometry.load {
        if geometry.failures < max_attempts && frame.saturating_sub(failed_at_frame) >= after_frames {
          geometry.load = LoadState::Unloaded;
          retried += 1;
        }
      }
    }
    retried
  }

  // ===========================================================================
  // Promotion / eviction
  // ===========================================================================

  /// Promote a loaded node, attaching it under its parent's scene handle.
  pub(crate) fn promote<G: SceneGraph>(&mut self, id: NodeId, scene: &mut G) -> Option<SceneHandle> {
    let key = self.key(id);
    let node = self.nodes.get(id.index())?;
    if node.is_resident() {
      return node.scene_handle();
    }
    let payload = node.geometry().load.payload()?.clone();
    let parent_handle = match node.parent {
      Some(parent) => Some(self.node(parent)?.scene_handle()?),
      None => None,
    };

    let handle = scene.attach(key, parent_handle, &payload);
    self.nodes.get_mut(id.index())?.promote(handle);
    Some(handle)
  }

  /// Resident nodes of the subtree at `id`, children before parents.
  pub fn resident_subtree(&self, id: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![(id, false)];

    while let Some((current, expanded)) = stack.pop() {
      let Some(node) = self.node(current) else {
        continue;
      };
      if !node.is_resident() {
        continue;
      }
      if expanded {
        order.push(current);
      } else {
        stack.push((current, true));
        stack.extend(node.child_ids().map(|child| (child, false)));
      }
    }

    order
  }

  /// Demote the subtree at `id`, detaching scene objects children first.
  /// Returns the demoted nodes.
  pub(crate) fn evict<G: SceneGraph>(&mut self, id: NodeId, scene: &mut G) -> Vec<NodeId> {
    let subtree = self.resident_subtree(id);
    let mut demoted = Vec::with_capacity(subtree.len());

    for node_id in subtree {
      if let Some(handle) = self.nodes.get_mut(node_id.index()).and_then(OctreeNode::demote) {
        scene.detach(handle);
        demoted.push(node_id);
      }
    }

    if !demoted.is_empty() {
      tracing::debug!(cloud = %self.name, evicted = demoted.len(), "evicted resident subtree");
    }
    demoted
  }

  /// Release everything and mark the cloud disposed. Returns the nodes that
  /// were resident.
  pub(crate) fn dispose<G: SceneGraph>(&mut self, scene: &mut G) -> Vec<NodeId> {
    let released = self.evict(NodeId::ROOT, scene);

    // Dropping the handles discards late results
    for id in std::mem::take(&mut self.loading) {
      if let Some(node) = self.nodes.get_mut(id.index()) {
        node.geometry_mut().load = LoadState::Unloaded;
      }
    }

    self.reset_frame_stats();
    self.disposed = true;
    released
  }
}

#[cfg(test)]
#[path = "point_cloud_test.rs"]
mod point_cloud_test;
