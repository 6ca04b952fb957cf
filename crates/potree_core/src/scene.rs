//! SceneGraph - attach/detach interface for the host renderer.
//!
//! The scheduler never touches renderer objects directly. Promoting a node
//! calls [`SceneGraph::attach`], eviction calls [`SceneGraph::detach`], and
//! every visible node gets its visibility, world matrix and material refreshed
//! once per frame.

use std::collections::HashMap;

use glam::DMat4;

use crate::loading::GeometryPayload;
use crate::material::PointCloudMaterial;
use crate::point_cloud::NodeKey;

/// Opaque handle to a renderer object owned by the scene adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneHandle(u64);

impl SceneHandle {
  pub fn new(raw: u64) -> Self {
    Self(raw)
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

/// Callback interface for renderer bridges.
///
/// Called only from [`Potree`](crate::potree::Potree) on the thread driving
/// updates. Newly attached objects start hidden.
pub trait SceneGraph {
  /// Create a renderer object for a promoted node under `parent`.
  fn attach(
    &mut self,
    key: NodeKey,
    parent: Option<SceneHandle>,
    payload: &GeometryPayload,
  ) -> SceneHandle;

  /// Release the renderer object and its GPU resources.
  fn detach(&mut self, handle: SceneHandle);

  fn set_visible(&mut self, handle: SceneHandle, visible: bool);

  /// Refresh world matrix and material of a visible node.
  fn update_node(&mut self, handle: SceneHandle, world: &DMat4, material: &PointCloudMaterial);

  /// Fade progress of the node's material in `[-1, 1]`, 0 when idle.
  fn transition_alpha(&self, _handle: SceneHandle) -> f32 {
    0.0
  }
}

#[derive(Clone, Debug)]
struct HeadlessObject {
  key: NodeKey,
  parent: Option<SceneHandle>,
  visible: bool,
  transition_alpha: f32,
  world: DMat4,
  num_points: u64,
}

/// Bookkeeping-only scene for headless hosts and tests.
#[derive(Debug, Default)]
pub struct HeadlessScene {
  objects: HashMap<SceneHandle, HeadlessObject>,
  next_handle: u64,
  detached: u64,
}

impl HeadlessScene {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }

  pub fn contains(&self, handle: SceneHandle) -> bool {
    self.objects.contains_key(&handle)
  }

  pub fn is_visible(&self, handle: SceneHandle) -> bool {
    self.objects.get(&handle).is_some_and(|object| object.visible)
  }

  pub fn visible_count(&self) -> usize {
    self.objects.values().filter(|object| object.visible).count()
  }

  pub fn key(&self, handle: SceneHandle) -> Option<NodeKey> {
    self.objects.get(&handle).map(|object| object.key)
  }

  pub fn parent(&self, handle: SceneHandle) -> Option<SceneHandle> {
    self.objects.get(&handle).and_then(|object| object.parent)
  }

  pub fn world_matrix(&self, handle: SceneHandle) -> Option<DMat4> {
    self.objects.get(&handle).map(|object| object.world)
  }

  /// Points held by attached objects.
  pub fn num_points(&self) -> u64 {
    self.objects.values().map(|object| object.num_points).sum()
  }

  /// Total detach calls since creation.
  pub fn detached_count(&self) -> u64 {
    self.detached
  }

  pub fn set_transition_alpha(&mut self, handle: SceneHandle, alpha: f32) {
    if let Some(object) = self.objects.get_mut(&handle) {
      object.transition_alpha = alpha;
    }
  }
}

impl SceneGraph for HeadlessScene {
  fn attach(
    &mut self,
    key: NodeKey,
    parent: Option<SceneHandle>,
    payload: &GeometryPayload,
  ) -> SceneHandle {
    let handle = SceneHandle(self.next_handle);
    self.next_handle += 1;
    self.objects.insert(
      handle,
      HeadlessObject {
        key,
        parent,
        visible: false,
        transition_alpha: 0.0,
        world: DMat4::IDENTITY,
        num_points: payload.num_points,
      },
    );
    handle
  }

  fn detach(&mut self, handle: SceneHandle) {
    if self.objects.remove(&handle).is_some() {
      self.detached += 1;
    }
  }

  fn set_visible(&mut self, handle: SceneHandle, visible: bool) {
    if let Some(object) = self.objects.get_mut(&handle) {
      object.visible = visible;
    }
  }

  fn update_node(&mut self, handle: SceneHandle, world: &DMat4, _material: &PointCloudMaterial) {
    if let Some(object) = self.objects.get_mut(&handle) {
      object.world = *world;
    }
  }

  fn transition_alpha(&self, handle: SceneHandle) -> f32 {
    self
      .objects
      .get(&handle)
      .map_or(0.0, |object| object.transition_alpha)
  }
}
