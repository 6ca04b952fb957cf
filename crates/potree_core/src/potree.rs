//! Potree - per-frame visibility scheduler.
//!
//! # Flow
//!
//! ```text
//! update_point_clouds(ids, camera, viewport)
//! ┌─────────────────────────────────────────────────────────────┐
//! │ 1. poll finished fetches, retry failed nodes (per policy)  │
//! │ 2. per cloud: hide last frame's nodes, reset stats,        │
//! │    local frustum + camera, push root at MAX_WEIGHT         │
//! │ 3. pop by weight until the point budget would overflow     │
//! │      reject: level > max_level, outside frustum, clipped   │
//! │      count points                                          │
//! │      Geometry: promote (≤ max_loads_to_gpu) / queue load / │
//! │                prune on failure                            │
//! │      Resident: touch LRU, show, update, push children      │
//! │ 4. dispatch up to max_num_nodes_loading fetches            │
//! │ 5. LRU free_memory                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fetch results are only observed in step 1, so a single update never sees
//! a node change load state under it.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec3;
use web_time::Instant;

use crate::budget::AdaptiveBudget;
use crate::camera::{Camera, Ray, Viewport};
use crate::config::PotreeConfig;
use crate::constants::MAX_WEIGHT;
use crate::error::{PotreeError, PotreeResult};
use crate::heap::BinaryHeap;
use crate::loading::{GeometryFetcher, Manifest, ManifestKind, UrlResolver};
use crate::lru::RecencyCache;
use crate::metrics::SchedulerMetrics;
use crate::octree::{fade_adjusted, projection_factor, Frustum, LoadState, NodeId};
use crate::picker::{PickParams, PickPoint, Picker};
use crate::point_cloud::{CloudId, NodeKey, PointCloud};
use crate::scene::SceneGraph;

/// Traversal entry. Lives for one update only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueueItem {
  /// Position of the cloud in this update's cloud list.
  pub cloud_index: usize,
  pub weight: f64,
  pub node: NodeId,
  pub parent: Option<NodeId>,
}

/// Report returned by [`Potree::update_point_clouds`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilityResult {
  /// Resident nodes shown this frame, in traversal order.
  pub visible_nodes: Vec<NodeKey>,
  pub num_visible_points: u64,
  /// A loaded node was left waiting because the promotion limit was reached.
  pub exceeded_max_loads_to_gpu: bool,
  /// A failed node was reached and its subtree skipped.
  pub node_load_failed: bool,
  /// Nodes with a fetch outstanding for this frame's wanted set.
  pub node_loads: Vec<NodeKey>,
}

/// Point cloud streaming scheduler, generic over the host scene.
pub struct Potree<G: SceneGraph> {
  config: PotreeConfig,
  clouds: Vec<PointCloud>,
  index: HashMap<CloudId, usize>,
  lru: RecencyCache,
  scene: G,
  frame: u64,
  metrics: SchedulerMetrics,
}

impl<G: SceneGraph> Potree<G> {
  pub fn new(scene: G) -> Self {
    Self::build(PotreeConfig::default(), scene)
  }

  /// Scheduler with validated custom limits.
  pub fn with_config(config: PotreeConfig, scene: G) -> PotreeResult<Self> {
    config.validate()?;
    Ok(Self::build(config, scene))
  }

  fn build(config: PotreeConfig, scene: G) -> Self {
    Self {
      lru: RecencyCache::new(config.point_budget),
      config,
      clouds: Vec::new(),
      index: HashMap::new(),
      scene,
      frame: 0,
      metrics: SchedulerMetrics::default(),
    }
  }

  pub fn config(&self) -> &PotreeConfig {
    &self.config
  }

  pub fn scene(&self) -> &G {
    &self.scene
  }

  pub fn scene_mut(&mut self) -> &mut G {
    &mut self.scene
  }

  pub fn cache(&self) -> &RecencyCache {
    &self.lru
  }

  pub fn metrics(&self) -> &SchedulerMetrics {
    &self.metrics
  }

  /// Updates run so far.
  pub fn frame(&self) -> u64 {
    self.frame
  }

  // ===========================================================================
  // Point clouds
  // ===========================================================================

  /// Fetch and parse a manifest, then register a cloud for it.
  ///
  /// `url` must name a `cloud.js` or `metadata.json`; it is passed through
  /// `resolver` before fetching, like every node URL of the cloud.
  #[tracing::instrument(skip_all, name = "potree::load_point_cloud", fields(url = %url))]
  pub fn load_point_cloud(
    &mut self,
    url: &str,
    resolver: UrlResolver,
    fetcher: Arc<dyn GeometryFetcher>,
  ) -> PotreeResult<CloudId> {
    if let Err(error) = ManifestKind::from_url(url) {
      tracing::warn!(%url, "unsupported point cloud manifest");
      return Err(error);
    }

    let bytes = fetcher
      .fetch_manifest(&resolver(url))
      .map_err(|source| PotreeError::Fetch {
        url: url.to_owned(),
        source,
      })?;
    let manifest = Manifest::parse(url, &bytes)?;

    let mut cloud = PointCloud::from_manifest(&manifest, fetcher, resolver);
    cloud.min_node_pixel_size = self.config.default_min_node_pixel_size;
    tracing::info!(cloud = %manifest.name, points = ?manifest.total_points, "point cloud loaded");
    Ok(self.add_point_cloud(cloud))
  }

  /// Register a cloud built in memory.
  pub fn add_point_cloud(&mut self, cloud: PointCloud) -> CloudId {
    let id = cloud.id();
    self.index.insert(id, self.clouds.len());
    self.clouds.push(cloud);
    id
  }

  pub fn point_cloud(&self, id: CloudId) -> Option<&PointCloud> {
    self.index.get(&id).map(|&i| &self.clouds[i])
  }

  pub fn point_cloud_mut(&mut self, id: CloudId) -> Option<&mut PointCloud> {
    self.index.get(&id).map(|&i| &mut self.clouds[i])
  }

  /// Registered cloud ids in insertion order.
  pub fn cloud_ids(&self) -> Vec<CloudId> {
    self.clouds.iter().map(PointCloud::id).collect()
  }

  /// Detach every resident node, drop in-flight fetches and skip the cloud
  /// in all later updates. Returns false for unknown or disposed clouds.
  pub fn dispose_point_cloud(&mut self, id: CloudId) -> bool {
    let Some(&i) = self.index.get(&id) else {
      return false;
    };
    let cloud = &mut self.clouds[i];
    if cloud.is_disposed() {
      return false;
    }

    let released = cloud.dispose(&mut self.scene);
    for node in released {
      self.lru.remove(&NodeKey { cloud: id, node });
    }
    tracing::info!(cloud = %cloud.name(), "point cloud disposed");
    true
  }

  // ===========================================================================
  // Budget
  // ===========================================================================

  pub fn point_budget(&self) -> u64 {
    self.config.point_budget
  }

  /// Change the global point budget, evicting right away if it shrank.
  pub fn set_point_budget(&mut self, point_budget: u64) {
    if point_budget == self.config.point_budget {
      return;
    }
    self.config.point_budget = point_budget;
    self.lru.set_point_budget(point_budget);
    self.free_memory();
  }

  /// Feed one frame time to `budget` and apply the adjusted point budget.
  pub fn apply_adaptive_budget(&mut self, budget: &mut AdaptiveBudget, frame_time: std::time::Duration) -> u64 {
    let adjusted = budget.record_frame(frame_time, self.config.point_budget);
    self.set_point_budget(adjusted);
    adjusted
  }

  /// Evict least-recently-used resident nodes until the cache fits the
  /// budget. Returns the number of nodes demoted.
  #[tracing::instrument(skip_all, name = "potree::free_memory")]
  pub fn free_memory(&mut self) -> usize {
    let Self {
      clouds,
      index,
      lru,
      scene,
      metrics,
      ..
    } = self;

    let evicted = lru.free_memory(|key| {
      let Some(&i) = index.get(&key.cloud) else {
        return Vec::new();
      };
      clouds[i]
        .evict(key.node, scene)
        .into_iter()
        .map(|node| NodeKey {
          cloud: key.cloud,
          node,
        })
        .collect()
    });

    if evicted > 0 {
      tracing::debug!(evicted, cached_points = lru.num_points(), "freed memory");
      metrics.record_evictions(evicted);
    }
    evicted
  }

  // ===========================================================================
  // Per-frame update
  // ===========================================================================

  /// Decide visibility for `cloud_ids`, promote loaded nodes, start fetches
  /// and enforce the point budget.
  ///
  /// Unknown and disposed ids are ignored. Errors only for an unusable
  /// camera or viewport.
  #[tracing::instrument(skip_all, name = "potree::update_point_clouds")]
  pub fn update_point_clouds(
    &mut self,
    cloud_ids: &[CloudId],
    camera: &Camera,
    viewport: &Viewport,
  ) -> PotreeResult<VisibilityResult> {
    camera.validate()?;
    viewport.validate()?;
    let view_projection = camera.projection_matrix() * camera.view_matrix()?;
    let half_height = viewport.half_height();
    let started = Instant::now();

    self.frame += 1;
    let frame = self.frame;

    let Self {
      config,
      clouds,
      index,
      lru,
      scene,
      metrics,
      ..
    } = self;

    // Clouds taking part this frame, first occurrence wins
    let mut active: Vec<usize> = Vec::with_capacity(cloud_ids.len());
    for id in cloud_ids {
      if let Some(&i) = index.get(id) {
        if !clouds[i].is_disposed() && !active.contains(&i) {
          active.push(i);
        }
      }
    }

    for &i in &active {
      let cloud = &mut clouds[i];
      let outcome = cloud.poll_loads(frame);
      metrics.record_load_outcomes(outcome.loaded.len(), outcome.failed.len());
      let retried = cloud.retry_failed(&config.failure_policy, frame);
      if retried > 0 {
        tracing::debug!(cloud = %cloud.name(), retried, "retrying failed nodes");
      }
    }

    // Visibility structures: local frustums, local camera positions, queue
    let mut frustums = Vec::with_capacity(active.len());
    let mut camera_positions: Vec<DVec3> = Vec::with_capacity(active.len());
    let mut queue = BinaryHeap::with_capacity(64, |item: &QueueItem| 1.0 / item.weight);

    for (slot, &i) in active.iter().enumerate() {
      let cloud = &mut clouds[i];

      // Hide last frame's nodes; survivors are shown again below
      for &id in &cloud.visible_nodes {
        if let Some(handle) = cloud.node(id).and_then(|node| node.scene_handle()) {
          scene.set_visible(handle, false);
        }
      }
      cloud.reset_frame_stats();

      frustums.push(Frustum::from_matrix(&(view_projection * cloud.world_matrix())));
      camera_positions.push(cloud.viewer_to_local(camera.position()));

      if cloud.visible {
        queue.push(QueueItem {
          cloud_index: slot,
          weight: MAX_WEIGHT,
          node: NodeId::ROOT,
          parent: None,
        });
      }
    }

    let mut result = VisibilityResult::default();
    let mut unloaded: Vec<(usize, NodeId)> = Vec::new();
    let mut loaded_to_gpu = 0usize;

    while let Some(item) = queue.pop() {
      let cloud = &mut clouds[active[item.cloud_index]];
      let Some(node) = cloud.node(item.node) else {
        continue;
      };
      let geometry = node.geometry();
      let num_points = geometry.num_points;
      let level = geometry.level;
      let bounding_box = geometry.bounding_box;
      let resident = node.is_resident();
      let (loaded, failed) = (geometry.load.is_loaded(), geometry.load.is_failed());

      if result.num_visible_points + num_points > config.point_budget {
        break;
      }

      let too_deep = cloud.max_level.is_some_and(|max_level| level > max_level);
      if too_deep
        || !frustums[item.cloud_index].intersects_box(&bounding_box)
        || cloud
          .material
          .excludes(&bounding_box.transformed(&cloud.world_matrix()))
      {
        continue;
      }

      if cloud
        .point_budget
        .is_some_and(|cap| cloud.num_visible_points + num_points > cap)
      {
        continue;
      }

      result.num_visible_points += num_points;
      cloud.num_visible_points += num_points;

      if !resident {
        if loaded && loaded_to_gpu < config.max_loads_to_gpu {
          if cloud.promote(item.node, scene).is_some() {
            loaded_to_gpu += 1;
          }
        } else if !failed {
          if loaded {
            result.exceeded_max_loads_to_gpu = true;
            tracing::debug!(cloud = %cloud.name(), node = item.node.index(), "promotion limit reached");
          }
          unloaded.push((item.cloud_index, item.node));
          cloud.visible_geometry.push(item.node);
          continue;
        } else {
          result.node_load_failed = true;
          continue;
        }
      }

      // Resident from here on
      let Some(node) = cloud.node(item.node) else {
        continue;
      };
      let Some(handle) = node.scene_handle() else {
        continue;
      };
      let key = cloud.key(item.node);

      lru.touch(key, num_points);
      scene.set_visible(handle, true);
      scene.update_node(handle, &cloud.world_matrix(), &cloud.material);
      result.visible_nodes.push(key);

      let camera_position = camera_positions[item.cloud_index];
      for child_id in node.child_ids() {
        let Some(child) = cloud.node(child_id) else {
          continue;
        };
        let sphere = child.geometry().bounding_sphere;
        let distance = sphere.center.distance(camera_position);
        let screen_pixel_radius =
          sphere.radius * projection_factor(&camera.projection, half_height, distance);

        if screen_pixel_radius < cloud.min_node_pixel_size {
          continue;
        }

        let mut weight =
          config
            .lod_weighting
            .weight(distance, sphere.radius, screen_pixel_radius, child.level());
        if let Some(child_handle) = child.scene_handle() {
          weight = fade_adjusted(weight, scene.transition_alpha(child_handle));
        }

        queue.push(QueueItem {
          cloud_index: item.cloud_index,
          weight,
          node: child_id,
          parent: Some(item.node),
        });
      }

      cloud.visible_nodes.push(item.node);
      cloud.visible_geometry.push(item.node);
    }

    // Dispatch fetches in priority order, respecting the in-flight limit
    let mut in_flight: usize = active.iter().map(|&i| clouds[i].num_nodes_loading()).sum();
    let mut started_loads = 0usize;

    for (slot, id) in unloaded {
      if result.node_loads.len() >= config.max_num_nodes_loading {
        break;
      }
      let cloud = &mut clouds[active[slot]];
      let Some(load) = cloud.node(id).map(|node| &node.geometry().load) else {
        continue;
      };
      let (loading, idle) = (load.is_loading(), matches!(load, LoadState::Unloaded));

      if loading {
        result.node_loads.push(cloud.key(id));
      } else if idle
        && in_flight < config.max_num_nodes_loading
        && cloud.dispatch_load(id, config.load_mode)
      {
        in_flight += 1;
        started_loads += 1;
        result.node_loads.push(cloud.key(id));
      }
    }

    metrics.record_promotions(loaded_to_gpu);
    metrics.record_loads_started(started_loads);

    self.free_memory();

    self.metrics.record_update(
      started.elapsed().as_micros() as u64,
      result.num_visible_points,
      result.visible_nodes.len(),
    );
    tracing::trace!(
      visible_nodes = result.visible_nodes.len(),
      visible_points = result.num_visible_points,
      loads = result.node_loads.len(),
      "visibility updated"
    );

    Ok(result)
  }

  // ===========================================================================
  // Picking
  // ===========================================================================

  /// Nearest resident point along `ray` among the given clouds.
  pub fn pick(
    &self,
    picker: &mut Picker,
    cloud_ids: &[CloudId],
    camera: &Camera,
    viewport: &Viewport,
    ray: &Ray,
    params: &PickParams,
  ) -> PotreeResult<Option<PickPoint>> {
    let clouds = cloud_ids.iter().filter_map(|id| self.point_cloud(*id));
    picker.pick(clouds, camera, viewport, ray, params)
  }
}

#[cfg(test)]
#[path = "potree_test.rs"]
mod potree_test;
