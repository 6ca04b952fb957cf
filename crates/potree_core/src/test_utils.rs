//! Shared fixtures for unit tests: a scripted fetcher and camera helpers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use glam::DVec3;

use crate::camera::{Camera, Viewport};
use crate::config::PotreeConfig;
use crate::error::FetchError;
use crate::loading::{identity_resolver, GeometryFetcher, GeometryPayload, LoadMode, NodeRequest};
use crate::octree::Aabb;
use crate::point_cloud::PointCloud;

/// Fetcher answering from a per-node-name script.
///
/// Unknown nodes fail with `NotFound`. Every request is recorded.
#[derive(Default)]
pub struct ScriptedFetcher {
  nodes: Mutex<HashMap<String, Result<GeometryPayload, FetchError>>>,
  manifests: Mutex<HashMap<String, Vec<u8>>>,
  requests: Mutex<Vec<NodeRequest>>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_node(self, name: &str, payload: GeometryPayload) -> Self {
    self.set_node(name, Ok(payload));
    self
  }

  pub fn with_failure(self, name: &str, error: FetchError) -> Self {
    self.set_node(name, Err(error));
    self
  }

  pub fn with_manifest(self, url: &str, body: &str) -> Self {
    self
      .manifests
      .lock()
      .unwrap()
      .insert(url.to_owned(), body.as_bytes().to_vec());
    self
  }

  pub fn set_node(&self, name: &str, result: Result<GeometryPayload, FetchError>) {
    self.nodes.lock().unwrap().insert(name.to_owned(), result);
  }

  pub fn requests(&self) -> Vec<NodeRequest> {
    self.requests.lock().unwrap().clone()
  }

  pub fn request_count(&self, name: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|request| request.name == name)
      .count()
  }
}

impl GeometryFetcher for ScriptedFetcher {
  fn fetch_manifest(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    self
      .manifests
      .lock()
      .unwrap()
      .get(url)
      .cloned()
      .ok_or_else(|| FetchError::NotFound(url.to_owned()))
  }

  fn fetch_node(&self, request: &NodeRequest) -> Result<GeometryPayload, FetchError> {
    self.requests.lock().unwrap().push(request.clone());
    self
      .nodes
      .lock()
      .unwrap()
      .get(&request.name)
      .cloned()
      .unwrap_or_else(|| Err(FetchError::NotFound(request.url.clone())))
  }
}

/// Cube of edge `size` centered on the origin.
pub fn cube(size: f64) -> Aabb {
  Aabb::from_center_half_extents(DVec3::ZERO, DVec3::splat(size * 0.5))
}

/// 60° perspective camera on the +Z axis looking at the origin.
pub fn camera_at(distance: f64) -> Camera {
  Camera::perspective(60.0, 1.0, 0.1, 10_000.0).looking_at(
    DVec3::new(0.0, 0.0, distance),
    DVec3::ZERO,
    DVec3::Y,
  )
}

/// Same camera turned around to face +Z, away from the origin.
pub fn camera_facing_away(distance: f64) -> Camera {
  Camera::perspective(60.0, 1.0, 0.1, 10_000.0).looking_at(
    DVec3::new(0.0, 0.0, distance),
    DVec3::new(0.0, 0.0, distance + 1.0),
    DVec3::Y,
  )
}

pub fn viewport() -> Viewport {
  Viewport::new(1000, 1000)
}

/// Deterministic config: fetches complete during dispatch.
pub fn inline_config(point_budget: u64) -> PotreeConfig {
  PotreeConfig {
    point_budget,
    load_mode: LoadMode::Inline,
    ..Default::default()
  }
}

/// Cloud over a 10-unit cube centered on the origin.
pub fn cloud(fetcher: &Arc<ScriptedFetcher>, root_points: u64) -> PointCloud {
  PointCloud::new("test", cube(10.0), root_points, fetcher.clone(), identity_resolver())
}
