use glam::DVec3;

use super::*;
use crate::scene::HeadlessScene;
use crate::test_utils::{cloud, ScriptedFetcher};

fn loaded_cloud(fetcher: &Arc<ScriptedFetcher>) -> PointCloud {
  let mut cloud = cloud(fetcher, 0);
  assert!(cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline));
  cloud.poll_loads(1);
  cloud
}

#[test]
fn test_new_cloud_has_unloaded_root() {
  let fetcher = Arc::new(ScriptedFetcher::new());
  let cloud = cloud(&fetcher, 42);

  assert_eq!(cloud.node_count(), 1);
  assert_eq!(cloud.root().geometry().name, "r");
  assert_eq!(cloud.root().geometry().num_points, 42);
  assert!(matches!(cloud.root().geometry().load, LoadState::Unloaded));
  assert!(!cloud.is_disposed());
}

#[test]
fn test_loaded_payload_creates_children() {
  let fetcher = Arc::new(
    ScriptedFetcher::new().with_node("r", GeometryPayload::new(100).with_child(0, 30).with_child(7, 40)),
  );
  let cloud = loaded_cloud(&fetcher);

  assert!(cloud.root().geometry().load.is_loaded());
  assert_eq!(cloud.root().geometry().num_points, 100);
  assert_eq!(cloud.node_count(), 3);

  let r0 = cloud.find_node("r0").unwrap();
  let r7 = cloud.find_node("r7").unwrap();
  assert_eq!(cloud.root().children[0], Some(r0));
  assert_eq!(cloud.root().children[7], Some(r7));

  let child = cloud.node(r7).unwrap();
  assert_eq!(child.parent, Some(NodeId::ROOT));
  assert_eq!(child.level(), 1);
  assert_eq!(child.geometry().num_points, 40);
  assert_eq!(child.geometry().bounding_box.min, DVec3::ZERO);
  assert_eq!(child.geometry().bounding_box.max, DVec3::splat(5.0));
}

#[test]
fn test_request_uses_layout_and_resolver() {
  let fetcher = Arc::new(ScriptedFetcher::new().with_node("r", GeometryPayload::new(1)));
  let mut cloud = PointCloud::new(
    "scan",
    crate::test_utils::cube(2.0),
    0,
    fetcher.clone(),
    crate::loading::base_url_resolver("https://cdn.test/scan"),
  );
  cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline);

  let requests = fetcher.requests();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].url, "https://cdn.test/scan/data/r/r.bin");
  assert_eq!(requests[0].cloud, cloud.id());
}

#[test]
fn test_loading_node_is_not_dispatched_twice() {
  let fetcher = Arc::new(ScriptedFetcher::new().with_node("r", GeometryPayload::new(1)));
  let mut cloud = cloud(&fetcher, 0);

  assert!(cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline));
  assert!(!cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline));
  assert_eq!(cloud.num_nodes_loading(), 1);
  assert_eq!(fetcher.request_count("r"), 1);

  let outcome = cloud.poll_loads(1);
  assert_eq!(outcome.loaded, vec![NodeId::ROOT]);
  assert_eq!(cloud.num_nodes_loading(), 0);

  // Loaded nodes are never fetched again
  assert!(!cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline));
}

#[test]
fn test_background_load_completes_with_wait() {
  let fetcher = Arc::new(ScriptedFetcher::new().with_node("r", GeometryPayload::new(9)));
  let mut cloud = cloud(&fetcher, 0);

  cloud.dispatch_load(NodeId::ROOT, LoadMode::Background);
  let outcome = cloud.wait_for_loads(Duration::from_secs(5), 1);

  assert_eq!(outcome.loaded, vec![NodeId::ROOT]);
  assert_eq!(cloud.root().geometry().num_points, 9);
}

#[test]
fn test_failure_and_retry_policy() {
  let fetcher = Arc::new(ScriptedFetcher::new().with_failure("r", FetchError::Transport("503".into())));
  let mut cloud = cloud(&fetcher, 0);

  cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline);
  let outcome = cloud.poll_loads(10);
  assert_eq!(outcome.failed, vec![NodeId::ROOT]);
  assert!(matches!(
    cloud.root().geometry().load,
    LoadState::Failed { failed_at_frame: 10 }
  ));
  assert_eq!(cloud.root().geometry().failures, 1);

  // Prune never retries
  assert_eq!(cloud.retry_failed(&FailurePolicy::Prune, 1000), 0);

  let retry = FailurePolicy::Retry {
    after_frames: 5,
    max_attempts: 2,
  };
  assert_eq!(cloud.retry_failed(&retry, 14), 0);
  assert_eq!(cloud.retry_failed(&retry, 15), 1);
  assert!(matches!(cloud.root().geometry().load, LoadState::Unloaded));

  // Second failure exhausts the attempts
  cloud.dispatch_load(NodeId::ROOT, LoadMode::Inline);
  cloud.poll_loads(20);
  assert_eq!(cloud.root().geometry().failures, 2);
  assert_eq!(cloud.retry_failed(&retry, 100), 0);
}

#[test]
fn test_promote_requires_payload_and_resident_parent() {
  let fetcher = Arc::new(
    ScriptedFetcher::new()
      .with_node("r", GeometryPayload::new(10).with_child(1, 5))
      .with_node("r1", GeometryPayload::new(5)),
  );
  let mut cloud = loaded_cloud(&fetcher);
  let mut scene = HeadlessScene::new();
  let child = cloud.find_node("r1").unwrap();

  // Child not loaded yet
  assert!(cloud.promote(child, &mut scene).is_none());

  cloud.dispatch_load(child, LoadMode::Inline);
  cloud.poll_loads(2);

  // Parent not resident yet
  assert!(cloud.promote(child, &mut scene).is_none());

  let root_handle = cloud.promote(NodeId::ROOT, &mut scene).unwrap();
  let child_handle = cloud.promote(child, &mut scene).unwrap();
  assert_eq!(scene.parent(child_handle), Some(root_handle));
  assert_eq!(cloud.resident_count(), 2);
}

#[test]
fn test_evict_demotes_children_first() {
  let fetcher = Arc::new(
    ScriptedFetcher::new()
      .with_node("r", GeometryPayload::new(10).with_child(1, 5))
      .with_node("r1", GeometryPayload::new(5)),
  );
  let mut cloud = loaded_cloud(&fetcher);
  let mut scene = HeadlessScene::new();
  let child = cloud.find_node("r1").unwrap();
  cloud.dispatch_load(child, LoadMode::Inline);
  cloud.poll_loads(2);
  cloud.promote(NodeId::ROOT, &mut scene);
  cloud.promote(child, &mut scene);

  assert_eq!(cloud.resident_subtree(NodeId::ROOT), vec![child, NodeId::ROOT]);

  let demoted = cloud.evict(NodeId::ROOT, &mut scene);
  assert_eq!(demoted, vec![child, NodeId::ROOT]);
  assert!(scene.is_empty());
  assert_eq!(cloud.resident_count(), 0);

  // Payloads survive eviction
  assert!(cloud.root().geometry().load.is_loaded());
  assert!(cloud.node(child).unwrap().geometry().load.is_loaded());
}

#[test]
fn test_dispose_releases_everything() {
  let fetcher = Arc::new(ScriptedFetcher::new().with_node("r", GeometryPayload::new(10).with_child(2, 5)));
  let mut cloud = loaded_cloud(&fetcher);
  let mut scene = HeadlessScene::new();
  cloud.promote(NodeId::ROOT, &mut scene);

  let child = cloud.find_node("r2").unwrap();
  fetcher.set_node("r2", Ok(GeometryPayload::new(5)));
  cloud.dispatch_load(child, LoadMode::Inline);

  let released = cloud.dispose(&mut scene);
  assert_eq!(released, vec![NodeId::ROOT]);
  assert!(cloud.is_disposed());
  assert!(scene.is_empty());
  assert_eq!(cloud.num_nodes_loading(), 0);
  assert!(!cloud.node(child).unwrap().geometry().load.is_loading());
  assert!(!cloud.dispatch_load(child, LoadMode::Inline));
}

#[test]
fn test_visible_bounds_and_boxes() {
  let fetcher = Arc::new(ScriptedFetcher::new().with_node("r", GeometryPayload::new(10).with_child(0, 1).with_child(7, 1)));
  let mut cloud = loaded_cloud(&fetcher);
  assert!(cloud.visible_bounds().is_none());

  let r0 = cloud.find_node("r0").unwrap();
  let r7 = cloud.find_node("r7").unwrap();
  cloud.visible_nodes = vec![r0, r7];

  let bounds = cloud.visible_bounds().unwrap();
  assert_eq!(bounds.min, DVec3::splat(-5.0));
  assert_eq!(bounds.max, DVec3::splat(5.0));

  assert!(cloud.visible_bounding_boxes().is_empty());
  cloud.show_bounding_box = true;
  cloud.transform = DAffine3::from_translation(DVec3::new(100.0, 0.0, 0.0));
  let boxes = cloud.visible_bounding_boxes();
  assert_eq!(boxes.len(), 2);
  assert_eq!(boxes[0].min, DVec3::new(95.0, -5.0, -5.0));
}

#[test]
fn test_viewer_to_local() {
  let fetcher = Arc::new(ScriptedFetcher::new());
  let cloud = cloud(&fetcher, 0).with_transform(DAffine3::from_translation(DVec3::new(10.0, 0.0, 0.0)));
  assert_eq!(cloud.viewer_to_local(DVec3::new(10.0, 1.0, 0.0)), DVec3::new(0.0, 1.0, 0.0));
}
