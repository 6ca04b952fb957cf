use glam::DVec3;

use super::*;

fn unit_node() -> OctreeNode {
  let geometry = GeometryNode::new("r", 0, Aabb::new(DVec3::ZERO, DVec3::ONE), 100);
  OctreeNode::new(NodeId::ROOT, None, geometry)
}

#[test]
fn test_new_node_is_unloaded_geometry() {
  let node = unit_node();
  assert!(!node.is_resident());
  assert!(node.scene_handle().is_none());
  assert!(matches!(node.geometry().load, LoadState::Unloaded));
  assert_eq!(node.child_ids().count(), 0);
}

#[test]
fn test_bounding_sphere_precomputed() {
  let node = unit_node();
  let sphere = node.geometry().bounding_sphere;
  assert_eq!(sphere.center, DVec3::splat(0.5));
  assert!((sphere.radius - 3f64.sqrt() * 0.5).abs() < 1e-12);
}

#[test]
fn test_promote_then_demote_keeps_geometry() {
  let mut node = unit_node();
  node.geometry_mut().load = LoadState::Loaded(Arc::new(GeometryPayload::new(100)));

  assert!(node.promote(SceneHandle::new(7)));
  assert!(node.is_resident());
  assert_eq!(node.scene_handle(), Some(SceneHandle::new(7)));
  assert_eq!(node.geometry().num_points, 100);

  // Second promotion is refused and keeps the first handle
  assert!(!node.promote(SceneHandle::new(8)));
  assert_eq!(node.scene_handle(), Some(SceneHandle::new(7)));

  assert_eq!(node.demote(), Some(SceneHandle::new(7)));
  assert!(!node.is_resident());
  assert!(node.geometry().load.is_loaded());
  assert_eq!(node.geometry().name, "r");

  assert_eq!(node.demote(), None);
}

#[test]
fn test_child_ids_follow_octant_order() {
  let mut node = unit_node();
  node.children[5] = Some(NodeId::from_index(2));
  node.children[1] = Some(NodeId::from_index(1));

  let ids: Vec<_> = node.child_ids().collect();
  assert_eq!(ids, vec![NodeId::from_index(1), NodeId::from_index(2)]);
}

#[test]
fn test_child_name_appends_octant() {
  assert_eq!(child_name("r", 0), "r0");
  assert_eq!(child_name("r07", 3), "r073");
}

#[test]
fn test_load_state_predicates() {
  assert!(LoadState::Failed { failed_at_frame: 3 }.is_failed());
  assert!(!LoadState::Unloaded.is_loading());
  assert!(LoadState::Unloaded.payload().is_none());
}
