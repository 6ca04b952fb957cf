//! Dataset manifests: Potree 1.x `cloud.js` and Potree 2.x `metadata.json`.
//!
//! Only the fields the scheduler needs are read; everything else in the
//! manifest (attributes, encoding, projection) is ignored.

use glam::DVec3;
use serde::Deserialize;

use crate::constants::DEFAULT_OCTREE_DIR;
use crate::error::{PotreeError, PotreeResult};
use crate::octree::Aabb;

/// Manifest flavour, chosen by file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestKind {
  /// Potree 1.x, one file per node.
  CloudJs,
  /// Potree 2.x, all nodes in `octree.bin`.
  Metadata,
}

impl ManifestKind {
  pub fn from_url(url: &str) -> PotreeResult<Self> {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    match path.rsplit('/').next() {
      Some("cloud.js") => Ok(Self::CloudJs),
      Some("metadata.json") => Ok(Self::Metadata),
      _ => Err(PotreeError::UnsupportedManifest(url.to_owned())),
    }
  }
}

/// Where node geometry lives relative to the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeLayout {
  /// Potree 1.x. Node files are nested one directory per
  /// `hierarchy_step_size` digits of the node name.
  PerNodeFiles {
    octree_dir: String,
    hierarchy_step_size: Option<u32>,
  },
  SingleFile { file: String },
}

impl Default for NodeLayout {
  fn default() -> Self {
    NodeLayout::PerNodeFiles {
      octree_dir: DEFAULT_OCTREE_DIR.to_owned(),
      hierarchy_step_size: None,
    }
  }
}

impl NodeLayout {
  /// Dataset-relative path of a node's geometry, before URL resolution.
  pub fn relative_url(&self, node_name: &str) -> String {
    match self {
      NodeLayout::PerNodeFiles {
        octree_dir,
        hierarchy_step_size,
      } => {
        let mut path = format!("{octree_dir}/r");
        let digits = node_name.strip_prefix('r').unwrap_or(node_name);
        if let Some(step) = hierarchy_step_size.map(|step| step as usize).filter(|&step| step > 0) {
          // Only full chunks open a directory
          for chunk in 0..digits.len() / step {
            if let Some(part) = digits.get(chunk * step..(chunk + 1) * step) {
              path.push('/');
              path.push_str(part);
            }
          }
        }
        format!("{path}/{node_name}.bin")
      }
      NodeLayout::SingleFile { file } => file.clone(),
    }
  }
}

/// Fields of a parsed manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
  pub kind: ManifestKind,
  pub name: String,
  /// Cubic octree bounds.
  pub bounding_box: Aabb,
  /// Bounds of the actual points, when the manifest carries them.
  pub tight_bounding_box: Option<Aabb>,
  pub spacing: f64,
  pub total_points: Option<u64>,
  pub hierarchy_step_size: Option<u32>,
  pub layout: NodeLayout,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudJs {
  #[serde(default)]
  octree_dir: Option<String>,
  bounding_box: CloudJsBox,
  #[serde(default)]
  tight_bounding_box: Option<CloudJsBox>,
  spacing: f64,
  #[serde(default)]
  hierarchy_step_size: Option<u32>,
  #[serde(default)]
  points: Option<u64>,
}

#[derive(Deserialize)]
struct CloudJsBox {
  lx: f64,
  ly: f64,
  lz: f64,
  ux: f64,
  uy: f64,
  uz: f64,
}

impl CloudJsBox {
  fn to_aabb(&self) -> PotreeResult<Aabb> {
    checked_box(
      DVec3::new(self.lx, self.ly, self.lz),
      DVec3::new(self.ux, self.uy, self.uz),
    )
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataJson {
  #[serde(default)]
  name: Option<String>,
  points: u64,
  bounding_box: MetadataBox,
  spacing: f64,
  #[serde(default)]
  hierarchy: Option<MetadataHierarchy>,
}

#[derive(Deserialize)]
struct MetadataBox {
  min: [f64; 3],
  max: [f64; 3],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataHierarchy {
  step_size: u32,
}

fn checked_box(min: DVec3, max: DVec3) -> PotreeResult<Aabb> {
  if !(min.is_finite() && max.is_finite()) || min.cmpgt(max).any() {
    return Err(PotreeError::InvalidManifest(format!(
      "bounding box min {min} exceeds max {max}"
    )));
  }
  Ok(Aabb::new(min, max))
}

/// Dataset name from the manifest URL: its parent directory, or the URL.
fn name_from_url(url: &str) -> String {
  let mut segments = url.rsplit('/');
  segments.next();
  segments
    .find(|segment| !segment.is_empty())
    .unwrap_or(url)
    .to_owned()
}

impl Manifest {
  /// Parse manifest bytes fetched from `url`.
  pub fn parse(url: &str, bytes: &[u8]) -> PotreeResult<Self> {
    let kind = ManifestKind::from_url(url)?;

    let manifest = match kind {
      ManifestKind::CloudJs => {
        let raw: CloudJs = serde_json::from_slice(bytes)?;
        Manifest {
          kind,
          name: name_from_url(url),
          bounding_box: raw.bounding_box.to_aabb()?,
          tight_bounding_box: raw
            .tight_bounding_box
            .as_ref()
            .map(CloudJsBox::to_aabb)
            .transpose()?,
          spacing: raw.spacing,
          total_points: raw.points,
          hierarchy_step_size: raw.hierarchy_step_size,
          layout: NodeLayout::PerNodeFiles {
            octree_dir: raw
              .octree_dir
              .unwrap_or_else(|| DEFAULT_OCTREE_DIR.to_owned()),
            hierarchy_step_size: raw.hierarchy_step_size,
          },
        }
      }
      ManifestKind::Metadata => {
        let raw: MetadataJson = serde_json::from_slice(bytes)?;
        Manifest {
          kind,
          name: raw.name.unwrap_or_else(|| name_from_url(url)),
          bounding_box: checked_box(
            DVec3::from_array(raw.bounding_box.min),
            DVec3::from_array(raw.bounding_box.max),
          )?,
          tight_bounding_box: None,
          spacing: raw.spacing,
          total_points: Some(raw.points),
          hierarchy_step_size: raw.hierarchy.map(|hierarchy| hierarchy.step_size),
          layout: NodeLayout::SingleFile {
            file: "octree.bin".to_owned(),
          },
        }
      }
    };

    if !(manifest.spacing.is_finite() && manifest.spacing > 0.0) {
      return Err(PotreeError::InvalidManifest(format!(
        "spacing must be positive, got {}",
        manifest.spacing
      )));
    }

    Ok(manifest)
  }
}
