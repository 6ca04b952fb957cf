//! Error types.
//!
//! Per-node problems never surface here: the scheduler reports them as flags
//! on [`VisibilityResult`](crate::potree::VisibilityResult). Only caller
//! mistakes (bad camera, bad viewport, bad config) and manifest loading fail
//! with a [`PotreeError`].

use thiserror::Error;

/// Result alias used across the crate.
pub type PotreeResult<T> = Result<T, PotreeError>;

/// Failure reported by a [`GeometryFetcher`](crate::loading::GeometryFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("resource not found: {0}")]
  NotFound(String),
  #[error("transport error: {0}")]
  Transport(String),
  #[error("malformed payload: {0}")]
  MalformedPayload(String),
  /// The fetch was dropped before it reported a result.
  #[error("fetch cancelled")]
  Cancelled,
}

#[derive(Debug, Error)]
pub enum PotreeError {
  #[error("invalid camera: {0}")]
  InvalidCamera(String),
  #[error("invalid viewport {width}x{height} (pixel ratio {pixel_ratio})")]
  InvalidViewport {
    width: u32,
    height: u32,
    pixel_ratio: f64,
  },
  #[error("unsupported manifest `{0}` (expected cloud.js or metadata.json)")]
  UnsupportedManifest(String),
  #[error("failed to parse manifest")]
  Manifest(#[from] serde_json::Error),
  #[error("invalid manifest: {0}")]
  InvalidManifest(String),
  #[error("failed to fetch `{url}`")]
  Fetch {
    url: String,
    #[source]
    source: FetchError,
  },
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error("failed to parse configuration")]
  Config(#[from] toml::de::Error),
}
