//! External loading contract: manifests, node payloads and fetch dispatch.
//!
//! Byte-level decoding belongs to the host's [`GeometryFetcher`]; this module
//! only moves decoded payloads between threads and parses manifest fields.

pub mod fetch;
pub mod manifest;
pub mod payload;

pub use fetch::{
  base_url_resolver, identity_resolver, FetchHandle, GeometryFetcher, LoadMode, NodeRequest,
  UrlResolver,
};
pub use manifest::{Manifest, ManifestKind, NodeLayout};
pub use payload::{ChildDescriptor, GeometryPayload};
