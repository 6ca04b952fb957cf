//! Node fetch dispatch.
//!
//! # Flow
//!
//! ```text
//! update N (main)                   rayon pool / inline
//! ┌──────────────────┐
//! │ dispatch()       │──────────────► fetch_node()
//! │ node = Loading   │                validate()
//! └──────────────────┘                send(result)
//!                                          │
//! update N+1 (main)                        │
//! ┌──────────────────┐                     │
//! │ try_take()       │◄────────────────────┘
//! │ node = Loaded /  │
//! │        Failed    │
//! └──────────────────┘
//! ```
//!
//! Results are never applied mid-traversal: a fetch that finishes during an
//! update is observed by the next one.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};

use super::GeometryPayload;
use crate::error::FetchError;
use crate::octree::NodeId;
use crate::point_cloud::CloudId;

/// Maps a dataset-relative path to a fetchable URL.
pub type UrlResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Resolver returning paths unchanged.
pub fn identity_resolver() -> UrlResolver {
  Arc::new(|path: &str| path.to_owned())
}

/// Resolver prefixing paths with `base` (one `/` between them).
pub fn base_url_resolver(base: impl Into<String>) -> UrlResolver {
  let base = base.into();
  let base = base.trim_end_matches('/').to_owned();
  Arc::new(move |path: &str| format!("{}/{}", base, path.trim_start_matches('/')))
}

/// Everything a fetcher needs to load one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRequest {
  pub cloud: CloudId,
  pub node: NodeId,
  pub name: String,
  pub level: u32,
  /// Resolved URL.
  pub url: String,
}

/// Dataset access supplied by the host (HTTP client, file system, cache).
///
/// Implementations may block; in [`LoadMode::Background`] they run on the
/// rayon pool.
pub trait GeometryFetcher: Send + Sync + 'static {
  /// Raw manifest bytes (`cloud.js` or `metadata.json`).
  fn fetch_manifest(&self, url: &str) -> Result<Vec<u8>, FetchError>;

  /// Decoded geometry of one node.
  fn fetch_node(&self, request: &NodeRequest) -> Result<GeometryPayload, FetchError>;
}

/// Where node fetches run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
  /// On the rayon pool.
  #[default]
  Background,
  /// On the calling thread during dispatch.
  Inline,
}

type FetchResult = Result<GeometryPayload, FetchError>;

/// Owned handle to one in-flight node fetch.
///
/// Dropping the handle discards the result.
#[derive(Debug)]
pub struct FetchHandle {
  receiver: Receiver<FetchResult>,
}

impl FetchHandle {
  /// Start fetching `request`.
  pub fn dispatch(fetcher: Arc<dyn GeometryFetcher>, request: NodeRequest, mode: LoadMode) -> Self {
    let (sender, receiver) = channel::bounded(1);

    let job = move || {
      let result = fetcher.fetch_node(&request).and_then(|payload| {
        payload.validate()?;
        Ok(payload)
      });
      // Ignore send error (receiver dropped = cancelled)
      let _ = sender.send(result);
    };

    match mode {
      LoadMode::Background => rayon::spawn(job),
      LoadMode::Inline => job(),
    }

    Self { receiver }
  }

  /// Non-blocking poll. `None` while still running.
  pub fn try_take(&self) -> Option<FetchResult> {
    match self.receiver.try_recv() {
      Ok(result) => Some(result),
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => Some(Err(FetchError::Cancelled)),
    }
  }

  /// Block up to `timeout` for the result. `None` on timeout.
  pub fn wait(&self, timeout: Duration) -> Option<FetchResult> {
    match self.receiver.recv_timeout(timeout) {
      Ok(result) => Some(result),
      Err(RecvTimeoutError::Timeout) => None,
      Err(RecvTimeoutError::Disconnected) => Some(Err(FetchError::Cancelled)),
    }
  }
}
