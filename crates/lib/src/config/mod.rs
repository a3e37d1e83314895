//! Root configuration and service manifest resolution.
//!
//! Resolution turns documents on disk into typed records:
//! - [`resolve_root`] loads the root [`RootConfig`]
//! - [`resolve_service_manifest`] loads one [`ServiceManifest`]
//! - [`resolve_artifact`] reads the override document it points at
//! - [`resolve_tree`] does all of the above for every manifest under the watch path
//!
//! Nothing here touches the network or the state store, so a cycle can
//! re-resolve the whole tree as often as it likes.

mod resolve;
mod types;

pub use resolve::{
  ManifestFailure, Resolution, ResolveError, resolve_artifact, resolve_root, resolve_service_manifest, resolve_tree,
  service_key,
};
pub use types::{ResolvedArtifact, RootConfig, ServiceKey, ServiceManifest};
