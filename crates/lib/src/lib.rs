//! pannugit-lib: the reconciliation engine behind `pannugit`.
//!
//! A cycle walks a materialized source tree for service manifests, resolves
//! each into an artifact, diffs the artifacts' fingerprints against the last
//! committed snapshot, deploys what changed and commits a snapshot that only
//! records successful deployments.
//!
//! - [`source`]: discovery of manifest files
//! - [`config`]: root config, manifests and resolved artifacts
//! - [`state`]: snapshot persistence behind a key-value store
//! - [`diff`]: change detection
//! - [`plan`]: ordering and next-snapshot computation
//! - [`execute`]: the deployment executor seam and plan runner
//! - [`reconcile`]: one full cycle

pub mod config;
pub mod consts;
pub mod cycle_lock;
pub mod diff;
pub mod error;
pub mod execute;
pub mod init;
pub mod plan;
pub mod platform;
pub mod reconcile;
pub mod source;
pub mod state;
pub mod util;

pub use error::ErrorKind;
