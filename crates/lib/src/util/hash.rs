//! Content fingerprints for change detection.
//!
//! A [`Fingerprint`] is a full 64-character SHA-256 over the service key and
//! the artifact bytes. Including the key means two services deploying the
//! same document still carry different fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::FINGERPRINT_DISPLAY_LEN;

/// Length of a hex-encoded SHA-256 digest.
const FINGERPRINT_LEN: usize = 64;

/// Lowercase hexadecimal SHA-256 identifying one version of one service's artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  /// Compute the fingerprint of `content` deployed under `service_key`.
  ///
  /// The key is length-prefixed so that `("ab", "c")` and `("a", "bc")` never collide.
  pub fn compute(service_key: &str, content: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update((service_key.len() as u64).to_le_bytes());
    hasher.update(service_key.as_bytes());
    hasher.update(content);
    Fingerprint(hex::encode(hasher.finalize()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Returns true if this is a 64-character lowercase hex digest.
  pub fn is_well_formed(&self) -> bool {
    self.0.len() == FINGERPRINT_LEN && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
  }

  /// Shortened form for logs and terminal output.
  pub fn short(&self) -> &str {
    self.0.get(..FINGERPRINT_DISPLAY_LEN).unwrap_or(&self.0)
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Compute SHA256 hash of arbitrary bytes as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
  hex::encode(Sha256::digest(data))
}
