//! Names and reserved values shared across the crate.

pub const APP_NAME: &str = "pannugit";

/// Default file name of the root configuration inside a source tree.
pub const ROOT_CONFIG_FILENAME: &str = "pannugit.yaml";

/// Every file whose name ends with this suffix under the watch path is a service manifest.
pub const MANIFEST_SUFFIX: &str = ".pannugit.yaml";

/// Key holding the last committed snapshot in the key-value store.
pub const SNAPSHOT_KEY: &str = "pannugit:snapshot";

/// Key holding the persisted bootstrap root config.
pub const ROOT_CONFIG_KEY: &str = "pannugit:config";

/// Current on-disk format of the snapshot blob.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Number of hex characters of a fingerprint shown in human output.
pub const FINGERPRINT_DISPLAY_LEN: usize = 12;
