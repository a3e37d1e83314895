use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Environment variable overriding the state location (see [`state_location`]).
pub const STATE_ENV: &str = "PANNUGIT_STATE";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PANNUGIT_DATA_DIR";

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
    return PathBuf::from(dir);
  }
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir())
    .join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
    return PathBuf::from(dir);
  }
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Default directory for the file-backed key-value store.
pub fn state_dir() -> PathBuf {
  data_dir().join("state")
}

/// The state backend location: `PANNUGIT_STATE` if set, else the default state directory.
pub fn state_location() -> String {
  std::env::var(STATE_ENV).unwrap_or_else(|_| state_dir().to_string_lossy().into_owned())
}
