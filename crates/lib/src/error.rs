//! Error classification shared by every stage of a reconciliation cycle.
//!
//! Each module keeps its own error enum. [`ErrorKind`] is the coarse taxonomy
//! callers use to decide whether an error is fatal for the cycle or only for
//! one service.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// An expected document or path is missing.
  NotFound,
  /// A structured document is malformed.
  Parse,
  /// Reading or writing failed.
  Io,
  /// The persistence or execution backend cannot be reached.
  Unavailable,
  /// The external tool ran and reported failure.
  Execution,
}

impl ErrorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::NotFound => "not found",
      ErrorKind::Parse => "parse error",
      ErrorKind::Io => "io error",
      ErrorKind::Unavailable => "unavailable",
      ErrorKind::Execution => "execution failure",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
