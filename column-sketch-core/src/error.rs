use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a sketch build, encode, scan or file load can fail.
///
/// Nothing here is retried: operations either complete or return one of these.
#[derive(Error, Debug)]
pub enum Error {
  /// A file could not be opened, read or written.
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  /// Persisted bytes do not have the expected layout: a sketch whose length does not match
  /// the row count, a truncated mask, a malformed sidecar.
  #[error("format error: {0}")]
  Format(String),

  /// Inputs that cannot produce a valid codebook or query.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("index {index} out of range for bit vector of length {len}")]
  OutOfRange { index: u64, len: u64 },
}

impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Error::Format(format!("malformed map sidecar: {err}"))
  }
}
