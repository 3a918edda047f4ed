//! Error type for `barangay-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// The key holds a value of a different kind than the command expects.
  #[error("WRONGTYPE operation against a key holding the wrong kind of value: {0}")]
  WrongType(String),

  #[error("value at {key} is not an integer: {value}")]
  NotAnInteger { key: String, value: String },

  #[error("counter at {0} would overflow")]
  Overflow(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
