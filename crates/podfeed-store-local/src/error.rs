//! Error type for `podfeed-store-local`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("url error: {0}")]
  Url(#[from] url::ParseError),

  /// Empty, or escapes the data directory.
  #[error("invalid storage key: {0:?}")]
  InvalidKey(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
