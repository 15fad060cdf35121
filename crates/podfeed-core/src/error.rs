//! Error types for `podfeed-core`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of one source's sync run.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Rss(podfeed_rss::Error),

  #[error("fetch failed: {0}")]
  Fetch(BoxError),

  #[error("storage failed: {0}")]
  Storage(BoxError),

  #[error("cancelled")]
  Cancelled,
}

impl Error {
  pub fn is_cancelled(&self) -> bool { matches!(self, Error::Cancelled) }
}

impl From<podfeed_rss::Error> for Error {
  fn from(err: podfeed_rss::Error) -> Self {
    match err {
      podfeed_rss::Error::Cancelled => Error::Cancelled,
      other => Error::Rss(other),
    }
  }
}

/// Rejected configuration. Raised once at startup, never during a run.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to load configuration: {0}")]
  Load(#[from] config::ConfigError),

  #[error("no sources configured")]
  NoSources,

  #[error("source id must not be empty")]
  EmptySourceId,

  #[error("duplicate source id: {0}")]
  DuplicateSource(String),

  #[error("source {0}: display name must not be empty")]
  EmptySourceName(String),

  #[error("source {source_id}: unsupported url scheme {scheme:?}")]
  UnsupportedScheme { source_id: String, scheme: String },

  #[error("owner name must not be empty")]
  EmptyOwnerName,

  #[error("invalid owner email: {0:?}")]
  InvalidOwnerEmail(String),

  #[error("app.interval must be at least one second")]
  InvalidInterval,

  #[error("app.concurrency must be at least 1")]
  InvalidConcurrency,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
