//! The `Storage` trait: a flat key/blob store with public URIs.
//!
//! Implemented by storage backends (e.g. `podfeed-store-local`). The sync
//! task only depends on this abstraction.

use std::future::Future;

use bytes::Bytes;
use url::Url;

/// What [`Storage::check`] knows about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
  /// Public URI of the object.
  pub uri:       Url,
  /// Size in bytes.
  pub size:      u64,
  pub mime_type: String,
}

/// Abstraction over an object storage backend.
///
/// Keys are `/`-separated and always scoped by source
/// ([`SourceConfig::storage_key`](crate::config::SourceConfig::storage_key)).
/// A missing key is `Ok(None)`, never an error.
pub trait Storage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `data` under `key`, overwriting any previous object, and return
  /// its public URI.
  fn put<'a>(
    &'a self,
    data: Bytes,
    key: &'a str,
    content_type: &'a str,
  ) -> impl Future<Output = Result<Url, Self::Error>> + Send + 'a;

  /// Metadata of the object at `key`, if present.
  fn check<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<ObjectInfo>, Self::Error>> + Send + 'a;

  /// Contents of the object at `key`, if present.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Bytes>, Self::Error>> + Send + 'a;
}
