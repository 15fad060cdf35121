//! The `Fetcher` trait: turns a configured source into a [`Podcast`].

use std::future::Future;

use podfeed_rss::Podcast;
use tokio_util::sync::CancellationToken;

use crate::config::SourceConfig;

pub trait Fetcher: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Produce the current snapshot of `source`.
  ///
  /// The returned podcast may hold lazy resources; the caller materializes
  /// them before merging. Long fetch loops must observe `cancel`.
  fn fetch<'a>(
    &'a self,
    source: &'a SourceConfig,
    cancel: &'a CancellationToken,
  ) -> impl Future<Output = Result<Podcast, Self::Error>> + Send + 'a;
}
