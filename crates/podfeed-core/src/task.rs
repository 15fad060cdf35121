//! One source's sync run: load the stored feed, fetch a fresh snapshot,
//! merge, and publish the result if anything changed.

use std::sync::Arc;

use bytes::Bytes;
use podfeed_rss::{Podcast, RssEntity};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  config::SourceConfig,
  error::{Error, Result},
  fetcher::Fetcher,
  storage::Storage,
};

/// Name of the published feed under a source's key prefix.
pub const FEED_NAME: &str = "feed.rss";
pub const FEED_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Called with the task id around [`Task::execute`].
pub type Hook = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  /// No feed was stored yet; the fetched one was written.
  Created,
  /// The stored feed changed and was rewritten.
  Updated,
  /// Nothing to write.
  Unchanged,
}

pub struct Task<S, F> {
  id:      String,
  source:  SourceConfig,
  storage: Arc<S>,
  fetcher: Arc<F>,
  cancel:  CancellationToken,
  before:  Option<Hook>,
  after:   Option<Hook>,
}

impl<S: Storage, F: Fetcher> Task<S, F> {
  pub fn new(
    source: SourceConfig,
    storage: Arc<S>,
    fetcher: Arc<F>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      source,
      storage,
      fetcher,
      cancel,
      before: None,
      after: None,
    }
  }

  pub fn with_before(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
    self.before = Some(Box::new(hook));
    self
  }

  pub fn with_after(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
    self.after = Some(Box::new(hook));
    self
  }

  pub fn id(&self) -> &str { &self.id }

  pub fn source(&self) -> &SourceConfig { &self.source }

  /// Run the sync, containing every failure. Errors are logged with the
  /// source and task ids and reported as `None`.
  pub async fn execute(&self) -> Option<SyncOutcome> {
    if let Some(hook) = &self.before {
      hook(&self.id);
    }
    debug!(source = %self.source.id, task = %self.id, "task started");

    let outcome = match self.sync().await {
      Ok(outcome) => Some(outcome),
      Err(Error::Cancelled) => {
        warn!(source = %self.source.id, task = %self.id, "task cancelled");
        None
      }
      Err(err) => {
        error!(source = %self.source.id, task = %self.id, error = %err, "task failed");
        None
      }
    };

    debug!(source = %self.source.id, task = %self.id, ?outcome, "task finished");
    if let Some(hook) = &self.after {
      hook(&self.id);
    }
    outcome
  }

  /// The sync itself. At most one write, and never after cancellation.
  pub async fn sync(&self) -> Result<SyncOutcome> {
    let key = self.source.storage_key(FEED_NAME);

    let (previous, fresh) =
      tokio::try_join!(self.load_previous(&key), self.fetch_fresh())?;

    let (podcast, outcome) = match previous {
      Some(mut stored) => {
        if !stored.merge(fresh)? {
          info!(source = %self.source.id, %key, "no change");
          return Ok(SyncOutcome::Unchanged);
        }
        (stored, SyncOutcome::Updated)
      }
      None => (fresh, SyncOutcome::Created),
    };

    let data = Bytes::from(podcast.to_rss()?);
    if self.cancel.is_cancelled() {
      return Err(Error::Cancelled);
    }
    info!(source = %self.source.id, %key, ?outcome, "update");
    self
      .storage
      .put(data, &key, FEED_CONTENT_TYPE)
      .await
      .map_err(|e| Error::Storage(Box::new(e)))?;
    Ok(outcome)
  }

  async fn load_previous(&self, key: &str) -> Result<Option<Podcast>> {
    let stored = self
      .storage
      .get(key)
      .await
      .map_err(|e| Error::Storage(Box::new(e)))?;
    match stored {
      Some(bytes) => Ok(Some(Podcast::from_rss(&bytes)?)),
      None => {
        info!(source = %self.source.id, %key, "no previous feed");
        Ok(None)
      }
    }
  }

  async fn fetch_fresh(&self) -> Result<Podcast> {
    let podcast = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Err(Error::Cancelled),
      fetched = self.fetcher.fetch(&self.source, &self.cancel) => fetched,
    };
    let podcast = match podcast {
      Ok(podcast) => podcast,
      // A fetcher that gave up because of shutdown reports its own error.
      Err(_) if self.cancel.is_cancelled() => return Err(Error::Cancelled),
      Err(err) => return Err(Error::Fetch(Box::new(err))),
    };
    podcast.materialize(&self.cancel).await?;
    Ok(podcast)
  }
}
