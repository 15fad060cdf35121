//! [`HttpFetcher`] pulls an upstream RSS feed over HTTP and mirrors every
//! episode's media into our own storage.

use std::{path::Path, sync::Arc};

use podfeed_core::{Fetcher, SourceConfig, Storage};
use podfeed_rss::{Enclosure, Owner, Podcast, Resource};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("feed error: {0}")]
  Rss(#[from] podfeed_rss::Error),

  #[error("storage error: {0}")]
  Storage(Box<dyn std::error::Error + Send + Sync>),

  #[error("no episode matches the source filter")]
  NoEpisodes,

  #[error("cancelled")]
  Cancelled,
}

pub struct HttpFetcher<S> {
  client:  reqwest::Client,
  storage: Arc<S>,
  owner:   Option<Owner>,
}

impl<S: Storage + 'static> HttpFetcher<S> {
  /// `owner`, when set, replaces the owner of every fetched feed.
  pub fn new(storage: Arc<S>, owner: Option<Owner>) -> Self {
    Self { client: reqwest::Client::new(), storage, owner }
  }

  /// Apply the per-source overrides and filter, and make every enclosure a
  /// lazy mirror of the original media.
  fn prepare(
    &self,
    mut podcast: Podcast,
    source: &SourceConfig,
    cancel: &CancellationToken,
  ) -> Result<Podcast, FetchError> {
    if let Some(name) = &source.name {
      podcast.title = name.clone();
    }
    if let Some(owner) = &self.owner {
      podcast.owner = Some(owner.clone());
    }

    let episodes = std::mem::replace(&mut podcast.items, Resource::plain(Vec::new()))
      .into_value()
      .ok_or(podfeed_rss::Error::ResourceUnavailable("items"))?;

    let mut kept = Vec::with_capacity(episodes.len());
    for mut episode in episodes {
      if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
      }
      if !source.matches_title(&episode.title) {
        debug!(source = %source.id, title = %episode.title, "episode filtered out");
        continue;
      }
      let original = episode.enclosure.require("enclosure")?.clone();
      episode.enclosure = self.mirror(source, original);
      kept.push(episode);
    }

    if kept.is_empty() {
      return Err(FetchError::NoEpisodes);
    }
    podcast.items = Resource::plain(kept);
    Ok(podcast)
  }

  fn mirror(&self, source: &SourceConfig, original: Enclosure) -> Resource<Enclosure> {
    let key = source.storage_key(&media_name(&original.url));
    let client = self.client.clone();
    let storage = self.storage.clone();
    Resource::lazy(move || async move {
      match mirror_media(&client, storage.as_ref(), &key, original).await {
        Ok(enclosure) => Some(enclosure),
        Err(err) => {
          warn!(%key, error = %err, "media unavailable");
          None
        }
      }
    })
  }
}

impl<S: Storage + 'static> Fetcher for HttpFetcher<S> {
  type Error = FetchError;

  async fn fetch(
    &self,
    source: &SourceConfig,
    cancel: &CancellationToken,
  ) -> Result<Podcast, FetchError> {
    debug!(source = %source.id, url = %source.url, "fetching feed");
    let body = self
      .client
      .get(source.url.clone())
      .send()
      .await?
      .error_for_status()?
      .bytes()
      .await?;
    self.prepare(Podcast::from_rss(&body)?, source, cancel)
  }
}

/// Reuse the stored copy when there is one, otherwise download and store.
async fn mirror_media<S: Storage>(
  client: &reqwest::Client,
  storage: &S,
  key: &str,
  original: Enclosure,
) -> Result<Enclosure, FetchError> {
  let storage_err = |e: S::Error| FetchError::Storage(Box::new(e));

  if let Some(info) = storage.check(key).await.map_err(storage_err)? {
    debug!(%key, "media already mirrored");
    return Ok(Enclosure {
      url:       info.uri,
      length:    info.size,
      mime_type: info.mime_type,
    });
  }

  let data = client
    .get(original.url.clone())
    .send()
    .await?
    .error_for_status()?
    .bytes()
    .await?;
  let length = data.len() as u64;
  let url = storage
    .put(data, key, &original.mime_type)
    .await
    .map_err(storage_err)?;
  info!(%key, length, "mirrored media");
  Ok(Enclosure { url, length, mime_type: original.mime_type })
}

/// `media/<sha256 of the original url>.<extension>`.
fn media_name(url: &Url) -> String {
  let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
  let extension = Path::new(url.path())
    .extension()
    .and_then(|e| e.to_str())
    .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
    .unwrap_or("bin");
  format!("media/{digest}.{extension}")
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use podfeed_store_local::LocalStorage;

  use super::*;

  const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Upstream Title</title>
    <link>https://example.com/show</link>
    <description>About the show</description>
    <itunes:author>Upstream Author</itunes:author>
    <itunes:image href="https://img.example.com/show.png"/>
    <item>
      <title>Episode 1</title>
      <guid>ep-1</guid>
      <enclosure url="https://media.example.com/1.mp3" length="10" type="audio/mpeg"/>
    </item>
    <item>
      <title>Trailer</title>
      <guid>trailer</guid>
      <enclosure url="https://media.example.com/t.mp3" length="10" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

  async fn fetcher(dir: &tempfile::TempDir) -> HttpFetcher<LocalStorage> {
    let storage = LocalStorage::open(dir.path(), Url::parse("https://cdn.example.com/").unwrap())
      .await
      .unwrap();
    HttpFetcher::new(
      Arc::new(storage),
      Some(Owner { email: "me@example.com".into(), name: Some("Me".into()) }),
    )
  }

  fn source(regex: Option<&str>) -> SourceConfig {
    let mut source =
      SourceConfig::new("show", Url::parse("https://example.com/feed.xml").unwrap());
    source.name = Some("My Show".into());
    source.regex = regex.map(|r| r.parse().unwrap());
    source
  }

  #[test]
  fn media_names_are_stable_and_keep_the_extension() {
    let url = Url::parse("https://media.example.com/a/1.mp3?sig=x").unwrap();
    let name = media_name(&url);
    assert!(name.starts_with("media/"));
    assert!(name.ends_with(".mp3"));
    assert_eq!(name.len(), "media/".len() + 64 + ".mp3".len());
    assert_eq!(name, media_name(&url));

    let bare = Url::parse("https://media.example.com/stream").unwrap();
    assert!(media_name(&bare).ends_with(".bin"));
  }

  #[tokio::test]
  async fn overrides_and_filters_episodes() {
    let dir = tempfile::tempdir().unwrap();
    let f = fetcher(&dir).await;
    let podcast = Podcast::from_rss(FEED.as_bytes()).unwrap();

    let prepared = f
      .prepare(podcast, &source(Some("^Episode")), &CancellationToken::new())
      .unwrap();
    assert_eq!(prepared.title, "My Show");
    assert_eq!(prepared.owner.as_ref().map(|o| o.email.as_str()), Some("me@example.com"));
    let items = prepared.items.value().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].guid.as_deref(), Some("ep-1"));
  }

  #[tokio::test]
  async fn filtering_everything_out_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let f = fetcher(&dir).await;
    let podcast = Podcast::from_rss(FEED.as_bytes()).unwrap();
    assert!(matches!(
      f.prepare(podcast, &source(Some("^Bonus")), &CancellationToken::new()),
      Err(FetchError::NoEpisodes)
    ));
  }

  #[tokio::test]
  async fn cancelled_prepare_stops() {
    let dir = tempfile::tempdir().unwrap();
    let f = fetcher(&dir).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let podcast = Podcast::from_rss(FEED.as_bytes()).unwrap();
    assert!(matches!(
      f.prepare(podcast, &source(None), &cancel),
      Err(FetchError::Cancelled)
    ));
  }

  #[tokio::test]
  async fn already_mirrored_media_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let f = fetcher(&dir).await;
    let src = source(None);
    let original = Url::parse("https://media.example.com/1.mp3").unwrap();
    let key = src.storage_key(&media_name(&original));
    f.storage
      .put(Bytes::from_static(b"0123456789"), &key, "audio/mpeg")
      .await
      .unwrap();

    let podcast = Podcast::from_rss(FEED.as_bytes()).unwrap();
    let prepared = f.prepare(podcast, &src, &CancellationToken::new()).unwrap();
    let episode = &prepared.items.value().unwrap()[0];
    let enclosure = episode
      .enclosure
      .ensure("enclosure", &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(enclosure.url.as_str(), format!("https://cdn.example.com/{key}"));
    assert_eq!(enclosure.length, 10);
    assert_eq!(enclosure.mime_type, "audio/mpeg");
  }
}
