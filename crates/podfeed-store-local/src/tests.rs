//! Integration tests for `LocalStorage` against a temporary directory.

use bytes::Bytes;
use podfeed_core::storage::Storage;
use url::Url;

use crate::{Error, LocalStorage};

async fn store(dir: &tempfile::TempDir) -> LocalStorage {
  LocalStorage::open(dir.path(), Url::parse("http://localhost:9000").unwrap())
    .await
    .expect("local store")
}

#[tokio::test]
async fn put_then_check_and_get() {
  let dir = tempfile::tempdir().unwrap();
  let s = store(&dir).await;
  let data = Bytes::from_static(b"0123456789");

  // Overwrite is idempotent.
  for _ in 0..2 {
    let uri = s
      .put(data.clone(), "/test.bin", "application/octet-stream")
      .await
      .unwrap();
    assert_eq!(uri.as_str(), "http://localhost:9000/test.bin");
    assert!(dir.path().join("data/test.bin").exists());

    let info = s.check("/test.bin").await.unwrap().expect("metadata");
    assert_eq!(info.uri, uri);
    assert_eq!(info.size, 10);
    assert_eq!(info.mime_type, "application/octet-stream");

    assert_eq!(s.get("test.bin").await.unwrap(), Some(data.clone()));
  }
}

#[tokio::test]
async fn missing_key_is_absent_not_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let s = store(&dir).await;
  assert!(s.check("/empty.bin").await.unwrap().is_none());
  assert!(s.get("show/feed.rss").await.unwrap().is_none());
}

#[tokio::test]
async fn nested_keys_create_directories() {
  let dir = tempfile::tempdir().unwrap();
  let s = store(&dir).await;

  let uri = s
    .put(Bytes::from_static(b"<rss/>"), "my%20show/feed.rss", "text/xml; charset=utf-8")
    .await
    .unwrap();
  assert_eq!(uri.as_str(), "http://localhost:9000/my%20show/feed.rss");
  assert!(dir.path().join("data/my%20show/feed.rss").exists());
}

#[tokio::test]
async fn rewrite_updates_metadata() {
  let dir = tempfile::tempdir().unwrap();
  let s = store(&dir).await;

  s.put(Bytes::from_static(b"one"), "a/b", "text/plain").await.unwrap();
  s.put(Bytes::from_static(b"three"), "a/b", "text/markdown").await.unwrap();

  let info = s.check("a/b").await.unwrap().unwrap();
  assert_eq!(info.size, 5);
  assert_eq!(info.mime_type, "text/markdown");
  assert_eq!(s.get("a/b").await.unwrap().unwrap(), Bytes::from_static(b"three"));
}

#[tokio::test]
async fn traversal_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let s = store(&dir).await;
  let err = s
    .put(Bytes::from_static(b"x"), "../escape", "text/plain")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidKey(_)));
  assert!(!dir.path().join("escape").exists());
}

#[tokio::test]
async fn reopening_keeps_metadata() {
  let dir = tempfile::tempdir().unwrap();
  store(&dir)
    .await
    .put(Bytes::from_static(b"abc"), "k", "text/plain")
    .await
    .unwrap();

  let info = store(&dir).await.check("k").await.unwrap().unwrap();
  assert_eq!(info.size, 3);
}
