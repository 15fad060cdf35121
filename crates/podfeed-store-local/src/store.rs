//! [`LocalStorage`], the filesystem implementation of [`Storage`].

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use podfeed_core::storage::{ObjectInfo, Storage};
use rusqlite::OptionalExtension as _;
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result, schema::SCHEMA};

const DATABASE_FILE: &str = "db.sqlite3";
const DATA_DIR: &str = "data";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Objects on local disk, served from `public_endpoint` by something else
/// (a static file server, a CDN origin).
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct LocalStorage {
  data_dir:        PathBuf,
  public_endpoint: Url,
  conn:            tokio_rusqlite::Connection,
}

impl LocalStorage {
  /// Open (or create) a store rooted at `base_dir`.
  pub async fn open(
    base_dir: impl AsRef<Path>,
    public_endpoint: Url,
  ) -> Result<Self> {
    let base_dir = base_dir.as_ref();
    let data_dir = base_dir.join(DATA_DIR);
    if !tokio::fs::try_exists(&data_dir).await? {
      tokio::fs::create_dir_all(&data_dir).await?;
      restrict(base_dir, 0o750).await?;
      info!(path = %data_dir.display(), "created data directory");
    }

    let conn = tokio_rusqlite::Connection::open(base_dir.join(DATABASE_FILE)).await?;
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;

    Ok(Self {
      data_dir,
      public_endpoint: with_trailing_slash(public_endpoint),
      conn,
    })
  }

  fn uri(&self, key: &str) -> Result<Url> { Ok(self.public_endpoint.join(key)?) }

  fn path(&self, key: &str) -> PathBuf { self.data_dir.join(key) }
}

/// Strip leading slashes and refuse anything that could leave the data
/// directory.
fn normalize_key(key: &str) -> Result<&str> {
  let key = key.trim_start_matches('/');
  let escapes = Path::new(key)
    .components()
    .any(|c| !matches!(c, Component::Normal(_)));
  if key.is_empty() || key.ends_with('/') || escapes {
    return Err(Error::InvalidKey(key.to_string()));
  }
  Ok(key)
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  url
}

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> Result<()> {
  use std::os::unix::fs::PermissionsExt as _;
  tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
  Ok(())
}

#[cfg(not(unix))]
async fn restrict(_path: &Path, _mode: u32) -> Result<()> { Ok(()) }

// ─── Storage impl ────────────────────────────────────────────────────────────

impl Storage for LocalStorage {
  type Error = Error;

  async fn put(&self, data: Bytes, key: &str, content_type: &str) -> Result<Url> {
    let key = normalize_key(key)?;
    let path = self.path(key);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &data).await?;
    restrict(&path, 0o640).await?;

    let size = i64::try_from(data.len()).unwrap_or(i64::MAX);
    let (key_owned, content_type) = (key.to_string(), content_type.to_string());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO files (key, type, size) VALUES (?1, ?2, ?3)
           ON CONFLICT (key) DO UPDATE SET type = excluded.type, size = excluded.size",
          rusqlite::params![key_owned, content_type, size],
        )?;
        Ok(())
      })
      .await?;

    debug!(%key, size, "stored object");
    self.uri(key)
  }

  async fn check(&self, key: &str) -> Result<Option<ObjectInfo>> {
    let key = normalize_key(key)?;
    let key_owned = key.to_string();
    let row: Option<(String, i64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT type, size FROM files WHERE key = ?1",
              rusqlite::params![key_owned],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(mime_type, size)| {
        Ok(ObjectInfo {
          uri: self.uri(key)?,
          size: u64::try_from(size).unwrap_or(0),
          mime_type,
        })
      })
      .transpose()
  }

  async fn get(&self, key: &str) -> Result<Option<Bytes>> {
    let key = normalize_key(key)?;
    match tokio::fs::read(self.path(key)).await {
      Ok(data) => Ok(Some(Bytes::from(data))),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }
}
