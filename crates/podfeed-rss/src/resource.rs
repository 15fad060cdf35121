//! [`Resource`]: a value that is either present already or produced on
//! demand.
//!
//! Lazy resources defer expensive work (a thumbnail lookup, a media upload)
//! until something actually needs the value. The loader runs at most once per
//! instance and its outcome, including "not found", is kept for the lifetime
//! of the resource.
//!
//! Materialization is async and cancellable ([`Resource::get`]). Merging and
//! serialization are synchronous and only see values that have already been
//! materialized ([`Resource::require`]).

use std::{fmt, future::Future, sync::Mutex};

use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

type Loader<T> = Box<dyn FnOnce() -> BoxFuture<'static, Option<T>> + Send>;

pub struct Lazy<T> {
  slot:   OnceCell<Option<T>>,
  loader: Mutex<Option<Loader<T>>>,
}

pub enum Resource<T> {
  Plain(T),
  Lazy(Lazy<T>),
}

impl<T> Resource<T> {
  pub fn plain(value: T) -> Self { Resource::Plain(value) }

  /// Defer `load` until the first [`get`](Self::get).
  pub fn lazy<F, Fut>(load: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Option<T>> + Send + 'static,
  {
    let loader: Loader<T> = Box::new(move || Box::pin(load()));
    Resource::Lazy(Lazy {
      slot:   OnceCell::new(),
      loader: Mutex::new(Some(loader)),
    })
  }

  /// Materialize the value. Absence is `Ok(None)`; the only error is
  /// cancellation.
  pub async fn get(&self, cancel: &CancellationToken) -> Result<Option<&T>> {
    let lazy = match self {
      Resource::Plain(value) => return Ok(Some(value)),
      Resource::Lazy(lazy) => lazy,
    };
    if let Some(done) = lazy.slot.get() {
      return Ok(done.as_ref());
    }
    if cancel.is_cancelled() {
      return Err(Error::Cancelled);
    }

    let init = lazy.slot.get_or_init(|| async {
      let loader = match lazy.loader.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => None,
      };
      match loader {
        Some(load) => load().await,
        None => None,
      }
    });

    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(Error::Cancelled),
      value = init => Ok(value.as_ref()),
    }
  }

  /// Materialize the value, failing if it turns out to be absent.
  pub async fn ensure(
    &self,
    what: &'static str,
    cancel: &CancellationToken,
  ) -> Result<&T> {
    self
      .get(cancel)
      .await?
      .ok_or(Error::ResourceUnavailable(what))
  }

  /// The value if it is present without further work.
  pub fn value(&self) -> Option<&T> {
    match self {
      Resource::Plain(value) => Some(value),
      Resource::Lazy(lazy) => lazy.slot.get().and_then(Option::as_ref),
    }
  }

  /// Synchronous `ensure` over an already-materialized resource.
  pub fn require(&self, what: &'static str) -> Result<&T> {
    self.value().ok_or(Error::ResourceUnavailable(what))
  }

  pub fn value_mut(&mut self) -> Option<&mut T> {
    match self {
      Resource::Plain(value) => Some(value),
      Resource::Lazy(lazy) => lazy.slot.get_mut().and_then(Option::as_mut),
    }
  }

  pub fn into_value(self) -> Option<T> {
    match self {
      Resource::Plain(value) => Some(value),
      Resource::Lazy(lazy) => lazy.slot.into_inner().flatten(),
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for Resource<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resource::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
      Resource::Lazy(lazy) => match lazy.slot.get() {
        Some(done) => f.debug_tuple("Lazy").field(done).finish(),
        None => f.write_str("Lazy(<pending>)"),
      },
    }
  }
}

impl<T> From<T> for Resource<T> {
  fn from(value: T) -> Self { Resource::Plain(value) }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  #[tokio::test]
  async fn plain_is_always_present() {
    let cancel = CancellationToken::new();
    let r = Resource::plain(7);
    assert_eq!(r.get(&cancel).await.unwrap(), Some(&7));
    assert_eq!(r.require("n").unwrap(), &7);
  }

  #[tokio::test]
  async fn lazy_loads_once_and_memoizes() {
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let r = Resource::lazy(move || async move {
      counter.fetch_add(1, Ordering::SeqCst);
      Some("thumb".to_string())
    });

    assert!(r.value().is_none());
    assert!(matches!(r.require("image"), Err(Error::ResourceUnavailable("image"))));
    assert_eq!(r.get(&cancel).await.unwrap().map(String::as_str), Some("thumb"));
    assert_eq!(r.get(&cancel).await.unwrap().map(String::as_str), Some("thumb"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(r.value().map(String::as_str), Some("thumb"));
  }

  #[tokio::test]
  async fn not_found_is_memoized_too() {
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let r: Resource<u32> = Resource::lazy(move || async move {
      counter.fetch_add(1, Ordering::SeqCst);
      None
    });

    assert_eq!(r.get(&cancel).await.unwrap(), None);
    assert!(matches!(
      r.ensure("audio", &cancel).await,
      Err(Error::ResourceUnavailable("audio"))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn cancellation_stops_materialization() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let r: Resource<u32> = Resource::lazy(|| async { Some(1) });
    assert!(matches!(r.get(&cancel).await, Err(Error::Cancelled)));
    assert!(r.value().is_none());
  }

  #[tokio::test]
  async fn cancellation_interrupts_a_pending_loader() {
    let cancel = CancellationToken::new();
    let r: Resource<u32> =
      Resource::lazy(|| futures::future::pending::<Option<u32>>());
    let trigger = cancel.clone();
    tokio::spawn(async move { trigger.cancel() });
    assert!(matches!(r.get(&cancel).await, Err(Error::Cancelled)));
  }

  #[test]
  fn into_value_and_mutation() {
    let mut r = Resource::plain(vec![1, 2]);
    r.value_mut().unwrap().push(3);
    assert_eq!(r.into_value(), Some(vec![1, 2, 3]));
  }
}
