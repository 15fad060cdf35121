//! Runs every configured source through a [`Task`] with bounded concurrency.

use std::{
  collections::BTreeSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  config::{DEFAULT_CONCURRENCY, SourceConfig},
  fetcher::Fetcher,
  storage::Storage,
  task::{SyncOutcome, Task},
};

/// Tally of one pass over all sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub created:   usize,
  pub updated:   usize,
  pub unchanged: usize,
  pub failed:    usize,
}

impl RunSummary {
  fn record(&mut self, outcome: Option<SyncOutcome>) {
    match outcome {
      Some(SyncOutcome::Created) => self.created += 1,
      Some(SyncOutcome::Updated) => self.updated += 1,
      Some(SyncOutcome::Unchanged) => self.unchanged += 1,
      None => self.failed += 1,
    }
  }
}

pub struct Runner<S, F> {
  storage:     Arc<S>,
  fetcher:     Arc<F>,
  sources:     Vec<SourceConfig>,
  concurrency: usize,
  cancel:      CancellationToken,
  in_flight:   Arc<Mutex<BTreeSet<String>>>,
}

impl<S, F> Runner<S, F>
where
  S: Storage + 'static,
  F: Fetcher + 'static,
{
  pub fn new(
    storage: Arc<S>,
    fetcher: Arc<F>,
    sources: Vec<SourceConfig>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      storage,
      fetcher,
      sources,
      concurrency: DEFAULT_CONCURRENCY,
      cancel,
      in_flight: Arc::default(),
    }
  }

  /// Upper bound on tasks running at once. Clamped to at least one.
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  /// Ids of the tasks currently between their before and after hooks.
  pub fn in_flight(&self) -> Vec<String> {
    match self.in_flight.lock() {
      Ok(set) => set.iter().cloned().collect(),
      Err(_) => Vec::new(),
    }
  }

  fn task(&self, source: SourceConfig) -> Task<S, F> {
    let started = self.in_flight.clone();
    let finished = self.in_flight.clone();
    Task::new(
      source,
      self.storage.clone(),
      self.fetcher.clone(),
      self.cancel.clone(),
    )
    .with_before(move |id| {
      if let Ok(mut set) = started.lock() {
        set.insert(id.to_string());
      }
    })
    .with_after(move |id| {
      if let Ok(mut set) = finished.lock() {
        set.remove(id);
      }
    })
  }

  /// Sync every source once. Failures are contained per source.
  pub async fn run_once(&self) -> RunSummary {
    debug!(sources = self.sources.len(), concurrency = self.concurrency, "run started");
    let outcomes = stream::iter(self.sources.iter().cloned())
      .map(|source| {
        let task = self.task(source);
        async move { task.execute().await }
      })
      .buffer_unordered(self.concurrency)
      .collect::<Vec<_>>()
      .await;

    let mut summary = RunSummary::default();
    for outcome in outcomes {
      summary.record(outcome);
    }
    info!(
      created = summary.created,
      updated = summary.updated,
      unchanged = summary.unchanged,
      failed = summary.failed,
      "run finished"
    );
    summary
  }

  /// Sync every source, then again every `interval`, until cancelled.
  pub async fn watch(&self, interval: Duration) {
    while !self.cancel.is_cancelled() {
      self.run_once().await;
      tokio::select! {
        _ = self.cancel.cancelled() => break,
        _ = tokio::time::sleep(interval) => {}
      }
    }
    info!("watch stopped");
  }

  /// Log the tasks still running when shutdown was requested.
  pub fn report_shutdown(&self) {
    let pending = self.in_flight();
    if pending.is_empty() {
      info!("shutdown: no tasks in flight");
    } else {
      warn!(tasks = ?pending, "shutdown: tasks still in flight");
    }
  }
}
