//! podfeed binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the local
//! object store, and republishes every configured source as a feed, once or
//! on an interval depending on `app.mode`.

mod fetcher;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use podfeed_core::{
  PodfeedConfig, Runner,
  config::{LogLevel, Mode},
};
use podfeed_store_local::LocalStorage;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use fetcher::HttpFetcher;

#[derive(Parser)]
#[command(author, version, about = "Republish podcast feeds with locally mirrored media")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let cfg = PodfeedConfig::load(&cli.config)
    .with_context(|| format!("invalid configuration in {:?}", cli.config))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(level_filter(cfg.app.loglevel).into())
        .from_env_lossy(),
    )
    .init();

  let base_dir = expand_tilde(&cfg.storage.base_dir);
  let storage = LocalStorage::open(&base_dir, cfg.storage.public_endpoint.clone())
    .await
    .with_context(|| format!("failed to open storage at {base_dir:?}"))?;
  let storage = Arc::new(storage);
  let fetcher = Arc::new(HttpFetcher::new(
    storage.clone(),
    cfg.owner.clone().map(Into::into),
  ));

  let cancel = CancellationToken::new();
  let runner = Arc::new(
    Runner::new(storage, fetcher, cfg.sources.clone(), cancel.clone())
      .with_concurrency(cfg.app.concurrency),
  );

  tokio::spawn({
    let runner = runner.clone();
    let cancel = cancel.clone();
    async move {
      shutdown_signal().await;
      info!("shutdown requested");
      runner.report_shutdown();
      cancel.cancel();
    }
  });

  info!(sources = cfg.sources.len(), mode = ?cfg.app.mode, "podfeed started");
  match cfg.app.mode {
    Mode::Oneshot => {
      let summary = runner.run_once().await;
      if summary.failed > 0 {
        anyhow::bail!("{} of {} sources failed", summary.failed, cfg.sources.len());
      }
    }
    Mode::Watch => runner.watch(cfg.app.interval()).await,
  }
  Ok(())
}

fn level_filter(level: LogLevel) -> LevelFilter {
  match level {
    LogLevel::Debug => LevelFilter::DEBUG,
    LogLevel::Info => LevelFilter::INFO,
    LogLevel::Warning => LevelFilter::WARN,
    LogLevel::Error => LevelFilter::ERROR,
  }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(err) = tokio::signal::ctrl_c().await {
      error!(error = %err, "cannot listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(err) => {
        error!(error = %err, "cannot listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_levels_map_to_filters() {
    assert_eq!(level_filter(LogLevel::Warning), LevelFilter::WARN);
    assert_eq!(level_filter(LogLevel::Debug), LevelFilter::DEBUG);
  }

  #[test]
  fn tilde_is_expanded_only_at_the_start() {
    let plain = Path::new("/var/lib/podfeed");
    assert_eq!(expand_tilde(plain), plain);
    let odd = Path::new("data/~/x");
    assert_eq!(expand_tilde(odd), odd);
  }
}
