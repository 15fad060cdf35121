//! Runtime configuration, built once at startup and passed down.
//!
//! Loading goes through the `config` crate: a TOML file overlaid by
//! `PODFEED__*` environment variables. The result is validated before any
//! source is touched, so a [`ConfigError`] never surfaces mid-run.

use std::{collections::HashSet, path::PathBuf, time::Duration};

use podfeed_rss::Owner;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_CONCURRENCY: usize = 5;

// ─── Sources ─────────────────────────────────────────────────────────────────

/// One configured upstream, turned into one published feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  /// Stable identifier; prefixes every storage key of this source.
  pub id:    String,
  /// Display name. Overrides the fetched title when set.
  #[serde(default)]
  pub name:  Option<String>,
  /// Only episodes whose title matches are published.
  #[serde(default, deserialize_with = "deserialize_regex")]
  pub regex: Option<Regex>,
  pub url:   Url,
}

impl SourceConfig {
  pub fn new(id: impl Into<String>, url: Url) -> Self {
    Self { id: id.into(), name: None, regex: None, url }
  }

  /// Source-scoped storage key: `<urlencoded id>/<name>`.
  pub fn storage_key(&self, name: &str) -> String {
    format!("{}/{}", urlencoding::encode(&self.id), name)
  }

  pub fn matches_title(&self, title: &str) -> bool {
    self.regex.as_ref().is_none_or(|re| re.is_match(title))
  }
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
  D: Deserializer<'de>,
{
  Option::<String>::deserialize(deserializer)?
    .map(|raw| Regex::new(&raw).map_err(serde::de::Error::custom))
    .transpose()
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerConfig {
  #[serde(default)]
  pub name:  Option<String>,
  pub email: String,
}

impl From<OwnerConfig> for Owner {
  fn from(cfg: OwnerConfig) -> Self { Owner { email: cfg.email, name: cfg.name } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// Sync every source once, then exit.
  #[default]
  Oneshot,
  /// Sync every source on a fixed interval until shutdown.
  Watch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
  Debug,
  #[default]
  Info,
  Warning,
  Error,
}

impl LogLevel {
  /// The equivalent `tracing` filter directive.
  pub fn as_directive(self) -> &'static str {
    match self {
      LogLevel::Debug => "debug",
      LogLevel::Info => "info",
      LogLevel::Warning => "warn",
      LogLevel::Error => "error",
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub mode:        Mode,
  #[serde(default)]
  pub loglevel:    LogLevel,
  /// Seconds between runs in watch mode.
  #[serde(default = "default_interval")]
  pub interval:    u64,
  #[serde(default = "default_concurrency")]
  pub concurrency: usize,
}

impl AppConfig {
  pub fn interval(&self) -> Duration { Duration::from_secs(self.interval) }
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      mode:        Mode::default(),
      loglevel:    LogLevel::default(),
      interval:    DEFAULT_INTERVAL_SECS,
      concurrency: DEFAULT_CONCURRENCY,
    }
  }
}

fn default_interval() -> u64 { DEFAULT_INTERVAL_SECS }
fn default_concurrency() -> usize { DEFAULT_CONCURRENCY }

/// Settings for the filesystem storage backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  pub base_dir:        PathBuf,
  /// Prefix of every public object URI.
  pub public_endpoint: Url,
}

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PodfeedConfig {
  #[serde(default)]
  pub owner:   Option<OwnerConfig>,
  pub storage: StorageConfig,
  pub sources: Vec<SourceConfig>,
  #[serde(default)]
  pub app:     AppConfig,
}

impl PodfeedConfig {
  /// Read `path` (TOML, optional) overlaid by `PODFEED__SECTION__KEY`
  /// environment variables, then validate.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.into()).required(false))
      .add_source(
        config::Environment::with_prefix("PODFEED")
          .prefix_separator("__")
          .separator("__"),
      )
      .build()?;
    Self::finish(settings)
  }

  /// Parse and validate an in-memory TOML document.
  pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(text, config::FileFormat::Toml))
      .build()?;
    Self::finish(settings)
  }

  fn finish(settings: config::Config) -> Result<Self, ConfigError> {
    let cfg: Self = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.sources.is_empty() {
      return Err(ConfigError::NoSources);
    }

    let mut seen = HashSet::new();
    for source in &self.sources {
      if source.id.trim().is_empty() {
        return Err(ConfigError::EmptySourceId);
      }
      if !seen.insert(source.id.as_str()) {
        return Err(ConfigError::DuplicateSource(source.id.clone()));
      }
      if source.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ConfigError::EmptySourceName(source.id.clone()));
      }
      if !matches!(source.url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
          source_id: source.id.clone(),
          scheme:    source.url.scheme().to_string(),
        });
      }
    }

    if let Some(owner) = &self.owner {
      if owner.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ConfigError::EmptyOwnerName);
      }
      if !owner.email.contains('@') {
        return Err(ConfigError::InvalidOwnerEmail(owner.email.clone()));
      }
    }

    if self.app.interval == 0 {
      return Err(ConfigError::InvalidInterval);
    }
    if self.app.concurrency == 0 {
      return Err(ConfigError::InvalidConcurrency);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const BASE: &str = r#"
[storage]
base_dir = "/tmp/podfeed"
public_endpoint = "https://cdn.example.com/"

[[sources]]
id = "my show"
name = "My Show"
regex = "^Episode"
url = "https://example.com/feed.xml"
"#;

  #[test]
  fn minimal_file_gets_defaults() {
    let cfg = PodfeedConfig::from_toml(BASE).unwrap();
    assert_eq!(cfg.app.mode, Mode::Oneshot);
    assert_eq!(cfg.app.loglevel, LogLevel::Info);
    assert_eq!(cfg.app.interval(), Duration::from_secs(3600));
    assert_eq!(cfg.app.concurrency, 5);
    assert!(cfg.owner.is_none());

    let source = &cfg.sources[0];
    assert_eq!(source.name.as_deref(), Some("My Show"));
    assert!(source.matches_title("Episode 4"));
    assert!(!source.matches_title("Trailer"));
  }

  #[test]
  fn full_file() {
    let text = format!(
      "{BASE}\n[owner]\nname = \"Jane\"\nemail = \"jane@example.com\"\n\n\
       [app]\nmode = \"watch\"\nloglevel = \"WARNING\"\ninterval = 60\nconcurrency = 2\n"
    );
    let cfg = PodfeedConfig::from_toml(&text).unwrap();
    assert_eq!(cfg.app.mode, Mode::Watch);
    assert_eq!(cfg.app.loglevel.as_directive(), "warn");
    assert_eq!(cfg.app.interval, 60);
    assert_eq!(cfg.app.concurrency, 2);
    let owner: Owner = cfg.owner.unwrap().into();
    assert_eq!(owner.name.as_deref(), Some("Jane"));
  }

  #[test]
  fn storage_key_is_scoped_and_encoded() {
    let source =
      SourceConfig::new("my show/2", Url::parse("https://example.com").unwrap());
    assert_eq!(source.storage_key("feed.rss"), "my%20show%2F2/feed.rss");
    assert!(source.matches_title("anything"));
  }

  #[test]
  fn bad_regex_fails_to_load() {
    let text = BASE.replace("^Episode", "(unclosed");
    assert!(matches!(
      PodfeedConfig::from_toml(&text),
      Err(ConfigError::Load(_))
    ));
  }

  fn valid() -> PodfeedConfig { PodfeedConfig::from_toml(BASE).unwrap() }

  #[test]
  fn rejects_duplicate_ids() {
    let mut cfg = valid();
    cfg.sources.push(cfg.sources[0].clone());
    assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateSource(id)) if id == "my show"));
  }

  #[test]
  fn rejects_non_http_urls() {
    let mut cfg = valid();
    cfg.sources[0].url = Url::parse("ftp://example.com/feed.xml").unwrap();
    assert!(matches!(
      cfg.validate(),
      Err(ConfigError::UnsupportedScheme { scheme, .. }) if scheme == "ftp"
    ));
  }

  #[test]
  fn rejects_bad_owner_and_app_values() {
    let mut cfg = valid();
    cfg.owner = Some(OwnerConfig { name: None, email: "nobody".into() });
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidOwnerEmail(_))));

    let mut cfg = valid();
    cfg.owner = Some(OwnerConfig { name: Some(" ".into()), email: "a@b.c".into() });
    assert!(matches!(cfg.validate(), Err(ConfigError::EmptyOwnerName)));

    let mut cfg = valid();
    cfg.app.interval = 0;
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidInterval)));

    let mut cfg = valid();
    cfg.app.concurrency = 0;
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidConcurrency)));

    let mut cfg = valid();
    cfg.sources.clear();
    assert!(matches!(cfg.validate(), Err(ConfigError::NoSources)));

    let mut cfg = valid();
    cfg.sources[0].id = String::new();
    assert!(matches!(cfg.validate(), Err(ConfigError::EmptySourceId)));
  }
}
