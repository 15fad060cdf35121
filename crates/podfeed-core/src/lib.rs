//! Feed synchronization for podfeed.
//!
//! Owns the configuration model, the two collaborator traits ([`Storage`],
//! [`Fetcher`]) and the orchestration on top of them: a [`Task`] syncs one
//! source, a [`Runner`] drives every source with bounded concurrency.
//!
//! Concrete backends live in other crates (`podfeed-store-local`, the HTTP
//! fetcher in `podfeed-cli`).

pub mod config;
pub mod error;
pub mod fetcher;
pub mod runner;
pub mod storage;
pub mod task;

pub use config::{PodfeedConfig, SourceConfig};
pub use error::{ConfigError, Error, Result};
pub use fetcher::Fetcher;
pub use runner::{RunSummary, Runner};
pub use storage::{ObjectInfo, Storage};
pub use task::{FEED_CONTENT_TYPE, FEED_NAME, SyncOutcome, Task};
