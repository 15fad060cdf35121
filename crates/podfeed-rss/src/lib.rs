//! RSS 2.0 + iTunes podcast feed model for podfeed.
//!
//! Converts between feed documents and typed entities ([`Podcast`],
//! [`Episode`], [`Enclosure`]) and reconciles two snapshots of the same feed
//! with [`RssEntity::merge`]. Pure apart from lazy [`Resource`] loaders; no
//! storage or network dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use podfeed_rss::{Podcast, RssEntity};
//!
//! # fn demo(stored: &[u8], fetched: Podcast) -> podfeed_rss::Result<()> {
//! let mut feed = Podcast::from_rss(stored)?;
//! if feed.merge(fetched)? {
//!   let bytes = feed.to_rss()?;
//!   println!("{} bytes to publish", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod enclosure;
pub mod episode;
pub mod error;
pub mod namespace;
pub mod podcast;
pub mod resource;
pub mod xml;

pub use enclosure::Enclosure;
pub use episode::Episode;
pub use error::{Error, Result};
pub use podcast::{Owner, Podcast};
pub use resource::Resource;
use url::Url;
use xml::Element;

// ─── Capability trait ────────────────────────────────────────────────────────

/// What every feed entity can do: become an element, be read back from one,
/// and absorb a newer version of itself.
pub trait RssEntity: Sized {
  fn to_xml(&self) -> Result<Element>;

  fn from_xml(el: &Element) -> Result<Self>;

  /// Overwrite every field that differs in `other`; report whether anything
  /// did.
  fn merge(&mut self, other: Self) -> Result<bool>;
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// Compare-and-overwrite for a single field.
pub(crate) fn merge_field<T: PartialEq>(mine: &mut T, theirs: T) -> bool {
  if *mine == theirs {
    return false;
  }
  *mine = theirs;
  true
}

pub(crate) fn parse_url(field: &str, raw: &str) -> Result<Url> {
  Url::parse(raw).map_err(|_| Error::InvalidUrl {
    field: field.to_string(),
    value: raw.to_string(),
  })
}

// ─── Round-trip and merge tests ──────────────────────────────────────────────


// ─── Shared test helpers ──────────────────────────────────────────────────────
