//! Error types for the podfeed-rss codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("xml error: {0}")]
  Xml(String),

  #[error("missing required field {0}")]
  MissingField(String),

  #[error("missing required attribute {name} of {path}")]
  MissingAttribute { path: String, name: String },

  #[error("invalid enclosure length: {0}")]
  InvalidLength(String),

  #[error("invalid url in {field}: {value}")]
  InvalidUrl { field: String, value: String },

  #[error("items is required")]
  ItemsRequired,

  #[error("enclosure is required")]
  EnclosureRequired,

  #[error("resource unavailable: {0}")]
  ResourceUnavailable(&'static str),

  #[error("cancelled")]
  Cancelled,
}

impl From<quick_xml::Error> for Error {
  fn from(e: quick_xml::Error) -> Self { Error::Xml(e.to_string()) }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
  fn from(e: quick_xml::events::attributes::AttrError) -> Self {
    Error::Xml(e.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
