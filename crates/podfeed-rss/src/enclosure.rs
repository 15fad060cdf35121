//! The `<enclosure>` media reference of an episode.

use url::Url;

use crate::{
  RssEntity, merge_field,
  error::{Error, Result},
  parse_url,
  xml::Element,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
  /// Absolute URL of the media file.
  pub url:       Url,
  /// Size in bytes.
  pub length:    u64,
  pub mime_type: String,
}

impl RssEntity for Enclosure {
  fn to_xml(&self) -> Result<Element> {
    Ok(
      Element::new("enclosure")
        .with_attribute("url", self.url.as_str())
        .with_attribute("length", &self.length.to_string())
        .with_attribute("type", &self.mime_type),
    )
  }

  fn from_xml(el: &Element) -> Result<Self> {
    let url = el.required_attribute(".", "url")?;
    let length = el.required_attribute(".", "length")?;
    let mime_type = el.required_attribute(".", "type")?;
    Ok(Self {
      url: parse_url("enclosure/@url", &url)?,
      length: length.parse().map_err(|_| Error::InvalidLength(length))?,
      mime_type,
    })
  }

  fn merge(&mut self, other: Self) -> Result<bool> {
    let mut changed = merge_field(&mut self.url, other.url);
    changed |= merge_field(&mut self.length, other.length);
    changed |= merge_field(&mut self.mime_type, other.mime_type);
    Ok(changed)
  }
}
