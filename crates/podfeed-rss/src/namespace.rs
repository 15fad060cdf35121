//! XML namespaces understood by the feed model and element builders for
//! them.

use crate::xml::Element;

// ─── Namespaces ──────────────────────────────────────────────────────────────

/// A fixed prefix ↔ URI binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
  pub prefix: &'static str,
  pub uri:    &'static str,
}

/// Apple podcast extensions.
pub const ITUNES: Namespace = Namespace {
  prefix: "itunes",
  uri:    "http://www.itunes.com/dtds/podcast-1.0.dtd",
};

/// RSS content module. Reserved; no entity emits it yet.
pub const CONTENT: Namespace = Namespace {
  prefix: "content",
  uri:    "http://purl.org/rss/1.0/modules/content/",
};

/// Every namespace a lookup path or a serialized document may use.
pub const KNOWN: &[Namespace] = &[ITUNES, CONTENT];

impl Namespace {
  /// Find a known namespace by its conventional prefix.
  pub fn by_prefix(prefix: &str) -> Option<&'static Namespace> {
    KNOWN.iter().find(|ns| ns.prefix == prefix)
  }

  /// Find a known namespace by URI.
  pub fn by_uri(uri: &str) -> Option<&'static Namespace> {
    KNOWN.iter().find(|ns| ns.uri == uri)
  }

  /// `prefix:local`, the form lookup paths are written in.
  pub fn qualify(&self, local: &str) -> String {
    format!("{}:{}", self.prefix, local)
  }

  /// The `xmlns:prefix` declaration attribute name.
  pub fn declaration(&self) -> String { format!("xmlns:{}", self.prefix) }

  /// A childless, textless element in this namespace.
  pub fn element(&self, local: &str) -> Element {
    Element {
      namespace:  Some(self.uri.to_string()),
      name:       local.to_string(),
      attributes: Vec::new(),
      text:       String::new(),
      children:   Vec::new(),
    }
  }

  /// An element in this namespace carrying `text`.
  pub fn text_element(&self, local: &str, text: &str) -> Element {
    self.element(local).with_text(text)
  }

  /// An empty element in this namespace carrying only attributes.
  pub fn empty_element(&self, local: &str, attrs: &[(&str, &str)]) -> Element {
    attrs
      .iter()
      .fold(self.element(local), |el, (k, v)| el.with_attribute(k, v))
  }
}
