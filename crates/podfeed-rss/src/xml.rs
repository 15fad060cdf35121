//! A small namespace-aware XML tree.
//!
//! Documents are read with `quick-xml`'s namespace-resolving reader into an
//! owned [`Element`] tree, queried through path accessors, and written back
//! with `quick-xml`'s writer API.
//!
//! Lookup paths are `/`-separated element names relative to the element they
//! are called on. A segment may carry a known prefix (`itunes:image`); an
//! unprefixed segment only matches elements outside any namespace. `.` (or an
//! empty path) addresses the element itself.

use std::io::{Cursor, Write};

use quick_xml::{
  NsReader, Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
  name::{Namespace as XmlNs, ResolveResult},
};

use crate::{
  error::{Error, Result},
  namespace::{KNOWN, Namespace},
};

// ─── Tree ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
  /// Namespace URI, `None` for unqualified elements.
  pub namespace:  Option<String>,
  /// Local name.
  pub name:       String,
  pub attributes: Vec<(String, String)>,
  /// Concatenated direct text content, untrimmed.
  pub text:       String,
  pub children:   Vec<Element>,
}

impl Element {
  /// An unqualified element.
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Self::default()
    }
  }

  /// An unqualified element carrying `text`.
  pub fn text_element(name: &str, text: &str) -> Self {
    Self::new(name).with_text(text)
  }

  pub fn with_text(mut self, text: &str) -> Self {
    self.text = text.to_string();
    self
  }

  pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
    self.attributes.push((name.to_string(), value.to_string()));
    self
  }

  pub fn with_child(mut self, child: Element) -> Self {
    self.children.push(child);
    self
  }

  pub fn push(&mut self, child: Element) { self.children.push(child); }

  /// Raw attribute value on this element.
  pub fn attribute(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
    self.name == local && self.namespace.as_deref() == namespace
  }

  /// `prefix:name` for known namespaces, the bare local name otherwise.
  fn qualified_name(&self) -> String {
    match self.namespace.as_deref().and_then(Namespace::by_uri) {
      Some(ns) => ns.qualify(&self.name),
      None => self.name.clone(),
    }
  }

  fn uses_namespace(&self, uri: &str) -> bool {
    self.namespace.as_deref() == Some(uri)
      || self.children.iter().any(|c| c.uses_namespace(uri))
  }
}

// ─── Path accessors ──────────────────────────────────────────────────────────

/// Resolve one path segment to `(namespace uri, local name)`. `None` means
/// the segment names an unknown prefix and can never match.
fn resolve_segment(segment: &str) -> Option<(Option<&'static str>, &str)> {
  match segment.split_once(':') {
    Some((prefix, local)) => {
      Namespace::by_prefix(prefix).map(|ns| (Some(ns.uri), local))
    }
    None => Some((None, segment)),
  }
}

impl Element {
  /// Every element matching `path`, in document order.
  pub fn all_elements(&self, path: &str) -> Vec<&Element> {
    let mut current: Vec<&Element> = vec![self];
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
      let Some((namespace, local)) = resolve_segment(segment) else {
        return Vec::new();
      };
      current = current
        .into_iter()
        .flat_map(|el| el.children.iter())
        .filter(|c| c.matches(namespace, local))
        .collect();
    }
    current
  }

  pub fn optional_element(&self, path: &str) -> Option<&Element> {
    self.all_elements(path).into_iter().next()
  }

  pub fn required_element(&self, path: &str) -> Result<&Element> {
    self
      .optional_element(path)
      .ok_or_else(|| Error::MissingField(path.to_string()))
  }

  /// Trimmed text of the first element matching `path`.
  pub fn optional_text(&self, path: &str) -> Option<String> {
    self
      .optional_element(path)
      .map(|el| el.text.trim().to_string())
  }

  pub fn required_text(&self, path: &str) -> Result<String> {
    self
      .optional_text(path)
      .ok_or_else(|| Error::MissingField(path.to_string()))
  }

  /// Trimmed value of attribute `name` on the first element matching `path`.
  pub fn optional_attribute(&self, path: &str, name: &str) -> Option<String> {
    self
      .optional_element(path)
      .and_then(|el| el.attribute(name))
      .map(|v| v.trim().to_string())
  }

  pub fn required_attribute(&self, path: &str, name: &str) -> Result<String> {
    self
      .optional_attribute(path, name)
      .ok_or_else(|| Error::MissingAttribute {
        path: path.to_string(),
        name: name.to_string(),
      })
  }
}

// ─── Reading ─────────────────────────────────────────────────────────────────

fn element_from_start(
  resolved: ResolveResult,
  start: &BytesStart,
) -> Result<Element> {
  let namespace = match resolved {
    ResolveResult::Bound(XmlNs(uri)) => {
      Some(String::from_utf8_lossy(uri).into_owned())
    }
    _ => None,
  };
  let name =
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

  let mut attributes = Vec::new();
  for attr in start.attributes() {
    let attr = attr?;
    if attr.key.as_namespace_binding().is_some() {
      continue;
    }
    let key = String::from_utf8_lossy(attr.key.local_name().as_ref())
      .into_owned();
    let value = attr.unescape_value()?.into_owned();
    attributes.push((key, value));
  }

  Ok(Element {
    namespace,
    name,
    attributes,
    text: String::new(),
    children: Vec::new(),
  })
}

/// Parse a complete document and return its root element.
pub fn parse(input: &[u8]) -> Result<Element> {
  let mut reader = NsReader::from_reader(input);
  let mut stack: Vec<Element> = Vec::new();
  let mut root: Option<Element> = None;
  let mut buf = Vec::new();

  loop {
    match reader.read_resolved_event_into(&mut buf) {
      Ok((resolved, Event::Start(ref e))) => {
        stack.push(element_from_start(resolved, e)?);
      }
      Ok((resolved, Event::Empty(ref e))) => {
        let el = element_from_start(resolved, e)?;
        match stack.last_mut() {
          Some(parent) => parent.push(el),
          None => root = Some(el),
        }
      }
      Ok((_, Event::End(_))) => {
        let el = stack
          .pop()
          .ok_or_else(|| Error::Xml("unbalanced end tag".into()))?;
        match stack.last_mut() {
          Some(parent) => parent.push(el),
          None => root = Some(el),
        }
      }
      Ok((_, Event::Text(ref e))) => {
        if let Some(top) = stack.last_mut() {
          top.text.push_str(&e.unescape()?);
        }
      }
      Ok((_, Event::CData(e))) => {
        if let Some(top) = stack.last_mut() {
          top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
        }
      }
      Ok((_, Event::Eof)) => break,
      Err(e) => return Err(Error::Xml(e.to_string())),
      _ => {}
    }
    buf.clear();
  }

  if !stack.is_empty() {
    return Err(Error::Xml("unexpected end of document".into()));
  }
  root.ok_or_else(|| Error::Xml("document has no root element".into()))
}

// ─── Writing ─────────────────────────────────────────────────────────────────

fn write_err(e: impl std::fmt::Display) -> Error { Error::Xml(e.to_string()) }

fn write_element<W: Write>(
  w: &mut Writer<W>,
  el: &Element,
  declarations: &[(String, &str)],
) -> Result<()> {
  let tag = el.qualified_name();
  let mut start = BytesStart::new(tag.as_str());
  for (k, v) in declarations {
    start.push_attribute((k.as_str(), *v));
  }
  for (k, v) in &el.attributes {
    start.push_attribute((k.as_str(), v.as_str()));
  }

  if el.text.is_empty() && el.children.is_empty() {
    return w.write_event(Event::Empty(start)).map_err(write_err);
  }

  w.write_event(Event::Start(start)).map_err(write_err)?;
  if !el.text.is_empty() {
    w.write_event(Event::Text(BytesText::new(&el.text)))
      .map_err(write_err)?;
  }
  for child in &el.children {
    write_element(w, child, &[])?;
  }
  w.write_event(Event::End(BytesEnd::new(tag.as_str())))
    .map_err(write_err)
}

impl Element {
  /// Serialize as a standalone UTF-8 document, declaring every known
  /// namespace the tree uses on the root element.
  pub fn to_document(&self) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
      .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
      .map_err(write_err)?;

    let declarations: Vec<(String, &str)> = KNOWN
      .iter()
      .filter(|ns| self.uses_namespace(ns.uri))
      .map(|ns| (ns.declaration(), ns.uri))
      .collect();
    write_element(&mut writer, self, &declarations)?;

    Ok(writer.into_inner().into_inner())
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
