//! The podcast channel: top-level feed metadata plus its episodes, and the
//! merge that reconciles a stored feed with a freshly fetched one.

use std::{
  collections::{HashMap, HashSet},
  sync::LazyLock,
};

use regex::Regex;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
  RssEntity, merge_field,
  episode::Episode,
  error::{Error, Result},
  namespace::ITUNES,
  parse_url,
  resource::Resource,
  xml::{self, Element},
};

const GENERATOR: &str = "podfeed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
  pub email: String,
  pub name:  Option<String>,
}

#[derive(Debug)]
pub struct Podcast {
  /// Never empty once materialized for serialization.
  pub items:       Resource<Vec<Episode>>,
  /// Homepage of the show.
  pub link:        Url,
  pub title:       String,
  pub image:       Resource<Url>,
  pub description: String,
  pub owner:       Option<Owner>,
  pub author:      String,
  /// Order is kept for output but ignored when comparing.
  pub categories:  Vec<String>,
  pub explicit:    bool,
  pub language:    Option<String>,
}

static PUBLISHABLE_CATEGORY: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[\w &]+$").expect("category pattern compiles"));

/// Whether a category may appear in the serialized feed: word characters,
/// spaces and ampersands only.
pub fn is_publishable_category(category: &str) -> bool {
  PUBLISHABLE_CATEGORY.is_match(category)
}

impl Podcast {
  /// Parse a complete RSS document.
  pub fn from_rss(bytes: &[u8]) -> Result<Self> {
    Self::from_xml(&xml::parse(bytes)?)
  }

  /// Serialize to a complete RSS document. Every resource must already be
  /// materialized.
  pub fn to_rss(&self) -> Result<Vec<u8>> { self.to_xml()?.to_document() }

  /// Resolve the artwork, the episode list and every episode's own
  /// resources, in order, stopping at the first failure or cancellation.
  pub async fn materialize(&self, cancel: &CancellationToken) -> Result<()> {
    self.image.ensure("image", cancel).await?;
    let items = self.items.ensure("items", cancel).await?;
    for item in items {
      if cancel.is_cancelled() {
        return Err(Error::Cancelled);
      }
      item.materialize(cancel).await?;
    }
    Ok(())
  }

  fn merge_items(&mut self, others: Resource<Vec<Episode>>) -> Result<bool> {
    let incoming = others
      .into_value()
      .ok_or(Error::ResourceUnavailable("items"))?;
    let current = self
      .items
      .value_mut()
      .ok_or(Error::ResourceUnavailable("items"))?;

    let index = current
      .iter()
      .enumerate()
      .map(|(i, ep)| Ok((ep.identity()?.to_string(), i)))
      .collect::<Result<HashMap<String, usize>>>()?;

    let mut staged = Vec::new();
    let mut changed = false;
    for episode in incoming {
      let existing = index.get(episode.identity()?).copied();
      match existing {
        Some(i) => {
          if current[i].merge(episode)? {
            changed = true;
          }
        }
        None => staged.push(episode),
      }
    }

    if staged.is_empty() && !changed {
      return Ok(false);
    }

    let mut merged = std::mem::take(current);
    merged.extend(staged);
    // Stable, newest first; undated episodes sink to the end.
    merged.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    self.items = Resource::plain(merged);
    Ok(true)
  }

  fn parse_image(el: &Element) -> Result<Url> {
    match el.optional_attribute("channel/itunes:image", "href") {
      Some(href) if !href.is_empty() => {
        parse_url("channel/itunes:image/@href", &href)
      }
      _ => parse_url("channel/image/url", &el.required_text("channel/image/url")?),
    }
  }

  fn parse_owner(el: &Element) -> Result<Option<Owner>> {
    let Some(owner) = el.optional_element("channel/itunes:owner") else {
      return Ok(None);
    };
    Ok(Some(Owner {
      name:  owner.optional_text("itunes:name"),
      email: el.required_text("channel/itunes:owner/itunes:email")?,
    }))
  }

  fn parse_categories(el: &Element) -> Vec<String> {
    el.all_elements("channel/itunes:category")
      .into_iter()
      .filter_map(|c| {
        let text = c.text.trim();
        if !text.is_empty() {
          Some(text.to_string())
        } else {
          c.attribute("text")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
        }
      })
      .collect()
  }
}

impl RssEntity for Podcast {
  fn to_xml(&self) -> Result<Element> {
    let items = self.items.require("items")?;
    if items.is_empty() {
      return Err(Error::ItemsRequired);
    }
    let image = self.image.require("image")?;

    let mut channel = Element::new("channel");
    channel.push(Element::text_element("generator", GENERATOR));
    channel.push(Element::text_element("link", self.link.as_str()));
    channel.push(Element::text_element("title", &self.title));
    channel.push(ITUNES.empty_element("image", &[("href", image.as_str())]));
    channel.push(
      Element::new("image")
        .with_child(Element::text_element("link", self.link.as_str()))
        .with_child(Element::text_element("title", &self.title))
        .with_child(Element::text_element("url", image.as_str())),
    );
    channel.push(Element::text_element("description", &self.description));
    channel.push(ITUNES.text_element("summary", &self.description));
    if let Some(owner) = &self.owner {
      let mut el = ITUNES.element("owner");
      if let Some(name) = &owner.name {
        el.push(ITUNES.text_element("name", name));
      }
      el.push(ITUNES.text_element("email", &owner.email));
      channel.push(el);
    }
    channel.push(ITUNES.text_element("author", &self.author));
    for category in &self.categories {
      if is_publishable_category(category) {
        channel.push(ITUNES.empty_element("category", &[("text", category)]));
      }
    }
    let explicit = if self.explicit { "yes" } else { "no" };
    channel.push(ITUNES.text_element("explicit", explicit));
    if let Some(language) = &self.language {
      channel.push(Element::text_element("language", language));
    }
    for item in items {
      channel.push(item.to_xml()?);
    }

    Ok(
      Element::new("rss")
        .with_attribute("version", "2.0")
        .with_child(channel),
    )
  }

  fn from_xml(el: &Element) -> Result<Self> {
    let items = el
      .all_elements("channel/item")
      .into_iter()
      .map(Episode::from_xml)
      .collect::<Result<Vec<_>>>()?;
    if items.is_empty() {
      return Err(Error::ItemsRequired);
    }

    Ok(Self {
      items:       Resource::plain(items),
      link:        parse_url("channel/link", &el.required_text("channel/link")?)?,
      title:       el.required_text("channel/title")?,
      image:       Resource::plain(Self::parse_image(el)?),
      description: el.required_text("channel/description")?,
      owner:       Self::parse_owner(el)?,
      author:      el.required_text("channel/itunes:author")?,
      categories:  Self::parse_categories(el),
      explicit:    el.optional_text("channel/itunes:explicit").as_deref()
        == Some("yes"),
      language:    Some(
        el.optional_text("channel/language")
          .filter(|l| !l.is_empty())
          .unwrap_or_else(|| "en".to_string()),
      ),
    })
  }

  /// Fold a freshly fetched snapshot into this one. Episodes are matched by
  /// identity, updated in place, new ones appended; nothing is ever removed.
  fn merge(&mut self, other: Self) -> Result<bool> {
    let mut changed = merge_field(&mut self.link, other.link);
    changed |= merge_field(&mut self.title, other.title);
    changed |= merge_field(&mut self.description, other.description);
    changed |= merge_field(&mut self.owner, other.owner);
    changed |= merge_field(&mut self.author, other.author);
    changed |= merge_field(&mut self.explicit, other.explicit);
    changed |= merge_field(&mut self.language, other.language);

    if self.image.value() != other.image.value() {
      self.image = other.image;
      changed = true;
    }

    let categories_differ = {
      let mine: HashSet<&str> =
        self.categories.iter().map(String::as_str).collect();
      let theirs: HashSet<&str> =
        other.categories.iter().map(String::as_str).collect();
      mine != theirs
    };
    if categories_differ {
      self.categories = other.categories;
      changed = true;
    }

    if self.merge_items(other.items)? {
      changed = true;
    }
    Ok(changed)
  }
}
