//! A single `<item>` of a podcast channel.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
  RssEntity, merge_field,
  enclosure::Enclosure,
  error::{Error, Result},
  namespace::ITUNES,
  parse_url,
  resource::Resource,
  xml::Element,
};

/// `pubDate` layout (RFC 822 with a four-digit year).
const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

#[derive(Debug)]
pub struct Episode {
  pub enclosure:   Resource<Enclosure>,
  pub title:       String,
  pub description: Option<String>,
  /// `None` when the source never said either way.
  pub explicit:    Option<bool>,
  pub guid:        Option<String>,
  pub duration:    Option<Duration>,
  pub pub_date:    Option<DateTime<FixedOffset>>,
  pub link:        Option<Url>,
  pub image:       Option<Resource<Url>>,
}

impl Episode {
  pub fn new(enclosure: impl Into<Resource<Enclosure>>, title: &str) -> Self {
    Self {
      enclosure:   enclosure.into(),
      title:       title.to_string(),
      description: None,
      explicit:    Some(false),
      guid:        None,
      duration:    None,
      pub_date:    None,
      link:        None,
      image:       None,
    }
  }

  /// The key episodes are matched by across two snapshots of a feed: the
  /// guid, or the enclosure URL when there is none.
  pub fn identity(&self) -> Result<&str> {
    match &self.guid {
      Some(guid) => Ok(guid),
      None => Ok(self.enclosure.require("enclosure")?.url.as_str()),
    }
  }

  /// Resolve the enclosure and artwork so the episode can be merged and
  /// serialized.
  pub async fn materialize(&self, cancel: &CancellationToken) -> Result<()> {
    self.enclosure.ensure("enclosure", cancel).await?;
    if let Some(image) = &self.image {
      image.ensure("episode image", cancel).await?;
    }
    Ok(())
  }
}

// ─── Field codecs ────────────────────────────────────────────────────────────

/// `itunes:duration` is either whole seconds or `[H:]M:S`.
pub(crate) fn parse_duration(raw: &str) -> Option<Duration> {
  let secs = if raw.contains(':') {
    raw.split(':').try_fold(0u64, |acc, part| {
      let n = part.trim().parse::<u64>().ok()?;
      acc.checked_mul(60)?.checked_add(n)
    })
  } else {
    raw.parse::<u64>().ok()
  };
  if secs.is_none() {
    tracing::warn!(duration = raw, "invalid duration");
  }
  secs.map(Duration::from_secs)
}

/// Whole seconds, rounded up.
pub(crate) fn format_duration(duration: Duration) -> String {
  let extra = u64::from(duration.subsec_nanos() > 0);
  (duration.as_secs() + extra).to_string()
}

/// RFC 822 first, then ISO 8601. Values without an offset are taken as UTC.
pub(crate) fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
  if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
    return Some(dt);
  }

  let iso = match raw.strip_suffix('Z') {
    Some(head) => format!("{head}+00:00"),
    None => raw.to_string(),
  };
  if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
    return Some(dt);
  }
  if let Ok(dt) = DateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f%:z") {
    return Some(dt);
  }
  for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
  {
    if let Ok(naive) = NaiveDateTime::parse_from_str(&iso, layout) {
      return Some(naive.and_utc().fixed_offset());
    }
  }
  if let Some(midnight) = NaiveDate::parse_from_str(&iso, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
  {
    return Some(midnight.and_utc().fixed_offset());
  }

  tracing::warn!(pub_date = raw, "invalid pubDate");
  None
}

pub(crate) fn format_pub_date(dt: &DateTime<FixedOffset>) -> String {
  dt.format(PUB_DATE_FORMAT).to_string()
}

/// Optional links are dropped, not fatal, when they do not parse.
fn lenient_url(field: &str, raw: &str) -> Option<Url> {
  match parse_url(field, raw) {
    Ok(url) => Some(url),
    Err(_) => {
      tracing::warn!(field, url = raw, "invalid url");
      None
    }
  }
}

fn yes_no(flag: bool) -> &'static str { if flag { "yes" } else { "no" } }

// ─── Entity ──────────────────────────────────────────────────────────────────

impl RssEntity for Episode {
  fn to_xml(&self) -> Result<Element> {
    let mut el = Element::new("item");
    el.push(self.enclosure.require("enclosure")?.to_xml()?);
    el.push(Element::text_element("title", &self.title));
    el.push(ITUNES.text_element("title", &self.title));
    if let Some(description) = &self.description {
      el.push(Element::text_element("description", description));
      el.push(ITUNES.text_element("summary", description));
    }
    if let Some(explicit) = self.explicit {
      el.push(ITUNES.text_element("explicit", yes_no(explicit)));
    }
    if let Some(guid) = &self.guid {
      let perma_link = if guid.starts_with("http") { "true" } else { "false" };
      el.push(
        Element::text_element("guid", guid)
          .with_attribute("isPermaLink", perma_link),
      );
    }
    if let Some(duration) = self.duration {
      el.push(ITUNES.text_element("duration", &format_duration(duration)));
    }
    if let Some(pub_date) = &self.pub_date {
      el.push(Element::text_element("pubDate", &format_pub_date(pub_date)));
    }
    if let Some(link) = &self.link {
      el.push(Element::text_element("link", link.as_str()));
    }
    if let Some(image) = &self.image {
      let href = image.require("episode image")?;
      el.push(ITUNES.empty_element("image", &[("href", href.as_str())]));
    }
    Ok(el)
  }

  fn from_xml(el: &Element) -> Result<Self> {
    let enclosure = el
      .optional_element("enclosure")
      .ok_or(Error::EnclosureRequired)
      .and_then(Enclosure::from_xml)?;

    let title = match el.optional_text("itunes:title") {
      Some(title) => title,
      None => el.required_text("title")?,
    };
    let description = el
      .optional_text("description")
      .or_else(|| el.optional_text("itunes:summary"));
    let explicit = el.optional_text("itunes:explicit").map(|s| s == "yes");
    let guid = el.optional_text("guid");
    let duration = el
      .optional_text("itunes:duration")
      .and_then(|raw| parse_duration(&raw));
    let pub_date = el
      .optional_text("pubDate")
      .and_then(|raw| parse_pub_date(&raw));
    let link = el
      .optional_text("link")
      .and_then(|raw| lenient_url("item/link", &raw));
    let image = el
      .optional_attribute("itunes:image", "href")
      .and_then(|raw| lenient_url("item/itunes:image/@href", &raw))
      .map(Resource::plain);

    Ok(Self {
      enclosure: Resource::plain(enclosure),
      title,
      description,
      explicit,
      guid,
      duration,
      pub_date,
      link,
      image,
    })
  }

  /// Only meaningful between two episodes already matched by
  /// [`identity`](Episode::identity).
  fn merge(&mut self, other: Self) -> Result<bool> {
    let mut changed = false;

    let theirs = other
      .enclosure
      .into_value()
      .ok_or(Error::ResourceUnavailable("enclosure"))?;
    let mut mine = self.enclosure.require("enclosure")?.clone();
    if mine.merge(theirs)? {
      self.enclosure = Resource::plain(mine);
      changed = true;
    }

    changed |= merge_field(&mut self.title, other.title);
    changed |= merge_field(&mut self.description, other.description);
    changed |= merge_field(&mut self.explicit, other.explicit);
    changed |= merge_field(&mut self.guid, other.guid);
    changed |= merge_field(&mut self.duration, other.duration);
    changed |= merge_field(&mut self.pub_date, other.pub_date);
    Ok(changed)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
