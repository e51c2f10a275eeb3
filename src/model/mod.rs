//! Uniform data model produced by every parser.
//!
//! Entities look the same regardless of the site they came from. Each one
//! carries a stable `id` derived from its source and relative url, see
//! [`crate::identity`].

mod favicon;

pub use favicon::{Favicon, FaviconSet};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Rating value used when a source does not expose one.
pub const RATING_UNKNOWN: f32 = -1.0;

/// A content origin the framework can fetch from.
///
/// The stable name is part of every generated id, so it must never change
/// for an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "COMICK_FUN")]
    ComickFun,
    #[serde(rename = "MANGACHAN")]
    MangaChan,
    #[serde(rename = "HENTAICHAN")]
    HentaiChan,
    #[serde(rename = "YAOICHAN")]
    YaoiChan,
}

impl Source {
    /// Every known source, in declaration order.
    pub const ALL: &'static [Source] = &[
        Source::ComickFun,
        Source::MangaChan,
        Source::HentaiChan,
        Source::YaoiChan,
    ];

    /// Stable identifier, used for ids and config storage.
    pub fn name(self) -> &'static str {
        match self {
            Source::ComickFun => "COMICK_FUN",
            Source::MangaChan => "MANGACHAN",
            Source::HentaiChan => "HENTAICHAN",
            Source::YaoiChan => "YAOICHAN",
        }
    }

    /// Human-readable name.
    pub fn title(self) -> &'static str {
        match self {
            Source::ComickFun => "ComicK",
            Source::MangaChan => "Манга-тян",
            Source::HentaiChan => "Хентай-тян",
            Source::YaoiChan => "Яой-тян",
        }
    }

    /// Content language, `None` for multilingual sources.
    pub fn locale(self) -> Option<&'static str> {
        match self {
            Source::ComickFun => None,
            Source::MangaChan | Source::HentaiChan | Source::YaoiChan => Some("ru"),
        }
    }

    /// Looks a source up by its stable name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Ordering of a remote listing.
///
/// Declaration order matters: the smallest order a parser supports is its
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Updated,
    Popularity,
    Rating,
    Newest,
    Alphabetical,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "updated" => Ok(SortOrder::Updated),
            "popularity" | "popular" => Ok(SortOrder::Popularity),
            "rating" => Ok(SortOrder::Rating),
            "newest" | "new" => Ok(SortOrder::Newest),
            "alphabetical" | "abc" => Ok(SortOrder::Alphabetical),
            _ => Err(format!("unknown sort order: {}", s)),
        }
    }
}

/// Publication state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentState {
    Ongoing,
    Finished,
}

/// A genre or category.
///
/// Two tags are the same tag when they share `key` and `source`; the title
/// is display text and may differ in formatting between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// User-readable title, in title case.
    pub title: String,

    /// Identifier of the tag, unique within the source.
    pub key: String,

    pub source: Source,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.source.hash(state);
    }
}

/// A catalog entry (a title with chapters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub alt_title: Option<String>,

    /// Relative url, without domain.
    pub url: String,

    /// Absolute url of the item on the website.
    pub public_url: String,

    /// Normalized to `0.0..=1.0`, or [`RATING_UNKNOWN`].
    pub rating: f32,
    pub is_nsfw: bool,
    pub cover_url: String,
    pub large_cover_url: Option<String>,
    pub tags: HashSet<Tag>,
    pub state: Option<ContentState>,
    pub author: Option<String>,
    pub description: Option<String>,

    /// Filled in by `get_details`.
    pub chapters: Option<Vec<ContentChapter>>,
    pub source: Source,
}

impl ContentItem {
    /// Returns true if the rating is known.
    pub fn has_rating(&self) -> bool {
        (0.0..=1.0).contains(&self.rating)
    }
}

/// A chapter of a [`ContentItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChapter {
    pub id: i64,
    pub name: String,

    /// Chapter number (1-based).
    pub number: u32,

    /// Relative url, without domain.
    pub url: String,
    pub scanlator: Option<String>,

    /// Unix time in milliseconds, 0 if unknown.
    pub upload_date: i64,

    /// Translation branch, e.g. a language name.
    pub branch: Option<String>,
    pub source: Source,
}

/// A single page of a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPage {
    pub id: i64,

    /// Relative or absolute url; resolve with `resolve_page_url`.
    pub url: String,

    /// Referer header to send when loading the image.
    pub referer: String,
    pub preview: Option<String>,
    pub source: Source,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(title: &str, key: &str, source: Source) -> Tag {
        Tag {
            title: title.to_string(),
            key: key.to_string(),
            source,
        }
    }

    #[test]
    fn test_tag_equality_ignores_title() {
        let a = tag("Romance", "romance", Source::MangaChan);
        let b = tag("romance ", "romance", Source::MangaChan);
        assert_eq!(a, b);

        let set: HashSet<Tag> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_tag_equality_uses_key_and_source() {
        let a = tag("Romance", "romance", Source::MangaChan);
        assert_ne!(a, tag("Romance", "drama", Source::MangaChan));
        assert_ne!(a, tag("Romance", "romance", Source::YaoiChan));
    }

    #[test]
    fn test_source_names_are_unique() {
        let names: HashSet<&str> = Source::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), Source::ALL.len());
    }

    #[test]
    fn test_source_from_name() {
        assert_eq!(Source::from_name("yaoichan"), Some(Source::YaoiChan));
        assert_eq!(Source::from_name("COMICK_FUN"), Some(Source::ComickFun));
        assert_eq!(Source::from_name("nope"), None);
    }

    #[test]
    fn test_source_serde_uses_stable_name() {
        for source in Source::ALL {
            let json = serde_json::to_string(source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.name()));
        }
    }

    #[test]
    fn test_sort_order_declaration_order() {
        assert!(SortOrder::Updated < SortOrder::Popularity);
        assert!(SortOrder::Newest < SortOrder::Alphabetical);
        assert_eq!("popular".parse::<SortOrder>(), Ok(SortOrder::Popularity));
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
