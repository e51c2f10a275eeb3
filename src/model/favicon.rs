//! Favicon ranking and best-fit selection.

use scraper::{Html, Selector};
use std::cmp::Ordering;
use std::sync::LazyLock;
use url::Url;

/// Link elements that may point at an icon.
static ICON_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").unwrap());

/// `rel` values treated as icons.
const ICON_RELS: &[&str] = &[
    "icon",
    "shortcut icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
];

/// A single icon candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favicon {
    url: String,
    size: u32,
    rel: Option<String>,
    file_type: String,
}

impl Favicon {
    /// Creates a candidate. `size` is the edge length in pixels, 0 if unknown.
    pub fn new(url: impl Into<String>, size: u32, rel: Option<&str>) -> Self {
        let url = url.into();
        let file_type = file_type_of(&url);
        Self {
            url,
            size,
            rel: rel.map(str::to_string),
            file_type,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn rel(&self) -> Option<&str> {
        self.rel.as_deref()
    }

    /// Lower-cased extension of the last path segment, empty if none.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Compares by size, then by relation weight.
    pub fn cmp_rank(&self, other: &Favicon) -> Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| rel_weight(self.rel()).cmp(&rel_weight(other.rel())))
    }
}

/// apple-touch-icon images are usually better quality than plain icons.
fn rel_weight(rel: Option<&str>) -> i8 {
    match rel {
        Some("apple-touch-icon") => 1,
        Some("mask-icon") => -1,
        _ => 0,
    }
}

fn file_type_of(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let last_segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Icons discovered for one site, largest first.
#[derive(Debug, Clone)]
pub struct FaviconSet {
    icons: Vec<Favicon>,
    referer: String,
}

impl FaviconSet {
    /// Creates a set from unordered candidates.
    pub fn new(icons: impl IntoIterator<Item = Favicon>, referer: impl Into<String>) -> Self {
        let mut icons: Vec<Favicon> = icons.into_iter().collect();
        icons.sort_by(|a, b| b.cmp_rank(a));
        Self {
            icons,
            referer: referer.into(),
        }
    }

    /// Collects icon links declared in an HTML page.
    ///
    /// `/favicon.ico` is always included as a size-0 candidate.
    pub fn from_html(html: &str, page_url: &str) -> Self {
        let base = Url::parse(page_url).ok();
        let doc = Html::parse_document(html);
        let mut icons: Vec<Favicon> = Vec::new();

        for link in doc.select(&ICON_LINK_SELECTOR) {
            let Some(rel) = link.value().attr("rel") else {
                continue;
            };
            let rel = rel.trim().to_ascii_lowercase();
            if !ICON_RELS.contains(&rel.as_str()) {
                continue;
            }
            let Some(href) = link.value().attr("href").map(str::trim) else {
                continue;
            };
            let Some(url) = resolve(base.as_ref(), href) else {
                continue;
            };
            let size = link.value().attr("sizes").map(parse_sizes).unwrap_or(0);
            let rel = match rel.as_str() {
                "apple-touch-icon-precomposed" => "apple-touch-icon",
                "shortcut icon" => "icon",
                other => other,
            };
            icons.push(Favicon::new(url, size, Some(rel)));
        }

        if let Some(fallback) = resolve(base.as_ref(), "/favicon.ico")
            && !icons.iter().any(|icon| icon.url == fallback)
        {
            icons.push(Favicon::new(fallback, 0, None));
        }

        Self::new(icons, page_url)
    }

    /// Referer to send when downloading any of the icons.
    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn contains(&self, icon: &Favicon) -> bool {
        self.icons.contains(icon)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Favicon> {
        self.icons.iter()
    }

    /// Finds the smallest icon at least `size` pixels large.
    ///
    /// Falls back to the largest icon when all are smaller. `types` limits
    /// candidates to the given file types (e.g. `png`, `svg`, `ico`).
    pub fn find(&self, size: u32, types: Option<&[&str]>) -> Option<&Favicon> {
        let mut result: Option<&Favicon> = None;
        for icon in &self.icons {
            if let Some(types) = types
                && !types.contains(&icon.file_type())
            {
                continue;
            }
            if result.is_none() || icon.size >= size {
                result = Some(icon);
            } else {
                break;
            }
        }
        result
    }
}

impl<'a> IntoIterator for &'a FaviconSet {
    type Item = &'a Favicon;
    type IntoIter = std::slice::Iter<'a, Favicon>;

    fn into_iter(self) -> Self::IntoIter {
        self.icons.iter()
    }
}

/// Largest edge from a `sizes` attribute like `16x16 32x32`; `any` is 0.
fn parse_sizes(sizes: &str) -> u32 {
    sizes
        .split_whitespace()
        .filter_map(|entry| {
            let (w, h) = entry.to_ascii_lowercase().split_once('x').map(|(w, h)| {
                (w.parse::<u32>().ok(), h.parse::<u32>().ok())
            })?;
            Some(w?.max(h?))
        })
        .max()
        .unwrap_or(0)
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}
