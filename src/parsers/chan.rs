//! Parser for the "-chan" family of sites (manga-chan, hentaichan, yaoi-chan).
//!
//! The sites share one DataLife Engine layout; yaoi-chan lays out its
//! chapter list differently.

use super::{AuthProvider, ContentParser, ParserCore, map_chapters};
use crate::error::ParserError;
use crate::model::{ContentChapter, ContentItem, ContentPage, RATING_UNKNOWN, SortOrder, Source, Tag};
use crate::source_config::{ConfigRegistry, DomainKey};
use crate::transport::LoaderContext;
use crate::utils::{
    attr_as_relative_url, attr_or_none, parse_date_millis, select_first_or_fail, text_of,
    to_absolute_url, to_relative_url, to_title_case, url_encoded,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Image array embedded in the reader page script.
static FULL_IMAGES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""fullimg"\s*:\s*\[([^\]]*)\]"#).unwrap());

/// Cookie set by the site for logged-in users.
const AUTH_COOKIE: &str = "dle_user_id";

/// How a site renders its chapter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChapterLayout {
    /// One `<tr>` per chapter after two header rows, with upload dates.
    Rows,
    /// `div.manga` blocks inside the table, without dates.
    Blocks,
}

/// CSS selectors used for parsing.
struct Selectors {
    list_root: Selector,
    row: Selector,
    row_link: Selector,
    row_author: Selector,
    row_cover: Selector,
    row_genre: Selector,
    chapter_row: Selector,
    chapter_block: Selector,
    link: Selector,
    date: Selector,
    script: Selector,
    side_list: Selector,
    side_tag: Selector,
    user_link: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            list_root: Selector::parse("div.main_fon #content").unwrap(),
            row: Selector::parse("div.content_row").unwrap(),
            row_link: Selector::parse("div.manga_row1 h2 a").unwrap(),
            row_author: Selector::parse(r#"a[href^="/mangaka"]"#).unwrap(),
            row_cover: Selector::parse("div.manga_images img").unwrap(),
            row_genre: Selector::parse("div.genre a").unwrap(),
            chapter_row: Selector::parse("table.table_cha tr").unwrap(),
            chapter_block: Selector::parse("table.table_cha div.manga").unwrap(),
            link: Selector::parse("a").unwrap(),
            date: Selector::parse("div.date").unwrap(),
            script: Selector::parse("script").unwrap(),
            side_list: Selector::parse("div.main_fon #side ul").unwrap(),
            side_tag: Selector::parse("li.sidetag").unwrap(),
            user_link: Selector::parse(r#"a[href*="/user/"]"#).unwrap(),
        }
    }
}

/// Sites served by [`ChanParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanSite {
    MangaChan,
    HentaiChan,
    YaoiChan,
}

impl ChanSite {
    pub fn source(self) -> Source {
        match self {
            ChanSite::MangaChan => Source::MangaChan,
            ChanSite::HentaiChan => Source::HentaiChan,
            ChanSite::YaoiChan => Source::YaoiChan,
        }
    }
}

/// Parser for DataLife Engine manga sites.
pub struct ChanParser {
    core: ParserCore,
    layout: ChapterLayout,
    nsfw: bool,
    selectors: Selectors,
}

impl ChanParser {
    pub fn new(site: ChanSite, context: Arc<dyn LoaderContext>, configs: &ConfigRegistry) -> Self {
        let (domain_key, layout) = match site {
            ChanSite::MangaChan => (DomainKey::new("manga-chan.me"), ChapterLayout::Rows),
            ChanSite::HentaiChan => (
                DomainKey::with_presets("hentaichan.live", &["y.hentaichan.live", "hentaichan.pro"]),
                ChapterLayout::Rows,
            ),
            ChanSite::YaoiChan => (DomainKey::new("yaoi-chan.me"), ChapterLayout::Blocks),
        };

        Self {
            core: ParserCore::new(site.source(), context, configs, domain_key),
            layout,
            nsfw: site == ChanSite::HentaiChan,
            selectors: Selectors::new(),
        }
    }

    fn fail(&self, message: &str, url: &str) -> ParserError {
        self.core.parse_failed(message).at(url)
    }

    fn list_url(
        &self,
        domain: &str,
        offset: usize,
        tags: Option<&HashSet<Tag>>,
        sort_order: SortOrder,
    ) -> String {
        match tags.filter(|t| !t.is_empty()) {
            Some(tags) => {
                let mut keys: Vec<&str> = tags.iter().map(|t| t.key.as_str()).collect();
                keys.sort_unstable();
                format!(
                    "https://{}/tags/{}&n={}?offset={}",
                    domain,
                    keys.join("+"),
                    tag_sort_key(sort_order),
                    offset
                )
            }
            None => format!("https://{}/{}?offset={}", domain, sort_key(sort_order), offset),
        }
    }

    fn parse_list(&self, html: &str, url: &str, domain: &str) -> Result<Vec<ContentItem>, ParserError> {
        let doc = Html::parse_document(html);
        let root = doc
            .select(&self.selectors.list_root)
            .next()
            .ok_or_else(|| self.fail("Cannot find root", url))?;

        let mut items = Vec::new();
        for row in root.select(&self.selectors.row) {
            let Some(a) = row.select(&self.selectors.row_link).next() else {
                continue;
            };
            let href = attr_as_relative_url(a, "href", domain).map_err(|e| e.at(url))?;

            let tags: HashSet<Tag> = row
                .select(&self.selectors.row_genre)
                .filter_map(|g| {
                    let href = attr_or_none(g, "href")?;
                    Some(Tag {
                        title: to_tag_name(&text_of(g)),
                        key: url_encoded(last_segment(href)),
                        source: self.core.source(),
                    })
                })
                .collect();

            items.push(ContentItem {
                id: self.core.generate_uid(&href),
                title: title_from_link(&text_of(a)),
                alt_title: attr_or_none(a, "title").map(str::to_string),
                public_url: to_absolute_url(&href, domain),
                cover_url: row
                    .select(&self.selectors.row_cover)
                    .next()
                    .and_then(|img| attr_or_none(img, "src"))
                    .map(|src| to_absolute_url(src, domain))
                    .unwrap_or_default(),
                url: href,
                rating: RATING_UNKNOWN,
                is_nsfw: self.nsfw,
                large_cover_url: None,
                tags,
                state: None,
                author: row.select(&self.selectors.row_author).next().map(text_of),
                description: None,
                chapters: None,
                source: self.core.source(),
            });
        }

        Ok(items)
    }

    fn parse_details(&self, html: &str, url: &str, item: &ContentItem) -> Result<ContentItem, ParserError> {
        let doc = Html::parse_document(html);
        let root = select_first_or_fail(doc.root_element(), "#dle-content").map_err(|e| e.at(url))?;
        let domain = self.core.domain();

        let description = select_first_or_fail(root, "#description").ok().map(|d| {
            let inner = d.inner_html();
            let cut = inner.rfind("<div").map(|pos| &inner[..pos]).unwrap_or(&inner);
            cut.trim().to_string()
        });
        let large_cover_url = select_first_or_fail(root, "#cover")
            .ok()
            .and_then(|img| attr_or_none(img, "src"))
            .map(|src| to_absolute_url(src, &domain));

        let chapters = match self.layout {
            ChapterLayout::Rows => self.parse_chapter_rows(root, &domain),
            ChapterLayout::Blocks => self.parse_chapter_blocks(root, &domain).map_err(|e| e.at(url))?,
        };

        Ok(ContentItem {
            description,
            large_cover_url,
            chapters: Some(chapters),
            ..item.clone()
        })
    }

    fn parse_chapter_rows(&self, root: ElementRef<'_>, domain: &str) -> Vec<ContentChapter> {
        let mut rows: Vec<ElementRef<'_>> = root.select(&self.selectors.chapter_row).skip(2).collect();
        rows.reverse();

        map_chapters(rows, |number, tr| {
            let a = tr.select(&self.selectors.link).next()?;
            let href = attr_as_relative_url(a, "href", domain).ok()?;
            let upload_date = tr
                .select(&self.selectors.date)
                .next()
                .map(|d| parse_date_millis(&text_of(d)))
                .unwrap_or(0);
            Some(ContentChapter {
                id: self.core.generate_uid(&href),
                name: text_of(a),
                number,
                url: href,
                scanlator: None,
                upload_date,
                branch: None,
                source: self.core.source(),
            })
        })
    }

    fn parse_chapter_blocks(
        &self,
        root: ElementRef<'_>,
        domain: &str,
    ) -> Result<Vec<ContentChapter>, ParserError> {
        let mut links = Vec::new();
        for block in root.select(&self.selectors.chapter_block) {
            if let Some(a) = block.select(&self.selectors.link).next() {
                links.push((attr_as_relative_url(a, "href", domain)?, text_of(a)));
            }
        }
        links.reverse();

        Ok(map_chapters(links, |number, (href, name)| {
            Some(ContentChapter {
                id: self.core.generate_uid(&href),
                name,
                number,
                url: href,
                scanlator: None,
                upload_date: 0,
                branch: None,
                source: self.core.source(),
            })
        }))
    }

    fn parse_pages(&self, html: &str, chapter_url: &str) -> Result<Vec<ContentPage>, ParserError> {
        let doc = Html::parse_document(html);
        let domain = self.core.domain();

        for script in doc.select(&self.selectors.script) {
            let data = script.inner_html();
            let Some(list) = extract_full_images(&data) else {
                continue;
            };
            return Ok(list
                .split(',')
                .map(|entry| {
                    let entry = entry.trim().trim_matches(|c| c == '"' || c == '\'');
                    to_relative_url(entry, &domain)
                })
                .filter(|url| !url.trim().is_empty())
                .map(|url| ContentPage {
                    id: self.core.generate_uid(&url),
                    url,
                    referer: chapter_url.to_string(),
                    preview: None,
                    source: self.core.source(),
                })
                .collect());
        }

        Err(self.fail("Pages list not found", chapter_url))
    }

    fn parse_tags(&self, html: &str, url: &str) -> Result<HashSet<Tag>, ParserError> {
        let doc = Html::parse_document(html);
        let root = doc
            .select(&self.selectors.side_list)
            .last()
            .ok_or_else(|| self.fail("Cannot find root", url))?;

        let mut tags = HashSet::new();
        for li in root.select(&self.selectors.side_tag) {
            let a = li
                .children()
                .filter_map(ElementRef::wrap)
                .last()
                .ok_or_else(|| self.fail("Tag link is missing", url))?;
            let href = a.value().attr("href").unwrap_or_default();
            tags.insert(Tag {
                title: to_tag_name(&text_of(a)),
                key: last_segment(href).to_string(),
                source: self.core.source(),
            });
        }
        Ok(tags)
    }

    fn parse_username(&self, html: &str, url: &str) -> Result<String, ParserError> {
        let doc = Html::parse_document(html);
        let root = select_first_or_fail(doc.root_element(), "#top_user").map_err(|e| e.at(url))?;
        let a = root
            .select(&self.selectors.user_link)
            .next()
            .ok_or(ParserError::AuthRequired(self.core.source()))?;
        let href = a.value().attr("href").unwrap_or_default();
        Ok(last_segment(href.trim_end_matches('/')).to_string())
    }
}

#[async_trait]
impl ContentParser for ChanParser {
    fn core(&self) -> &ParserCore {
        &self.core
    }

    fn sort_orders(&self) -> &[SortOrder] {
        &[SortOrder::Popularity, SortOrder::Newest, SortOrder::Alphabetical]
    }

    async fn list_items(
        &self,
        offset: usize,
        query: Option<&str>,
        tags: Option<&HashSet<Tag>>,
        sort_order: SortOrder,
    ) -> Result<Vec<ContentItem>, ParserError> {
        let domain = self.core.domain();
        let url = match query.filter(|q| !q.is_empty()) {
            // Search results come on a single page.
            Some(_) if offset != 0 => return Ok(Vec::new()),
            Some(query) => format!(
                "https://{}/?do=search&subaction=search&story={}",
                domain,
                url_encoded(query)
            ),
            None => self.list_url(&domain, offset, tags, sort_order),
        };

        let html = self.core.context().http_get(&url, &HeaderMap::new()).await?;
        self.parse_list(&html, &url, &domain)
    }

    async fn get_details(&self, item: &ContentItem) -> Result<ContentItem, ParserError> {
        let url = self.core.absolute_url(&item.url, None);
        let html = self.core.context().http_get(&url, &HeaderMap::new()).await?;
        self.parse_details(&html, &url, item)
    }

    async fn get_chapter_pages(
        &self,
        chapter: &ContentChapter,
    ) -> Result<Vec<ContentPage>, ParserError> {
        let url = self.core.absolute_url(&chapter.url, None);
        let html = self.core.context().http_get(&url, &HeaderMap::new()).await?;
        self.parse_pages(&html, &url)
    }

    async fn list_tags(&self) -> Result<HashSet<Tag>, ParserError> {
        let url = format!("https://{}/mostfavorites&sort=manga", self.core.domain());
        let html = self.core.context().http_get(&url, &HeaderMap::new()).await?;
        self.parse_tags(&html, &url)
    }

    fn auth_provider(&self) -> Option<&dyn AuthProvider> {
        Some(self)
    }
}

#[async_trait]
impl AuthProvider for ChanParser {
    fn auth_url(&self) -> String {
        format!("https://{}", self.core.domain())
    }

    fn is_authorized(&self) -> bool {
        let url = format!("https://{}/", self.core.domain());
        self.core
            .context()
            .cookie_header(&url)
            .is_some_and(|header| {
                header
                    .split(';')
                    .any(|c| c.trim().starts_with(&format!("{}=", AUTH_COOKIE)))
            })
    }

    async fn username(&self) -> Result<String, ParserError> {
        let url = format!("https://{}", self.core.domain());
        let html = self.core.context().http_get(&url, &HeaderMap::new()).await?;
        self.parse_username(&html, &url)
    }
}

fn sort_key(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Alphabetical => "catalog",
        SortOrder::Newest => "manga/new",
        _ => "mostfavorites",
    }
}

fn tag_sort_key(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Alphabetical => "abcasc",
        SortOrder::Newest => "datedesc",
        _ => "favdesc",
    }
}

/// Link text looks like `Русское название (Original title)`.
fn title_from_link(text: &str) -> String {
    let after = text.rsplit_once('(').map(|(_, rest)| rest).unwrap_or(text);
    let inner = after.rsplit_once(')').map(|(head, _)| head).unwrap_or(after);
    inner.trim().to_string()
}

fn to_tag_name(text: &str) -> String {
    to_title_case(&text.replace('_', " "))
}

fn last_segment(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

/// Comma separated image list from the reader script's `"fullimg"` array.
fn extract_full_images(script: &str) -> Option<&str> {
    FULL_IMAGES_REGEX
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
