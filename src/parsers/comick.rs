//! ComicK adapter, backed by the site's public JSON API.

use super::{ContentParser, ParserCore};
use crate::error::ParserError;
use crate::model::{
    ContentChapter, ContentItem, ContentPage, ContentState, RATING_UNKNOWN, SortOrder, Source, Tag,
};
use crate::paginator::Paginator;
use crate::source_config::{ConfigRegistry, DomainKey};
use crate::transport::LoaderContext;
use crate::utils::{parse_date_millis, url_encoded};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

const PAGE_SIZE: usize = 20;
const CHAPTERS_LIMIT: u32 = 99999;

#[derive(Debug, Deserialize)]
struct SearchEntry {
    slug: String,
    title: String,
    #[serde(default)]
    rating: Option<Rating>,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    genres: Vec<i64>,
    #[serde(default)]
    translation_completed: Option<bool>,
}

/// Reads an array that the API sends as `null` when empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The API sends ratings either as numbers or as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Rating {
    Number(f64),
    Text(String),
}

impl Rating {
    /// Rating scaled to 0..=1 from the site's 0..=10.
    fn normalized(&self) -> Option<f32> {
        let value = match self {
            Rating::Number(n) => *n,
            Rating::Text(s) => s.trim().parse().ok()?,
        };
        Some((value as f32 / 10.0).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Deserialize)]
struct ComicResponse {
    comic: Comic,
    #[serde(default, rename = "matureContent")]
    mature_content: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    genres: Vec<Genre>,
    #[serde(default, deserialize_with = "null_as_empty")]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct Comic {
    id: i64,
    title: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    parsed: Option<String>,
    #[serde(default)]
    hentai: bool,
}

#[derive(Debug, Deserialize)]
struct Genre {
    #[serde(default)]
    id: Option<i64>,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChaptersResponse {
    chapters: Vec<ChapterEntry>,
}

#[derive(Debug, Deserialize)]
struct ChapterEntry {
    id: i64,
    hid: String,
    lang: String,
    #[serde(default)]
    vol: Option<String>,
    #[serde(default)]
    chap: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    group_name: Option<Vec<Option<String>>>,
    #[serde(default)]
    created_at: Option<String>,
}

impl ChapterEntry {
    fn display_name(&self) -> String {
        let mut name = String::new();
        if let Some(vol) = self.vol.as_deref().filter(|v| !v.is_empty()) {
            name.push_str(&format!("Vol {} ", vol));
        }
        if let Some(chap) = self.chap.as_deref().filter(|c| !c.is_empty()) {
            name.push_str(&format!("Chap {}", chap));
        }
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            name.push_str(&format!(": {}", title));
        }
        name.trim().to_string()
    }

    fn scanlator(&self) -> Option<String> {
        self.group_name
            .as_ref()?
            .first()?
            .as_deref()
            .filter(|g| !g.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct ChapterResponse {
    chapter: ChapterImages,
}

#[derive(Debug, Deserialize)]
struct ChapterImages {
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

/// Parser for comick.fun.
pub struct ComickParser {
    core: ParserCore,
    paginator: Mutex<Paginator>,
    /// Genre id -> tag, loaded once on first use.
    tags: OnceCell<HashMap<i64, Tag>>,
}

impl ComickParser {
    pub fn new(context: Arc<dyn LoaderContext>, configs: &ConfigRegistry) -> Self {
        Self {
            core: ParserCore::new(
                Source::ComickFun,
                context,
                configs,
                DomainKey::new("comick.fun"),
            ),
            paginator: Mutex::new(Paginator::new(PAGE_SIZE)),
            tags: OnceCell::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("https://api.{}{}", self.core.domain(), path)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, ParserError> {
        let body = self.core.context().http_get(url, &HeaderMap::new()).await?;
        serde_json::from_str(&body)
            .map_err(|e| self.core.parse_failed(format!("Unexpected response: {}", e)).at(url))
    }

    fn page_for(&self, offset: usize) -> u32 {
        match self.paginator.lock() {
            Ok(paginator) => paginator.page_for(offset),
            Err(poisoned) => poisoned.into_inner().page_for(offset),
        }
    }

    fn record_page(&self, offset: usize, page: u32, count: usize) {
        match self.paginator.lock() {
            Ok(mut paginator) => paginator.record_page(offset, page, count),
            Err(poisoned) => poisoned.into_inner().record_page(offset, page, count),
        }
    }

    async fn genre_map(&self) -> Result<&HashMap<i64, Tag>, ParserError> {
        self.tags
            .get_or_try_init(|| async {
                let url = self.api_url("/genre");
                let genres: Vec<Genre> = self.fetch(&url).await?;
                tracing::debug!("Loaded {} genres from {}", genres.len(), url);
                Ok::<_, ParserError>(genres
                    .into_iter()
                    .filter_map(|g| {
                        let id = g.id?;
                        Some((id, self.tag(g)))
                    })
                    .collect())
            })
            .await
    }

    fn tag(&self, genre: Genre) -> Tag {
        Tag {
            title: genre.name,
            key: genre.slug,
            source: Source::ComickFun,
        }
    }

    fn to_item(&self, entry: SearchEntry, domain: &str, genres: &HashMap<i64, Tag>) -> ContentItem {
        ContentItem {
            id: self.core.generate_uid(&entry.slug),
            title: entry.title,
            alt_title: None,
            public_url: format!("https://{}/comic/{}", domain, entry.slug),
            rating: entry
                .rating
                .as_ref()
                .and_then(Rating::normalized)
                .unwrap_or(RATING_UNKNOWN),
            is_nsfw: false,
            cover_url: entry.cover_url.unwrap_or_default(),
            large_cover_url: None,
            tags: entry
                .genres
                .iter()
                .filter_map(|id| genres.get(id).cloned())
                .collect(),
            state: entry.translation_completed.map(|done| {
                if done {
                    ContentState::Finished
                } else {
                    ContentState::Ongoing
                }
            }),
            author: None,
            description: entry.desc,
            chapters: None,
            url: entry.slug,
            source: Source::ComickFun,
        }
    }

    async fn get_chapters(&self, comic_id: i64) -> Result<Vec<ContentChapter>, ParserError> {
        let url = self.api_url(&format!(
            "/comic/{}/chapter?tachiyomi=true&limit={}",
            comic_id, CHAPTERS_LIMIT
        ));
        let response: ChaptersResponse = self.fetch(&url).await?;
        Ok(self.map_chapters(response.chapters))
    }

    /// Builds chapters oldest first, numbered separately per language.
    fn map_chapters(&self, entries: Vec<ChapterEntry>) -> Vec<ContentChapter> {
        let mut counters: HashMap<String, u32> = HashMap::new();
        let mut seen = HashSet::new();
        let mut chapters = Vec::with_capacity(entries.len());

        for entry in entries.into_iter().rev() {
            let id = self.core.generate_uid_from_id(entry.id);
            if !seen.insert(id) {
                continue;
            }
            let lang = entry.lang.to_lowercase();
            let number = counters.entry(lang.clone()).or_insert(0);
            *number += 1;

            chapters.push(ContentChapter {
                id,
                name: entry.display_name(),
                number: *number,
                scanlator: entry.scanlator(),
                upload_date: entry
                    .created_at
                    .as_deref()
                    .map(|d| parse_date_millis(d.split('T').next().unwrap_or(d)))
                    .unwrap_or(0),
                branch: Some(language_name(&lang)),
                url: entry.hid,
                source: Source::ComickFun,
            });
        }
        chapters
    }
}

#[async_trait]
impl ContentParser for ComickParser {
    fn core(&self) -> &ParserCore {
        &self.core
    }

    fn sort_orders(&self) -> &[SortOrder] {
        &[SortOrder::Popularity, SortOrder::Updated, SortOrder::Rating]
    }

    async fn list_items(
        &self,
        offset: usize,
        query: Option<&str>,
        tags: Option<&HashSet<Tag>>,
        sort_order: SortOrder,
    ) -> Result<Vec<ContentItem>, ParserError> {
        let domain = self.core.domain();
        let mut url = format!("https://api.{}/search?tachiyomi=true", domain);
        let mut page = None;

        match query.filter(|q| !q.is_empty()) {
            // Search results come on a single page.
            Some(_) if offset > 0 => return Ok(Vec::new()),
            Some(query) => {
                url.push_str("&q=");
                url.push_str(&url_encoded(query));
            }
            None => {
                let number = self.page_for(offset);
                page = Some(number);
                url.push_str(&format!("&limit={}&page={}", PAGE_SIZE, number));
                if let Some(tags) = tags {
                    let mut keys: Vec<&str> = tags.iter().map(|t| t.key.as_str()).collect();
                    keys.sort_unstable();
                    for key in keys {
                        url.push_str("&genres=");
                        url.push_str(&url_encoded(key));
                    }
                }
                url.push_str("&sort=");
                url.push_str(sort_key(sort_order));
            }
        }

        let entries: Vec<SearchEntry> = self.fetch(&url).await?;
        let genres = self.genre_map().await?;
        let items: Vec<ContentItem> = entries
            .into_iter()
            .map(|entry| self.to_item(entry, &domain, genres))
            .collect();

        if let Some(page) = page {
            self.record_page(offset, page, items.len());
        }
        Ok(items)
    }

    async fn get_details(&self, item: &ContentItem) -> Result<ContentItem, ParserError> {
        let url = self.api_url(&format!("/comic/{}?tachiyomi=true", item.url));
        let response: ComicResponse = self.fetch(&url).await?;
        let chapters = self.get_chapters(response.comic.id).await?;

        let mut tags = item.tags.clone();
        tags.extend(response.genres.into_iter().map(|g| self.tag(g)));

        let comic = response.comic;
        Ok(ContentItem {
            title: comic.title,
            alt_title: None,
            is_nsfw: response.mature_content || comic.hentai,
            description: comic.parsed.or(comic.desc),
            tags,
            author: response.artists.into_iter().next().map(|a| a.name),
            chapters: Some(chapters),
            ..item.clone()
        })
    }

    async fn get_chapter_pages(
        &self,
        chapter: &ContentChapter,
    ) -> Result<Vec<ContentPage>, ParserError> {
        let url = self.api_url(&format!("/chapter/{}?tachiyomi=true", chapter.url));
        let response: ChapterResponse = self.fetch(&url).await?;
        let referer = format!("https://{}/", self.core.domain());

        Ok(response
            .chapter
            .images
            .into_iter()
            .map(|image| ContentPage {
                id: self.core.generate_uid(&image.url),
                url: image.url,
                referer: referer.clone(),
                preview: None,
                source: Source::ComickFun,
            })
            .collect())
    }

    async fn list_tags(&self) -> Result<HashSet<Tag>, ParserError> {
        Ok(self.genre_map().await?.values().cloned().collect())
    }
}

fn sort_key(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Popularity => "view",
        SortOrder::Rating => "rating",
        _ => "uploaded",
    }
}

/// Display name of a chapter language, used as the chapter branch.
fn language_name(code: &str) -> String {
    let base = code.split(['-', '_']).next().unwrap_or(code);
    let name = match base {
        "en" => "English",
        "ru" => "Русский",
        "uk" => "Українська",
        "es" => "Español",
        "pt" => "Português",
        "fr" => "Français",
        "de" => "Deutsch",
        "it" => "Italiano",
        "pl" => "Polski",
        "tr" => "Türkçe",
        "id" => "Indonesia",
        "vi" => "Tiếng Việt",
        "th" => "ไทย",
        "ja" => "日本語",
        "ko" => "한국어",
        "zh" => "中文",
        "ar" => "العربية",
        _ => return code.to_uppercase(),
    };
    if base == "pt" && code.ends_with("br") {
        "Português (Brasil)".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContext;

    const GENRES_JSON: &str = r#"[
        {"id": 1, "name": "Action", "slug": "action"},
        {"id": 2, "name": "Romance", "slug": "romance"},
        {"name": "Orphan", "slug": "orphan"}
    ]"#;

    const SEARCH_JSON: &str = r#"[
        {"slug": "solo-leveling", "title": "Solo Leveling", "rating": "9.1",
         "cover_url": "https://meo.comick.pictures/a.jpg", "desc": "Hunters.",
         "genres": [1, 99], "translation_completed": true},
        {"slug": "blank", "title": "Blank", "rating": null, "genres": null}
    ]"#;

    const COMIC_JSON: &str = r#"{
        "comic": {"id": 77, "title": "Solo Leveling", "desc": "raw", "parsed": "<p>Hunters.</p>", "hentai": false},
        "matureContent": true,
        "genres": [{"name": "Romance", "slug": "romance"}],
        "artists": [{"name": "DUBU"}, {"name": "Other"}]
    }"#;

    const CHAPTERS_JSON: &str = r#"{"chapters": [
        {"id": 13, "hid": "h13", "lang": "ru", "chap": "2", "created_at": "2021-03-06T10:00:00Z"},
        {"id": 12, "hid": "h12", "lang": "en", "vol": "1", "chap": "2", "title": "Return", "group_name": ["Team A"], "created_at": "2021-03-05T10:00:00Z"},
        {"id": 11, "hid": "h11", "lang": "en", "vol": "1", "chap": "1", "group_name": [null], "created_at": "bad"},
        {"id": 11, "hid": "h11", "lang": "en", "chap": "1"}
    ]}"#;

    const PAGES_JSON: &str = r#"{"chapter": {"images": [
        {"url": "https://meo.comick.pictures/1.jpg"},
        {"url": "https://meo.comick.pictures/2.jpg"}
    ]}}"#;

    fn parser(context: MockContext) -> ComickParser {
        ComickParser::new(Arc::new(context), &ConfigRegistry::in_memory())
    }

    fn item(parser: &ComickParser, slug: &str) -> ContentItem {
        ContentItem {
            id: parser.core().generate_uid(slug),
            title: "Old".to_string(),
            alt_title: None,
            url: slug.to_string(),
            public_url: format!("https://comick.fun/comic/{}", slug),
            rating: RATING_UNKNOWN,
            is_nsfw: false,
            cover_url: String::new(),
            large_cover_url: None,
            tags: HashSet::new(),
            state: None,
            author: None,
            description: None,
            chapters: None,
            source: Source::ComickFun,
        }
    }

    fn page_url(page: u32, sort: &str) -> String {
        format!(
            "https://api.comick.fun/search?tachiyomi=true&limit=20&page={}&sort={}",
            page, sort
        )
    }

    #[tokio::test]
    async fn test_list_items() {
        let parser = parser(
            MockContext::new()
                .with_page("https://api.comick.fun/genre", GENRES_JSON)
                .with_page(&page_url(1, "view"), SEARCH_JSON),
        );
        assert_eq!(parser.default_sort_order(), SortOrder::Updated);

        let items = parser
            .list_items(0, None, None, SortOrder::Popularity)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let solo = &items[0];
        assert_eq!(solo.url, "solo-leveling");
        assert_eq!(solo.id, parser.core().generate_uid("solo-leveling"));
        assert_eq!(solo.public_url, "https://comick.fun/comic/solo-leveling");
        assert!((solo.rating - 0.91).abs() < 1e-6);
        assert_eq!(solo.state, Some(ContentState::Finished));
        assert_eq!(solo.description.as_deref(), Some("Hunters."));
        assert_eq!(solo.tags.len(), 1);
        assert!(solo.tags.iter().any(|t| t.key == "action"));

        let blank = &items[1];
        assert_eq!(blank.rating, RATING_UNKNOWN);
        assert!(!blank.has_rating());
        assert_eq!(blank.state, None);
        assert!(blank.tags.is_empty());
    }

    #[tokio::test]
    async fn test_list_learns_pages() {
        let parser = parser(
            MockContext::new()
                .with_page("https://api.comick.fun/genre", GENRES_JSON)
                .with_page(&page_url(1, "uploaded"), SEARCH_JSON)
                .with_page(&page_url(2, "uploaded"), "[]"),
        );

        // Page 1 held two items, so offset 2 continues on page 2.
        let first = parser.list_by_query(0, None).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = parser.list_by_query(2, None).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(parser.page_for(2), 2);

        assert_eq!(parser.list_tags().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_urls() {
        let context = Arc::new(
            MockContext::new()
                .with_page("https://api.comick.fun/genre", GENRES_JSON)
                .with_page(
                    "https://api.comick.fun/search?tachiyomi=true&limit=20&page=1&genres=action&genres=romance&sort=rating",
                    "[]",
                )
                .with_page("https://api.comick.fun/search?tachiyomi=true&q=solo+leveling", "[]"),
        );
        let parser = ComickParser::new(context.clone(), &ConfigRegistry::in_memory());

        let tags: HashSet<Tag> = ["romance", "action"]
            .into_iter()
            .map(|key| Tag {
                title: key.to_string(),
                key: key.to_string(),
                source: Source::ComickFun,
            })
            .collect();
        parser
            .list_by_tags(0, Some(&tags), Some(SortOrder::Rating))
            .await
            .unwrap();
        parser.list_by_query(0, Some("solo leveling")).await.unwrap();

        // Search can't page.
        assert!(parser.list_by_query(20, Some("solo leveling")).await.unwrap().is_empty());

        let requests = context.requests();
        assert_eq!(
            requests.iter().filter(|u| u.ends_with("/genre")).count(),
            1
        );
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn test_get_details() {
        let parser = parser(
            MockContext::new()
                .with_page("https://api.comick.fun/comic/solo-leveling?tachiyomi=true", COMIC_JSON)
                .with_page(
                    "https://api.comick.fun/comic/77/chapter?tachiyomi=true&limit=99999",
                    CHAPTERS_JSON,
                ),
        );
        let item = ContentItem {
            rating: 0.5,
            ..item(&parser, "solo-leveling")
        };

        let details = parser.get_details(&item).await.unwrap();
        assert_eq!(details.id, item.id);
        assert_eq!(details.url, item.url);
        assert_eq!(details.rating, 0.5);
        assert_eq!(details.title, "Solo Leveling");
        assert!(details.is_nsfw);
        assert_eq!(details.description.as_deref(), Some("<p>Hunters.</p>"));
        assert_eq!(details.author.as_deref(), Some("DUBU"));
        assert!(details.tags.iter().any(|t| t.key == "romance"));

        let chapters = details.chapters.unwrap();
        assert_eq!(chapters.len(), 3);

        assert_eq!(chapters[0].url, "h11");
        assert_eq!(chapters[0].id, parser.core().generate_uid_from_id(11));
        assert_eq!(chapters[0].name, "Chap 1");
        assert_eq!(chapters[0].number, 1);
        assert_eq!(chapters[0].scanlator, None);
        assert_eq!(chapters[0].upload_date, 0);
        assert_eq!(chapters[0].branch.as_deref(), Some("English"));

        assert_eq!(chapters[1].name, "Vol 1 Chap 2: Return");
        assert_eq!(chapters[1].number, 2);
        assert_eq!(chapters[1].scanlator.as_deref(), Some("Team A"));
        assert_eq!(chapters[1].upload_date, 1_614_902_400_000);

        assert_eq!(chapters[2].number, 1);
        assert_eq!(chapters[2].branch.as_deref(), Some("Русский"));
    }

    #[tokio::test]
    async fn test_get_chapter_pages() {
        let parser = parser(
            MockContext::new().with_page("https://api.comick.fun/chapter/h12?tachiyomi=true", PAGES_JSON),
        );
        let chapter = ContentChapter {
            id: 1,
            name: String::new(),
            number: 1,
            url: "h12".to_string(),
            scanlator: None,
            upload_date: 0,
            branch: None,
            source: Source::ComickFun,
        };

        let pages = parser.get_chapter_pages(&chapter).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url, "https://meo.comick.pictures/1.jpg");
        assert_eq!(pages[0].referer, "https://comick.fun/");
        assert_eq!(pages[0].id, parser.core().generate_uid("https://meo.comick.pictures/1.jpg"));
        assert_ne!(pages[0].id, pages[1].id);
    }

    #[tokio::test]
    async fn test_malformed_response_is_parse_failure() {
        let parser = parser(
            MockContext::new().with_page("https://api.comick.fun/chapter/x?tachiyomi=true", r#"{"chapter": {}}"#),
        );
        let chapter = ContentChapter {
            id: 1,
            name: String::new(),
            number: 1,
            url: "x".to_string(),
            scanlator: None,
            upload_date: 0,
            branch: None,
            source: Source::ComickFun,
        };
        let err = parser.get_chapter_pages(&chapter).await.unwrap_err();
        assert!(err.is_parse_failure());
        assert!(err.to_string().ends_with("at https://api.comick.fun/chapter/x?tachiyomi=true"));
    }

    #[tokio::test]
    async fn test_details_with_null_arrays() {
        let parser = parser(
            MockContext::new()
                .with_page(
                    "https://api.comick.fun/comic/blank?tachiyomi=true",
                    r#"{"comic": {"id": 5, "title": "Blank"}, "genres": null, "artists": null}"#,
                )
                .with_page(
                    "https://api.comick.fun/comic/5/chapter?tachiyomi=true&limit=99999",
                    r#"{"chapters": []}"#,
                ),
        );
        let details = parser.get_details(&item(&parser, "blank")).await.unwrap();
        assert_eq!(details.title, "Blank");
        assert!(details.tags.is_empty());
        assert_eq!(details.author, None);
        assert_eq!(details.chapters.map(|c| c.len()), Some(0));
    }

    #[test]
    fn test_rating() {
        assert_eq!(Rating::Number(10.0).normalized(), Some(1.0));
        assert_eq!(Rating::Text("5".to_string()).normalized(), Some(0.5));
        assert_eq!(Rating::Text("n/a".to_string()).normalized(), None);
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("pt-br"), "Português (Brasil)");
        assert_eq!(language_name("xx"), "XX");
    }
}
