//! Parser trait and shared helpers for site adapters.
//!
//! Every site implements [`ContentParser`]. The trait's provided methods
//! cover what most sites share (default sort order, page url resolution,
//! favicons, config declaration); sites override them when they differ.
//! Identity, domain and config helpers live on [`ParserCore`], which each
//! adapter owns.

mod chan;
mod comick;

pub use chan::{ChanParser, ChanSite};
pub use comick::ComickParser;

use crate::error::ParserError;
use crate::identity;
use crate::model::{
    ContentChapter, ContentItem, ContentPage, FaviconSet, SortOrder, Source, Tag,
};
use crate::source_config::{ConfigKey, ConfigRegistry, DomainKey, SourceConfig};
use crate::transport::LoaderContext;
use crate::utils::to_absolute_url;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::HashSet;
use std::sync::Arc;

/// State and helpers every adapter composes.
pub struct ParserCore {
    source: Source,
    context: Arc<dyn LoaderContext>,
    config: Arc<SourceConfig>,
    domain_key: DomainKey,
}

impl ParserCore {
    pub fn new(
        source: Source,
        context: Arc<dyn LoaderContext>,
        configs: &ConfigRegistry,
        domain_key: DomainKey,
    ) -> Self {
        Self {
            source,
            context,
            config: configs.get_or_create(source),
            domain_key,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn context(&self) -> &dyn LoaderContext {
        self.context.as_ref()
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn domain_key(&self) -> &DomainKey {
        &self.domain_key
    }

    /// Active domain. Requests must always be built from this, never from
    /// a hardcoded host, so user-selected mirrors apply everywhere.
    pub fn domain(&self) -> String {
        self.config.domain(&self.domain_key)
    }

    /// Resolves a relative url against the active domain.
    ///
    /// With a subdomain (e.g. a CDN host) the host becomes
    /// `{subdomain}.{domain}` with any leading `www.` removed.
    pub fn absolute_url(&self, url: &str, subdomain: Option<&str>) -> String {
        let domain = self.domain();
        let host = match subdomain {
            Some(sub) => format!("{}.{}", sub, domain.strip_prefix("www.").unwrap_or(&domain)),
            None => domain,
        };
        to_absolute_url(url, &host)
    }

    /// Id for an entity identified by a relative url.
    pub fn generate_uid(&self, url: &str) -> i64 {
        identity::generate_uid(self.source, url)
    }

    /// Id for an entity identified by the site's numeric id.
    pub fn generate_uid_from_id(&self, id: i64) -> i64 {
        identity::generate_uid_from_id(self.source, id)
    }

    /// Structural failure, for markup that doesn't look as expected.
    pub fn parse_failed(&self, message: impl Into<String>) -> ParserError {
        ParserError::parse_failed(message)
    }

    /// Adds the domain key; overriding `declare_config` impls call this first.
    pub fn declare_domain(&self, keys: &mut Vec<ConfigKey>) {
        keys.push(ConfigKey::Domain(self.domain_key.clone()));
    }
}

/// Operations every site adapter provides.
#[async_trait]
pub trait ContentParser: Send + Sync {
    fn core(&self) -> &ParserCore;

    /// Supported orders. Must not be empty.
    fn sort_orders(&self) -> &[SortOrder];

    /// Lists items by criteria.
    ///
    /// `offset` counts items from 0 and need not be aligned to the site's
    /// page size. At most one of `query` and `tags` is normally set.
    /// `sort_order` is one of [`ContentParser::sort_orders`].
    async fn list_items(
        &self,
        offset: usize,
        query: Option<&str>,
        tags: Option<&HashSet<Tag>>,
        sort_order: SortOrder,
    ) -> Result<Vec<ContentItem>, ParserError>;

    /// Loads chapters, description, large cover etc.
    ///
    /// Returns the same item: `id`, `url` and `source` are kept, any other
    /// field may change.
    async fn get_details(&self, item: &ContentItem) -> Result<ContentItem, ParserError>;

    async fn get_chapter_pages(
        &self,
        chapter: &ContentChapter,
    ) -> Result<Vec<ContentPage>, ParserError>;

    /// Available tags (genres) of the source.
    async fn list_tags(&self) -> Result<HashSet<Tag>, ParserError>;

    fn source(&self) -> Source {
        self.core().source()
    }

    fn domain(&self) -> String {
        self.core().domain()
    }

    /// The first declared sort order.
    ///
    /// # Panics
    /// If the parser declares no sort orders.
    fn default_sort_order(&self) -> SortOrder {
        self.sort_orders()
            .iter()
            .min()
            .copied()
            .expect("sort_orders must contain at least one value")
    }

    async fn list_by_query(
        &self,
        offset: usize,
        query: Option<&str>,
    ) -> Result<Vec<ContentItem>, ParserError> {
        self.list_items(offset, query, None, self.default_sort_order())
            .await
    }

    async fn list_by_tags(
        &self,
        offset: usize,
        tags: Option<&HashSet<Tag>>,
        sort_order: Option<SortOrder>,
    ) -> Result<Vec<ContentItem>, ParserError> {
        let sort_order = sort_order.unwrap_or_else(|| self.default_sort_order());
        self.list_items(offset, None, tags, sort_order).await
    }

    /// Direct link to a page image.
    async fn resolve_page_url(&self, page: &ContentPage) -> Result<String, ParserError> {
        Ok(self.core().absolute_url(&page.url, None))
    }

    fn favicon_url(&self) -> String {
        format!("https://{}/favicon.ico", self.domain())
    }

    /// Icons declared by the site's front page.
    async fn favicons(&self) -> Result<FaviconSet, ParserError> {
        let url = format!("https://{}/", self.domain());
        let html = self.core().context().http_get(&url, &HeaderMap::new()).await?;
        Ok(FaviconSet::from_html(&html, &url))
    }

    /// Declares config keys. Overrides must call
    /// [`ParserCore::declare_domain`].
    fn declare_config(&self, keys: &mut Vec<ConfigKey>) {
        self.core().declare_domain(keys);
    }

    fn config_keys(&self) -> Vec<ConfigKey> {
        let mut keys = Vec::new();
        self.declare_config(&mut keys);
        keys
    }

    /// Login support, if the site has any.
    fn auth_provider(&self) -> Option<&dyn AuthProvider> {
        None
    }
}

/// Sites with user accounts.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Page where the user can log in.
    fn auth_url(&self) -> String;

    /// Whether a session cookie is present.
    fn is_authorized(&self) -> bool;

    /// Name of the logged-in user, or `AuthRequired` without a session.
    async fn username(&self) -> Result<String, ParserError>;
}

/// Builds chapters from site rows, numbering them from 1.
///
/// Rows that yield `None` and repeated ids are skipped without consuming
/// a number.
pub(crate) fn map_chapters<T>(
    rows: impl IntoIterator<Item = T>,
    mut transform: impl FnMut(u32, T) -> Option<ContentChapter>,
) -> Vec<ContentChapter> {
    let mut seen = HashSet::new();
    let mut chapters = Vec::new();
    for row in rows {
        let Some(chapter) = transform(chapters.len() as u32 + 1, row) else {
            continue;
        };
        if seen.insert(chapter.id) {
            chapters.push(chapter);
        }
    }
    chapters
}

/// One parser per known source.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn ContentParser>>,
}

impl ParserRegistry {
    /// Creates a registry with all available parsers.
    pub fn new(context: Arc<dyn LoaderContext>, configs: &ConfigRegistry) -> Self {
        let parsers = Source::ALL
            .iter()
            .map(|&source| Self::create(source, Arc::clone(&context), configs))
            .collect();

        Self { parsers }
    }

    /// Creates the parser for one source.
    pub fn create(
        source: Source,
        context: Arc<dyn LoaderContext>,
        configs: &ConfigRegistry,
    ) -> Box<dyn ContentParser> {
        match source {
            Source::ComickFun => Box::new(ComickParser::new(context, configs)),
            Source::MangaChan => Box::new(ChanParser::new(ChanSite::MangaChan, context, configs)),
            Source::HentaiChan => Box::new(ChanParser::new(ChanSite::HentaiChan, context, configs)),
            Source::YaoiChan => Box::new(ChanParser::new(ChanSite::YaoiChan, context, configs)),
        }
    }

    pub fn get(&self, source: Source) -> Option<&dyn ContentParser> {
        self.parsers
            .iter()
            .find(|p| p.source() == source)
            .map(|p| p.as_ref())
    }

    /// Returns all registered parsers.
    pub fn all(&self) -> &[Box<dyn ContentParser>] {
        &self.parsers
    }
}
