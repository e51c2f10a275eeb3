//! Shelfparse - uniform parsers for online manga catalogs.
//!
//! This library provides:
//! - A parser contract every site adapter implements (listing, details,
//!   chapter pages, tags, favicons)
//! - Stable identity hashing for items, chapters and pages
//! - Per-source configuration with user-selectable domain mirrors
//! - Offset to page translation for sites that paginate by page number

pub mod config;
pub mod console;
mod cookies;
pub mod error;
pub mod identity;
pub mod model;
pub mod paginator;
pub mod parsers;
pub mod source_config;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Settings;
pub use console::Console;
pub use error::{ConfigError, ParserError};
pub use model::{
    ContentChapter, ContentItem, ContentPage, ContentState, Favicon, FaviconSet, SortOrder,
    Source, Tag,
};
pub use paginator::Paginator;
pub use parsers::{AuthProvider, ContentParser, ParserRegistry};
pub use source_config::{ConfigKey, ConfigRegistry, ConfigStore, FileConfigStore};
pub use transport::{HttpLoaderContext, LoaderContext};
