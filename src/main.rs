//! Shelfparse CLI - browse manga catalogs through the uniform parsers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelfparse::config::Settings;
use shelfparse::console::Console;
use shelfparse::model::{ContentChapter, ContentItem, RATING_UNKNOWN, SortOrder, Source, Tag};
use shelfparse::source_config::{ConfigKey, ConfigRegistry, FileConfigStore};
use shelfparse::transport::HttpLoaderContext;
use shelfparse::{ContentParser, ParserRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Browse online manga catalogs from the terminal.
#[derive(Parser, Debug)]
#[command(name = "shelfparse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log requests and cache activity.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available sources and their active domains.
    Sources,

    /// List items of a source.
    List {
        #[arg(value_parser = parse_source)]
        source: Source,

        /// Number of items to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Search query.
        #[arg(long, conflicts_with = "tag")]
        query: Option<String>,

        /// Tag key to filter by (repeatable).
        #[arg(long)]
        tag: Vec<String>,

        /// Sort order (updated, popularity, rating, newest, alphabetical).
        #[arg(long)]
        sort: Option<SortOrder>,
    },

    /// Show details and chapters of an item.
    Details {
        #[arg(value_parser = parse_source)]
        source: Source,

        /// Item url as returned by `list`.
        url: String,
    },

    /// List page images of a chapter.
    Pages {
        #[arg(value_parser = parse_source)]
        source: Source,

        /// Chapter url as returned by `details`.
        chapter_url: String,
    },

    /// List tags of a source.
    Tags {
        #[arg(value_parser = parse_source)]
        source: Source,
    },

    /// Pick the best icon of a source.
    Favicon {
        #[arg(value_parser = parse_source)]
        source: Source,

        /// Preferred icon size in pixels.
        #[arg(long, default_value_t = 32)]
        size: u32,

        /// Accepted file types, e.g. png (repeatable).
        #[arg(long = "type")]
        types: Vec<String>,
    },

    /// Show or change the domain used for a source.
    Domain {
        #[arg(value_parser = parse_source)]
        source: Source,

        /// Domain to use instead of the default.
        #[arg(long, conflicts_with = "reset")]
        set: Option<String>,

        /// Go back to the default domain.
        #[arg(long)]
        reset: bool,
    },
}

fn parse_source(name: &str) -> Result<Source, String> {
    Source::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = Source::ALL.iter().map(|s| s.name()).collect();
        format!("unknown source, expected one of: {}", names.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("shelfparse=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let console = Console::new();

    let settings = Settings::load().context("Failed to load configuration")?;
    settings.validate().context("Invalid configuration")?;

    let sources_path = Settings::sources_path()?;
    let store = FileConfigStore::open(&sources_path)
        .with_context(|| format!("Failed to open {}", sources_path.display()))?;
    let configs = ConfigRegistry::new(Arc::new(store));

    let context = HttpLoaderContext::new(&settings.http).context("Failed to create HTTP client")?;
    let registry = ParserRegistry::new(Arc::new(context), &configs);

    if let Err(err) = run(args.command, &registry, &configs, &console).await {
        console.error(&format!("{:#}", err));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Command,
    registry: &ParserRegistry,
    configs: &ConfigRegistry,
    console: &Console,
) -> Result<()> {
    match command {
        Command::Sources => {
            for parser in registry.all() {
                let source = parser.source();
                console.section(source.title());
                console.field("name", source.name());
                console.field("domain", &parser.domain());
                console.field("language", source.locale().unwrap_or("multi"));
                if let Some(auth) = parser.auth_provider() {
                    let state = if auth.is_authorized() { "logged in" } else { "not logged in" };
                    console.field("account", state);
                }
            }
        }

        Command::List {
            source,
            offset,
            query,
            tag,
            sort,
        } => {
            let parser = parser_for(registry, source)?;
            let sort = match sort {
                Some(order) if !parser.sort_orders().contains(&order) => {
                    anyhow::bail!("{} does not support sorting by {:?}", source, order)
                }
                other => other,
            };

            let items = if tag.is_empty() {
                match sort {
                    Some(order) => parser.list_items(offset, query.as_deref(), None, order).await?,
                    None => parser.list_by_query(offset, query.as_deref()).await?,
                }
            } else {
                let tags: HashSet<Tag> = tag
                    .into_iter()
                    .map(|key| Tag {
                        title: key.clone(),
                        key,
                        source,
                    })
                    .collect();
                parser.list_by_tags(offset, Some(&tags), sort).await?
            };

            console.info(&format!("{} items", console.count(items.len())));
            for item in &items {
                print_item_line(console, item);
            }
        }

        Command::Details { source, url } => {
            let parser = parser_for(registry, source)?;
            let item = parser
                .get_details(&bare_item(parser, &url))
                .await
                .with_context(|| format!("Failed to load {}", url))?;
            print_details(console, &item);
        }

        Command::Pages {
            source,
            chapter_url,
        } => {
            let parser = parser_for(registry, source)?;
            let chapter = ContentChapter {
                id: parser.core().generate_uid(&chapter_url),
                name: String::new(),
                number: 0,
                url: chapter_url,
                scanlator: None,
                upload_date: 0,
                branch: None,
                source,
            };
            let pages = parser.get_chapter_pages(&chapter).await?;
            console.info(&format!("{} pages", console.count(pages.len())));
            for page in &pages {
                println!("{}", parser.resolve_page_url(page).await?);
            }
        }

        Command::Tags { source } => {
            let parser = parser_for(registry, source)?;
            let mut tags: Vec<Tag> = parser.list_tags().await?.into_iter().collect();
            tags.sort_by(|a, b| a.title.cmp(&b.title));
            for tag in &tags {
                println!("{} {}", tag.title, console.muted(&tag.key));
            }
        }

        Command::Favicon {
            source,
            size,
            types,
        } => {
            let parser = parser_for(registry, source)?;
            let icons = parser.favicons().await?;
            let types: Vec<&str> = types.iter().map(String::as_str).collect();
            let filter = (!types.is_empty()).then_some(types.as_slice());
            match icons.find(size, filter) {
                Some(icon) => println!("{} {}", icon.url(), console.muted(&format!("{}px", icon.size()))),
                None => console.warning("No matching icon"),
            }
        }

        Command::Domain { source, set, reset } => {
            let parser = parser_for(registry, source)?;
            let key = parser
                .config_keys()
                .into_iter()
                .find(|k| matches!(k, ConfigKey::Domain(_)))
                .context("Parser declares no domain")?;
            let config = configs.get_or_create(source);

            if reset {
                config.set(&key, None)?;
            } else if let Some(domain) = set.as_deref() {
                config.set(&key, Some(domain))?;
            }
            if reset || set.is_some() {
                console.success(&format!("{} now uses {}", source, parser.domain()));
            } else {
                println!("{}", parser.domain());
            }
            if let ConfigKey::Domain(domain_key) = &key
                && !domain_key.presets().is_empty()
            {
                console.field("default", domain_key.default_domain());
                console.field("mirrors", &domain_key.presets().join(", "));
            }
        }
    }
    Ok(())
}

fn parser_for(registry: &ParserRegistry, source: Source) -> Result<&dyn ContentParser> {
    registry
        .get(source)
        .with_context(|| format!("No parser for {}", source.name()))
}

/// Item that only knows its url, enough for `get_details`.
fn bare_item(parser: &dyn ContentParser, url: &str) -> ContentItem {
    ContentItem {
        id: parser.core().generate_uid(url),
        title: String::new(),
        alt_title: None,
        url: url.to_string(),
        public_url: String::new(),
        rating: RATING_UNKNOWN,
        is_nsfw: false,
        cover_url: String::new(),
        large_cover_url: None,
        tags: HashSet::new(),
        state: None,
        author: None,
        description: None,
        chapters: None,
        source: parser.source(),
    }
}

fn print_item_line(console: &Console, item: &ContentItem) {
    println!(
        "{}  {}  {}",
        item.title,
        console.rating(item.rating),
        console.muted(&item.url)
    );
}

fn print_details(console: &Console, item: &ContentItem) {
    console.section(&item.title);
    if let Some(alt) = &item.alt_title {
        console.field("also", alt);
    }
    console.field("url", &item.public_url);
    console.field("rating", &console.rating(item.rating));
    if let Some(author) = &item.author {
        console.field("author", author);
    }
    if let Some(state) = item.state {
        console.field("state", &format!("{:?}", state).to_lowercase());
    }
    if item.is_nsfw {
        console.field("nsfw", "yes");
    }
    if !item.tags.is_empty() {
        let mut titles: Vec<&str> = item.tags.iter().map(|t| t.title.as_str()).collect();
        titles.sort_unstable();
        console.field("tags", &titles.join(", "));
    }
    if let Some(description) = &item.description {
        console.field("description", description);
    }

    let chapters = item.chapters.as_deref().unwrap_or_default();
    console.section(&format!("{} chapters", chapters.len()));
    for chapter in chapters {
        let branch = chapter
            .branch
            .as_deref()
            .map(|b| format!(" [{}]", b))
            .unwrap_or_default();
        println!(
            "{:>4}. {}{}  {}",
            chapter.number,
            chapter.name,
            branch,
            console.muted(&chapter.url)
        );
    }
}
