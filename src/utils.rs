//! Helpers shared by parsers: url handling and HTML lookups.

use crate::error::ParserError;
use chrono::NaiveDate;
use scraper::{ElementRef, Selector};

/// Joins a relative url with a domain.
///
/// Absolute urls are returned unchanged and protocol-relative ones get
/// `https:`.
pub fn to_absolute_url(url: &str, domain: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if url.starts_with('/') {
        format!("https://{}{}", domain, url)
    } else {
        format!("https://{}/{}", domain, url)
    }
}

/// Strips the scheme and `domain` from an absolute url.
///
/// The `www.` variant of `domain` counts as the same host. Urls on other
/// hosts, subdomains included, are returned unchanged.
pub fn to_relative_url(url: &str, domain: &str) -> String {
    strip_host(url, domain, false).unwrap_or_else(|| url.to_string())
}

/// Path and query of `url` when its host is `domain`, or one of its
/// subdomains if `subdomains` is set.
fn strip_host(url: &str, domain: &str, subdomains: bool) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("//"))?;
    let (host, path) = rest.split_at(rest.find(['/', '?']).unwrap_or(rest.len()));

    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    let base = domain.strip_prefix("www.").unwrap_or(&domain);
    let same_host = host.strip_prefix("www.").unwrap_or(&host) == base;
    if !same_host && !(subdomains && host.ends_with(&format!(".{}", base))) {
        return None;
    }

    Some(if path.is_empty() { "/".to_string() } else { path.to_string() })
}

/// Host part of an absolute url.
pub fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok()?.host_str().map(str::to_string)
}

/// Percent-encodes a query parameter value.
pub fn url_encoded(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Uppercases the first letter of every word.
pub fn to_title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unix millis for a `yyyy-mm-dd` date at UTC midnight, 0 when it doesn't parse.
pub fn parse_date_millis(text: &str) -> i64 {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Trimmed text content of an element.
pub fn text_of(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>().trim().to_string()
}

/// Attribute value, or `None` when missing or blank.
pub fn attr_or_none<'a>(elem: ElementRef<'a>, name: &str) -> Option<&'a str> {
    elem.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Attribute value as a url relative to `domain`.
///
/// Links to the `www.` variant or a subdomain of `domain` (e.g. a mirror
/// preset) are accepted. Fails for urls pointing at other hosts, since
/// those can't produce domain-independent ids.
pub fn attr_as_relative_url(
    elem: ElementRef<'_>,
    name: &str,
    domain: &str,
) -> Result<String, ParserError> {
    let value = attr_or_none(elem, name)
        .ok_or_else(|| ParserError::parse_failed(format!("Missing \"{}\" attribute", name)))?;
    if value.starts_with('/') && !value.starts_with("//") {
        return Ok(value.to_string());
    }
    strip_host(value, domain, true).ok_or_else(|| {
        ParserError::parse_failed(format!(
            "Cannot get relative url for {}: \"{}\"",
            name, value
        ))
    })
}

/// Parses a CSS selector written in code.
fn selector(css: &str) -> Result<Selector, ParserError> {
    Selector::parse(css).map_err(|e| ParserError::parse_failed(format!("Bad selector \"{}\": {}", css, e)))
}

/// First descendant matching `css`, or a parse failure naming the selector.
pub fn select_first_or_fail<'a>(elem: ElementRef<'a>, css: &str) -> Result<ElementRef<'a>, ParserError> {
    elem.select(&selector(css)?)
        .next()
        .ok_or_else(|| ParserError::parse_failed(format!("Cannot find \"{}\"", css)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_to_absolute_url() {
        assert_eq!(
            to_absolute_url("/manga/1.html", "manga-chan.me"),
            "https://manga-chan.me/manga/1.html"
        );
        assert_eq!(
            to_absolute_url("manga/1.html", "manga-chan.me"),
            "https://manga-chan.me/manga/1.html"
        );
        assert_eq!(
            to_absolute_url("//cdn.example.org/a.png", "manga-chan.me"),
            "https://cdn.example.org/a.png"
        );
        assert_eq!(
            to_absolute_url("https://other.org/x", "manga-chan.me"),
            "https://other.org/x"
        );
    }

    #[test]
    fn test_to_relative_url() {
        assert_eq!(
            to_relative_url("https://manga-chan.me/manga/1.html", "manga-chan.me"),
            "/manga/1.html"
        );
        assert_eq!(to_relative_url("http://manga-chan.me", "manga-chan.me"), "/");
        assert_eq!(
            to_relative_url("https://other.org/manga/1.html", "manga-chan.me"),
            "https://other.org/manga/1.html"
        );
        assert_eq!(
            to_relative_url("https://www.manga-chan.me/manga/1.html", "manga-chan.me"),
            "/manga/1.html"
        );
        // Subdomains may be CDNs serving different content.
        assert_eq!(
            to_relative_url("https://img2.manga-chan.me/m/01.jpg", "manga-chan.me"),
            "https://img2.manga-chan.me/m/01.jpg"
        );
        assert_eq!(
            to_relative_url("https://hentaichan.live/manga/2.html", "www.hentaichan.live"),
            "/manga/2.html"
        );
        assert_eq!(
            to_relative_url("https://notmanga-chan.me/x", "manga-chan.me"),
            "https://notmanga-chan.me/x"
        );
        // A longer host sharing the prefix is not the same domain.
        assert_eq!(
            to_relative_url("https://manga-chan.me.evil/x", "manga-chan.me"),
            "https://manga-chan.me.evil/x"
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(to_title_case("school life"), "School Life");
        assert_eq!(to_title_case("романтика"), "Романтика");
        assert_eq!(to_title_case(""), "");
    }

    #[test]
    fn test_url_encoded() {
        assert_eq!(url_encoded("one piece"), "one+piece");
        assert_eq!(url_encoded("a&b"), "a%26b");
    }

    #[test]
    fn test_parse_date_millis() {
        assert_eq!(parse_date_millis("1970-01-02"), 86_400_000);
        assert_eq!(parse_date_millis(" 2021-03-05 "), 1_614_902_400_000);
        assert_eq!(parse_date_millis("05.03.2021"), 0);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://manga-chan.me/x").as_deref(), Some("manga-chan.me"));
        assert_eq!(host_of("/x"), None);
    }

    #[test]
    fn test_html_lookups() {
        let doc = Html::parse_document(
            r#"<div id="root"><a class="x" href="https://manga-chan.me/manga/5.html"> Five </a>
               <a class="m" href="https://y.manga-chan.me/manga/6.html"></a>
               <a class="w" href="//www.manga-chan.me/manga/7.html"></a>
               <a class="y" href="https://elsewhere.org/z"></a><span title=" "></span></div>"#,
        );
        let root = doc.root_element();

        let a = select_first_or_fail(root, "a.x").unwrap();
        assert_eq!(text_of(a), "Five");
        assert_eq!(
            attr_as_relative_url(a, "href", "manga-chan.me").unwrap(),
            "/manga/5.html"
        );

        let mirror = select_first_or_fail(root, "a.m").unwrap();
        assert_eq!(
            attr_as_relative_url(mirror, "href", "manga-chan.me").unwrap(),
            "/manga/6.html"
        );
        let www = select_first_or_fail(root, "a.w").unwrap();
        assert_eq!(
            attr_as_relative_url(www, "href", "manga-chan.me").unwrap(),
            "/manga/7.html"
        );

        let foreign = select_first_or_fail(root, "a.y").unwrap();
        assert!(attr_as_relative_url(foreign, "href", "manga-chan.me").is_err());

        let span = select_first_or_fail(root, "span").unwrap();
        assert_eq!(attr_or_none(span, "title"), None);

        let err = select_first_or_fail(root, "table").unwrap_err();
        assert_eq!(err.to_string(), "Parse failed: Cannot find \"table\"");
    }
}
