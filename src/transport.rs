//! Network access for parsers.
//!
//! Parsers never talk to reqwest directly; they go through a
//! [`LoaderContext`], which lets tests serve canned documents and lets the
//! host application own cookies, timeouts and throttling.

use crate::config::HttpSettings;
use crate::cookies::load_netscape_cookies;
use crate::error::ParserError;
use async_trait::async_trait;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderMap;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;

/// Transport used by every parser.
#[async_trait]
pub trait LoaderContext: Send + Sync {
    /// Performs a GET request and returns the response body.
    async fn http_get(&self, url: &str, headers: &HeaderMap) -> Result<String, ParserError>;

    /// POSTs a JSON body and returns the response body.
    async fn http_post_json(&self, url: &str, body: &JsonValue) -> Result<String, ParserError>;

    /// Returns the `Cookie` header value that would be sent to `url`.
    fn cookie_header(&self, url: &str) -> Option<String>;

    /// Stores `name=value` cookies for a domain.
    fn insert_cookies(&self, domain: &str, cookies: &[&str]);

    /// Fetches and decodes a JSON document.
    async fn get_json(&self, url: &str) -> Result<JsonValue, ParserError> {
        let body = self.http_get(url, &HeaderMap::new()).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Runs a GraphQL query and returns its `data` object.
    async fn graphql_query(
        &self,
        endpoint: &str,
        query: &str,
        variables: JsonValue,
    ) -> Result<JsonValue, ParserError> {
        let payload = json!({ "query": query, "variables": variables });
        let body = self.http_post_json(endpoint, &payload).await?;
        let mut response: JsonValue = serde_json::from_str(&body)?;

        if let Some(errors) = response.get("errors").and_then(JsonValue::as_array)
            && !errors.is_empty()
        {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(JsonValue::as_str))
                .collect();
            return Err(ParserError::Graphql(if messages.is_empty() {
                "unknown error".to_string()
            } else {
                messages.join("; ")
            }));
        }

        match response.get_mut("data") {
            Some(data) => Ok(data.take()),
            None => Err(ParserError::parse_failed("GraphQL response has no data").at(endpoint)),
        }
    }
}

/// [`LoaderContext`] backed by a reqwest client with a shared cookie jar.
pub struct HttpLoaderContext {
    client: reqwest::Client,
    jar: Arc<Jar>,
    delay_sec: f64,
}

impl HttpLoaderContext {
    /// Builds the client from settings and preloads the configured cookie file.
    pub fn new(settings: &HttpSettings) -> Result<Self, ParserError> {
        let jar = Arc::new(Jar::default());

        if let Some(path) = &settings.cookie_file {
            match load_netscape_cookies(path, &jar) {
                Ok(count) => tracing::debug!("Loaded {} cookies from {}", count, path.display()),
                Err(err) => tracing::warn!("Failed to load cookies from {}: {}", path.display(), err),
            }
        }

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()?;

        Ok(Self {
            client,
            jar,
            delay_sec: settings.delay_between_requests_sec,
        })
    }

    async fn check(response: reqwest::Response) -> Result<String, ParserError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ParserError::Status {
                status,
                url: response.url().to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl LoaderContext for HttpLoaderContext {
    async fn http_get(&self, url: &str, headers: &HeaderMap) -> Result<String, ParserError> {
        rate_limit(self.delay_sec).await;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).headers(headers.clone()).send().await?;
        Self::check(response).await
    }

    async fn http_post_json(&self, url: &str, body: &JsonValue) -> Result<String, ParserError> {
        rate_limit(self.delay_sec).await;
        tracing::debug!("POST {}", url);

        let response = self.client.post(url).json(body).send().await?;
        Self::check(response).await
    }

    fn cookie_header(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let value = self.jar.cookies(&url)?;
        value.to_str().ok().map(str::to_string)
    }

    fn insert_cookies(&self, domain: &str, cookies: &[&str]) {
        let Ok(url) = Url::parse(&format!("https://{}/", domain)) else {
            tracing::warn!("Cannot store cookies for invalid domain {}", domain);
            return;
        };
        for cookie in cookies {
            self.jar.add_cookie_str(cookie, &url);
        }
    }
}

/// Sleeps before a request when a delay is configured.
pub async fn rate_limit(delay_sec: f64) {
    if delay_sec > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(delay_sec)).await;
    }
}
