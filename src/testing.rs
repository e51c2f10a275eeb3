//! Test double for [`LoaderContext`].

use crate::error::ParserError;
use crate::transport::LoaderContext;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned bodies by exact url and remembers what was requested.
#[derive(Default)]
pub struct MockContext {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
    cookies: Mutex<HashMap<String, Vec<String>>>,
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn serve(&self, url: &str) -> Result<String, ParserError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| ParserError::Status {
            status: reqwest::StatusCode::NOT_FOUND,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl LoaderContext for MockContext {
    async fn http_get(&self, url: &str, _headers: &HeaderMap) -> Result<String, ParserError> {
        self.serve(url)
    }

    async fn http_post_json(&self, url: &str, _body: &JsonValue) -> Result<String, ParserError> {
        self.serve(url)
    }

    fn cookie_header(&self, url: &str) -> Option<String> {
        let host = crate::utils::host_of(url)?;
        let cookies = self.cookies.lock().unwrap();
        cookies.get(&host).map(|c| c.join("; "))
    }

    fn insert_cookies(&self, domain: &str, cookies: &[&str]) {
        self.cookies
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default()
            .extend(cookies.iter().map(|c| c.to_string()));
    }
}
