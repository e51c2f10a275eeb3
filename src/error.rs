//! Error types for shelfparse.
//!
//! Uses `thiserror` for structured error definitions. Transport failures
//! keep their own variants so callers can tell them apart from markup that
//! did not have the expected shape.

use crate::model::Source;
use thiserror::Error;

/// Main error type for parser operations.
#[derive(Error, Debug)]
pub enum ParserError {
    /// Expected content was missing from a fetched document.
    #[error("Parse failed{}{}", fmt_message(.message), fmt_origin(.url))]
    ParseFailed {
        message: Option<String>,
        url: Option<String>,
    },

    /// The source needs a logged-in session.
    #[error("Authorization required for {0}")]
    AuthRequired(Source),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Response body was not valid JSON
    #[error("Failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A GraphQL endpoint returned errors
    #[error("GraphQL error: {0}")]
    Graphql(String),

    /// Source configuration could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ParserError {
    /// Builds a structural failure with an optional message.
    pub fn parse_failed(message: impl Into<String>) -> Self {
        ParserError::ParseFailed {
            message: Some(message.into()),
            url: None,
        }
    }

    /// Attaches the document origin to a structural failure.
    ///
    /// Other variants are returned unchanged.
    pub fn at(self, origin: &str) -> Self {
        match self {
            ParserError::ParseFailed { message, url: None } => ParserError::ParseFailed {
                message,
                url: Some(origin.to_string()),
            },
            other => other,
        }
    }

    /// Returns true for failures caused by unexpected markup or data.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, ParserError::ParseFailed { .. })
    }
}

fn fmt_message(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default()
}

fn fmt_origin(url: &Option<String>) -> String {
    url.as_ref().map(|u| format!(" at {}", u)).unwrap_or_default()
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// A key was resolved that has neither a stored value nor a default
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failed_message() {
        let err = ParserError::parse_failed("Cannot find root");
        assert_eq!(err.to_string(), "Parse failed: Cannot find root");

        let err = err.at("https://example.org/list");
        assert_eq!(
            err.to_string(),
            "Parse failed: Cannot find root at https://example.org/list"
        );
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_parse_failed_without_message() {
        let err = ParserError::ParseFailed {
            message: None,
            url: None,
        };
        assert_eq!(err.to_string(), "Parse failed");
    }

    #[test]
    fn test_at_keeps_first_origin() {
        let err = ParserError::parse_failed("x").at("https://a/").at("https://b/");
        assert!(err.to_string().ends_with("at https://a/"));
    }

    #[test]
    fn test_auth_required_names_source() {
        let err = ParserError::AuthRequired(Source::YaoiChan);
        assert!(!err.is_parse_failure());
        assert!(err.to_string().contains(Source::YaoiChan.title()));
    }
}
