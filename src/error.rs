// src/error.rs

//! Unified error handling for the connector.

use std::fmt;

use thiserror::Error;

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regular expression failed to compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote repository answered with something we cannot use
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// A registered extension failed
    #[error("Extension '{key}' failed: {message}")]
    Extension { key: String, message: String },

    /// Job sink rejected a job
    #[error("Sink error: {0}")]
    Sink(String),

    /// Traversal of a subtree failed
    #[error("Traversal error for {context}: {message}")]
    Traversal { context: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extension error.
    pub fn extension(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extension {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a sink error.
    pub fn sink(message: impl fmt::Display) -> Self {
        Self::Sink(message.to_string())
    }

    /// Create a traversal error with context.
    pub fn traversal(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Traversal {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = AppError::fetch("http://cms/content/a.infinity.json", "status 404");
        assert_eq!(
            err.to_string(),
            "Fetch error for http://cms/content/a.infinity.json: status 404"
        );
    }

    #[test]
    fn test_extension_error_display() {
        let err = AppError::extension("delta-date", "boom");
        assert_eq!(err.to_string(), "Extension 'delta-date' failed: boom");
    }
}
