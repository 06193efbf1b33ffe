// src/models/config.rs

//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::mapping::ContentMapping;

/// Hard ceiling for in-flight child fetches per parent node.
pub const MAX_PARALLELISM: usize = 10;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, cache and traversal behavior settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Content sources to synchronize
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.engine.user_agent.trim().is_empty() {
            return Err(AppError::validation("engine.user_agent is empty"));
        }
        if self.engine.timeout_secs == 0 {
            return Err(AppError::validation("engine.timeout_secs must be > 0"));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.engine.parallelism) {
            return Err(AppError::validation(format!(
                "engine.parallelism must be between 1 and {MAX_PARALLELISM}"
            )));
        }
        if self.engine.cache_max_entries == 0 {
            return Err(AppError::validation("engine.cache_max_entries must be > 0"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            source.validate()?;
        }
        Ok(())
    }
}

/// HTTP client, cache and traversal settings shared by all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Fan out child processing concurrently
    #[serde(default)]
    pub parallel: bool,

    /// Maximum in-flight child fetches per parent node
    #[serde(default = "defaults::parallelism")]
    pub parallelism: usize,

    /// Maximum number of cached responses
    #[serde(default = "defaults::cache_max_entries")]
    pub cache_max_entries: usize,

    /// Cached response lifetime in seconds
    #[serde(default = "defaults::cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Re-index nodes that reference explicitly indexed paths
    #[serde(default = "defaults::follow_dependencies")]
    pub follow_dependencies: bool,

    /// Prefix that marks a string value as a cross-reference
    #[serde(default = "defaults::content_root")]
    pub content_root: String,

    /// Root of the tag taxonomy
    #[serde(default = "defaults::tags_root")]
    pub tags_root: String,
}

impl EngineConfig {
    /// Effective fan-out width, clamped to the supported range.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.clamp(1, MAX_PARALLELISM)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            parallel: false,
            parallelism: defaults::parallelism(),
            cache_max_entries: defaults::cache_max_entries(),
            cache_ttl_secs: defaults::cache_ttl(),
            follow_dependencies: defaults::follow_dependencies(),
            content_root: defaults::content_root(),
            tags_root: defaults::tags_root(),
        }
    }
}

/// A locale bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalePath {
    /// Locale tag, e.g. `en_US`
    pub locale: String,

    /// Path prefix, e.g. `/content/site/en`
    pub path: String,
}

/// One content source: where it lives and how it is indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name, unique within the configuration
    pub name: String,

    /// Provider tag attached to emitted jobs
    #[serde(default = "defaults::provider_name")]
    pub provider_name: String,

    /// Repository base URL, e.g. `http://localhost:4502`
    pub endpoint: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Path where full runs start
    #[serde(default = "defaults::content_root")]
    pub root_path: String,

    /// Node type that qualifies for indexing, e.g. `cq:Page`
    #[serde(default)]
    pub content_type: String,

    /// Node sub-type, e.g. `STATIC_FILE`
    #[serde(default)]
    pub sub_type: String,

    /// Paths matching this pattern are processed once per source
    #[serde(default)]
    pub once_pattern: String,

    /// Whether this source honors `once_pattern`
    #[serde(default)]
    pub once: bool,

    #[serde(default = "defaults::locale")]
    pub default_locale: String,

    #[serde(default)]
    pub locale_paths: Vec<LocalePath>,

    /// Index the authoring environment
    #[serde(default)]
    pub author: bool,

    /// Index the live-publish environment
    #[serde(default)]
    pub publish: bool,

    #[serde(default)]
    pub author_site: String,

    #[serde(default)]
    pub publish_site: String,

    #[serde(default)]
    pub author_url_prefix: String,

    #[serde(default)]
    pub publish_url_prefix: String,

    /// Site display name; resolved from the root node when absent
    #[serde(default)]
    pub site_name: Option<String>,

    /// Attribute mapping definition
    #[serde(default)]
    pub mapping: ContentMapping,
}

impl SourceConfig {
    /// Validate a single source definition.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("source name is empty"));
        }
        url::Url::parse(&self.endpoint).map_err(|e| {
            AppError::validation(format!("source '{}': invalid endpoint: {e}", self.name))
        })?;
        if !self.once_pattern.trim().is_empty() {
            Regex::new(&self.once_pattern)?;
        }
        if self.author && self.author_site.trim().is_empty() {
            return Err(AppError::validation(format!(
                "source '{}': author indexing needs author_site",
                self.name
            )));
        }
        if self.publish && self.publish_site.trim().is_empty() {
            return Err(AppError::validation(format!(
                "source '{}': publish indexing needs publish_site",
                self.name
            )));
        }
        Ok(())
    }

    /// Whether a content-type filter is configured.
    pub fn uses_content_type(&self) -> bool {
        !self.content_type.trim().is_empty()
    }

    /// Locale for a node path: first matching locale prefix, else the default.
    pub fn locale_for_path(&self, path: &str) -> &str {
        self.locale_paths
            .iter()
            .find(|lp| path.starts_with(&lp.path))
            .map(|lp| lp.locale.as_str())
            .unwrap_or(&self.default_locale)
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; content-sync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn parallelism() -> usize {
        super::MAX_PARALLELISM
    }
    pub fn cache_max_entries() -> usize {
        1000
    }
    pub fn cache_ttl() -> u64 {
        300
    }
    pub fn follow_dependencies() -> bool {
        true
    }
    pub fn content_root() -> String {
        "/content".into()
    }
    pub fn tags_root() -> String {
        "/content/_cq_tags".into()
    }
    pub fn provider_name() -> String {
        "AEM".into()
    }
    pub fn locale() -> String {
        "en_US".into()
    }
}
