// src/services/fetch.rs

//! Authenticated fetch of node tree documents with a bounded response cache.
//!
//! Every failure (transport error, unusable body) is logged and reported
//! as "not found"; nothing escapes to the caller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{EngineConfig, SourceConfig, keys};
use crate::utils::http::{create_async_client, get_text_with_auth};
use crate::utils::url::node_json_url;

struct CacheEntry {
    stored_at: Instant,
    body: Option<String>,
}

/// Response bodies keyed by exact URL, bounded by entry count and age.
///
/// Absent results are cached too. Concurrent misses for the same URL may
/// both fetch; the last writer wins.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached body for `url`; `None` on miss or expiry.
    pub fn get(&self, url: &str) -> Option<Option<String>> {
        let mut entries = self.lock();
        match entries.get(url) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(url);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, url: &str, body: Option<String>) {
        let mut entries = self.lock();
        if !entries.contains_key(url) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            url.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                body,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape of a response body.
enum Body {
    Object(Map<String, Value>),
    /// Ambiguous match; carries the first element as a path
    Array(Option<String>),
    Unusable,
}

fn classify(body: &str) -> Body {
    let trimmed = body.trim_start();
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<Value>>(trimmed) {
            Ok(items) => Body::Array(items.first().map(|first| match first {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })),
            Err(_) => Body::Unusable,
        }
    } else if trimmed.starts_with('{') {
        match serde_json::from_str::<Map<String, Value>>(trimmed) {
            Ok(map) => Body::Object(map),
            Err(_) => Body::Unusable,
        }
    } else {
        Body::Unusable
    }
}

/// HTTP access to the content repository.
pub struct RepositoryClient {
    client: reqwest::Client,
    cache: ResponseCache,
}

impl RepositoryClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            cache: ResponseCache::new(
                config.cache_max_entries,
                Duration::from_secs(config.cache_ttl_secs),
            ),
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch the tree document of `path`.
    ///
    /// An array answer is re-resolved once through its first element,
    /// unless `path` already targets a raw `.json` document.
    pub async fn fetch(
        &self,
        source: &SourceConfig,
        path: &str,
        use_cache: bool,
    ) -> Option<Map<String, Value>> {
        let url = node_json_url(&source.endpoint, path);
        match classify(self.body(source, &url, use_cache).await?.as_str()) {
            Body::Object(map) => Some(map),
            Body::Array(Some(first)) if !path.ends_with(keys::JSON_EXTENSION) => {
                log::debug!("Ambiguous answer for {}, following {}", url, first);
                let resolved = node_json_url(&source.endpoint, &first);
                match classify(self.body(source, &resolved, use_cache).await?.as_str()) {
                    Body::Object(map) => Some(map),
                    _ => not_found(&resolved),
                }
            }
            _ => not_found(&url),
        }
    }

    async fn body(&self, source: &SourceConfig, url: &str, use_cache: bool) -> Option<String> {
        if use_cache {
            if let Some(cached) = self.cache.get(url) {
                log::debug!("Using cache to request {}", url);
                return cached.or_else(|| not_found(url));
            }
            log::debug!("Creating cache to request {}", url);
        }

        let body = match get_text_with_auth(&self.client, url, &source.username, &source.password)
            .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                log::warn!("Empty response entity from URL: {}", url);
                None
            }
            Err(e) => {
                log::error!("Failed to fetch response from URL: {} - {}", url, e);
                None
            }
        };

        if use_cache {
            self.cache.insert(url, body.clone());
        }
        body.or_else(|| not_found(url))
    }
}

fn not_found<T>(url: &str) -> Option<T> {
    log::warn!("Request not found {}", url);
    None
}
