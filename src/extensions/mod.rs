// src/extensions/mod.rs

//! Named extension hooks resolved by string key.
//!
//! Mapping definitions refer to custom behavior by a stable key such as
//! `content-url`. The [`Registry`] maps those keys to implementations of
//! one of four hook traits; an unknown key is a normal "no extension" case.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AttrValueMap, EnvNode, SourceAttr, SourceConfig, TargetAttr};

pub use builtin::{
    ContentId, ContentUrl, CreationDate, DeltaDate, HtmlToText, ModificationDate, PageComponents,
    PublicationDate, TypeName, default_delta_date,
};

/// Produces the values of one target attribute.
pub trait AttributeExtractor: Send + Sync {
    fn extract(
        &self,
        target: &TargetAttr,
        source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        config: &SourceConfig,
    ) -> Result<Vec<String>>;
}

/// Produces the change fingerprint of a node.
pub trait DeltaDateExtractor: Send + Sync {
    fn delta_date(&self, node: &EnvNode<'_>, config: &SourceConfig) -> Result<DateTime<Utc>>;
}

/// Turns a public URL back into a content id.
pub trait UrlResolver: Send + Sync {
    fn id_from_url(&self, url: &str, config: &SourceConfig) -> Result<String>;
}

/// Produces extra attributes for every node of a model.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, node: &EnvNode<'_>, config: &SourceConfig) -> Result<AttrValueMap>;
}

/// Key to implementation lookup, populated at startup.
#[derive(Default, Clone)]
pub struct Registry {
    attributes: HashMap<String, Arc<dyn AttributeExtractor>>,
    delta_dates: HashMap<String, Arc<dyn DeltaDateExtractor>>,
    url_resolvers: HashMap<String, Arc<dyn UrlResolver>>,
    contents: HashMap<String, Arc<dyn ContentExtractor>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in extension.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_attribute("content-id", ContentId)
            .register_attribute("content-url", ContentUrl)
            .register_url_resolver("content-url", ContentUrl)
            .register_url_resolver("url-id", ContentUrl)
            .register_attribute("type-name", TypeName)
            .register_attribute("creation-date", CreationDate)
            .register_attribute("modification-date", ModificationDate)
            .register_attribute("publication-date", PublicationDate)
            .register_attribute("html-to-text", HtmlToText)
            .register_attribute("page-components", PageComponents)
            .register_delta_date("delta-date", DeltaDate);
        registry
    }

    pub fn register_attribute(
        &mut self,
        key: &str,
        extension: impl AttributeExtractor + 'static,
    ) -> &mut Self {
        self.attributes.insert(key.to_string(), Arc::new(extension));
        self
    }

    pub fn register_delta_date(
        &mut self,
        key: &str,
        extension: impl DeltaDateExtractor + 'static,
    ) -> &mut Self {
        self.delta_dates.insert(key.to_string(), Arc::new(extension));
        self
    }

    pub fn register_url_resolver(
        &mut self,
        key: &str,
        extension: impl UrlResolver + 'static,
    ) -> &mut Self {
        self.url_resolvers
            .insert(key.to_string(), Arc::new(extension));
        self
    }

    pub fn register_content(
        &mut self,
        key: &str,
        extension: impl ContentExtractor + 'static,
    ) -> &mut Self {
        self.contents.insert(key.to_string(), Arc::new(extension));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&dyn AttributeExtractor> {
        self.attributes.get(key).map(|ext| ext.as_ref())
    }

    pub fn delta_date(&self, key: &str) -> Option<&dyn DeltaDateExtractor> {
        self.delta_dates.get(key).map(|ext| ext.as_ref())
    }

    pub fn url_resolver(&self, key: &str) -> Option<&dyn UrlResolver> {
        self.url_resolvers.get(key).map(|ext| ext.as_ref())
    }

    pub fn content(&self, key: &str) -> Option<&dyn ContentExtractor> {
        self.contents.get(key).map(|ext| ext.as_ref())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self
            .attributes
            .keys()
            .chain(self.delta_dates.keys())
            .chain(self.url_resolvers.keys())
            .chain(self.contents.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        f.debug_struct("Registry").field("keys", &keys).finish()
    }
}
