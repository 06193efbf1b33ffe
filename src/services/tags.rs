// src/services/tags.rs

//! Tag taxonomy resolution.
//!
//! Tags are `facet:value` strings. The label of a value lives on the
//! taxonomy node `{tags_root}/{facet}/{value}` as `jcr:title` (default) and
//! `jcr:title.<locale>` properties.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::models::{AttrValueMap, AttributeSpec, Session, keys};
use crate::services::fetch::RepositoryClient;
use crate::utils::{locale_language, normalize_locale, split_tag};

/// Labels of a taxonomy node keyed by normalized locale, plus `default`.
pub fn tag_labels(tag: &Map<String, Value>) -> BTreeMap<String, String> {
    let localized_prefix = format!("{}.", keys::JCR_TITLE);
    let mut labels = BTreeMap::new();
    if let Some(title) = tag.get(keys::JCR_TITLE).and_then(Value::as_str) {
        labels.insert(keys::DEFAULT_LABEL.to_string(), title.to_string());
    }
    for (key, value) in tag {
        if let (Some(locale), Some(title)) = (key.strip_prefix(&localized_prefix), value.as_str())
        {
            labels.insert(normalize_locale(locale), title.to_string());
        }
    }
    labels
}

/// Label for `locale`: exact locale, then language, then default, then `raw`.
pub fn pick_label(labels: &BTreeMap<String, String>, locale: &str, raw: &str) -> String {
    let exact = normalize_locale(locale);
    let language = locale_language(locale);
    labels
        .get(&exact)
        .or_else(|| labels.get(&language))
        .or_else(|| labels.get(keys::DEFAULT_LABEL))
        .cloned()
        .unwrap_or_else(|| raw.to_string())
}

/// Resolves tag strings to facet values through the remote taxonomy.
pub struct TagResolver<'a> {
    client: &'a RepositoryClient,
}

impl<'a> TagResolver<'a> {
    pub fn new(client: &'a RepositoryClient) -> Self {
        Self { client }
    }

    /// Facet values for `tags`; registers each new facet on the session.
    ///
    /// Malformed tags (no colon) are skipped.
    pub async fn resolve(&self, session: &Session, locale: &str, tags: &[String]) -> AttrValueMap {
        let mut values = AttrValueMap::new();
        for tag in tags {
            let Some((facet, value)) = split_tag(tag) else {
                log::debug!("Skipping malformed tag '{}'", tag);
                continue;
            };
            self.register_facet(session, facet).await;
            let label = self.label(session, locale, facet, value).await;
            values.add(facet, vec![label], false);
        }
        values
    }

    async fn register_facet(&self, session: &Session, facet: &str) {
        if session.has_spec(facet) {
            return;
        }
        let path = format!("{}/{}", session.engine.tags_root, facet);
        let labels = self
            .client
            .fetch(&session.source, &path, true)
            .await
            .map(|node| tag_labels(&node))
            .unwrap_or_default();
        if session.register_spec(AttributeSpec::tag_facet(facet, labels)) {
            log::debug!("Registered tag facet '{}'", facet);
        }
    }

    async fn label(&self, session: &Session, locale: &str, facet: &str, value: &str) -> String {
        let path = format!("{}/{}/{}", session.engine.tags_root, facet, value);
        match self.client.fetch(&session.source, &path, true).await {
            Some(node) => pick_label(&tag_labels(&node), locale, value),
            None => value.to_string(),
        }
    }
}
