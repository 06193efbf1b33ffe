// src/services/mapping.rs

//! Attribute mapping: node plus model definition to attribute values.
//!
//! Each target attribute is resolved in isolation; a failing target is
//! logged and contributes nothing.

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::extensions::Registry;
use crate::models::{AttrValueMap, EnvNode, Session, SourceAttr, TargetAttr, keys, tree};
use crate::services::fetch::RepositoryClient;
use crate::services::tags::TagResolver;
use crate::utils::html_to_text;

/// Values of a property: one per array element, or the scalar itself.
fn property_values(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => tree::scalar_text(other).into_iter().collect(),
    }
}

/// Resolves a session's model against nodes.
pub struct AttributeMapper<'a> {
    registry: &'a Registry,
    client: &'a RepositoryClient,
}

impl<'a> AttributeMapper<'a> {
    pub fn new(registry: &'a Registry, client: &'a RepositoryClient) -> Self {
        Self { registry, client }
    }

    /// Attribute values of `node` for every target of the session model,
    /// plus the model's content extension.
    pub async fn resolve(&self, session: &Session, node: &EnvNode<'_>) -> AttrValueMap {
        let mut values = AttrValueMap::new();
        let Some(model) = session.model.as_ref() else {
            log::warn!(
                "No model for content type '{}' in source '{}'",
                session.source.content_type,
                session.source.name
            );
            return values;
        };

        for target in &model.target_attrs {
            log::debug!("Resolving target attribute: {}", target.name);
            match self.resolve_target(session, node, target).await {
                Ok(resolved) => values.merge(resolved),
                Err(e) => log::error!(
                    "Attribute '{}' failed for {}: {}",
                    target.name,
                    node.node.path(),
                    e
                ),
            }
        }

        if let Some(key) = model.class_name.as_deref().filter(|k| !k.trim().is_empty()) {
            match self.registry.content(key) {
                Some(extension) => match extension.extract(node, &session.source) {
                    Ok(extra) => values.merge(extra),
                    Err(e) => log::error!("Content extension '{}' failed: {}", key, e),
                },
                None => log::debug!("No content extension registered for '{}'", key),
            }
        }
        values
    }

    async fn resolve_target(
        &self,
        session: &Session,
        node: &EnvNode<'_>,
        target: &TargetAttr,
    ) -> Result<AttrValueMap> {
        if let Some(text) = target.text() {
            return Ok(AttrValueMap::single(&target.name, vec![text.to_string()], false));
        }
        if let Some(key) = target.extension_only() {
            let values = self.run_attribute_extension(key, target, None, node, session)?;
            return Ok(AttrValueMap::single(&target.name, values, false));
        }

        let mut values = AttrValueMap::new();
        let sources = target.source_attrs.as_deref().unwrap_or_default();
        for source in sources {
            values.merge(self.resolve_source(session, node, target, source).await?);
        }
        if sources.iter().any(|s| s.unique_values) {
            values.dedup(&target.name);
        }
        Ok(values)
    }

    async fn resolve_source(
        &self,
        session: &Session,
        node: &EnvNode<'_>,
        target: &TargetAttr,
        source: &SourceAttr,
    ) -> Result<AttrValueMap> {
        let mut values = match source.extension() {
            Some(key) => {
                let found = self.run_attribute_extension(key, target, Some(source), node, session)?;
                AttrValueMap::single(&target.name, found, false)
            }
            None => self.by_property(node, target, source),
        };

        if source.is_tags() {
            let tags: Vec<String> = match values.get(&target.name) {
                Some(from_target) => from_target.to_vec(),
                None => node
                    .node
                    .property(keys::CQ_TAGS)
                    .map(property_values)
                    .unwrap_or_default(),
            };
            let locale = session.source.locale_for_path(node.node.path());
            let facets = TagResolver::new(self.client)
                .resolve(session, locale, &tags)
                .await;
            values.merge(facets);
        }
        Ok(values)
    }

    fn by_property(&self, node: &EnvNode<'_>, target: &TargetAttr, source: &SourceAttr) -> AttrValueMap {
        let Some(value) = source.name.as_deref().and_then(|name| node.node.property(name)) else {
            return AttrValueMap::new();
        };
        if source.convert_html_to_text {
            return match tree::scalar_text(value) {
                Some(html) => AttrValueMap::single(&target.name, vec![html_to_text(&html)], false),
                None => AttrValueMap::new(),
            };
        }
        let found = property_values(value);
        if found.is_empty() {
            AttrValueMap::new()
        } else {
            AttrValueMap::single(&target.name, found, false)
        }
    }

    fn run_attribute_extension(
        &self,
        key: &str,
        target: &TargetAttr,
        source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        session: &Session,
    ) -> Result<Vec<String>> {
        match self.registry.attribute(key) {
            Some(extension) => extension
                .extract(target, source, node, &session.source)
                .map_err(|e| AppError::extension(key, e)),
            None => {
                log::debug!("No attribute extension registered for '{}'", key);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::AttributeExtractor;
    use crate::models::config::tests::sample_source;
    use crate::models::{
        ContentMapping, ContentNode, EngineConfig, Environment, LifecycleEvent, SourceConfig,
    };
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Failing;

    impl AttributeExtractor for Failing {
        fn extract(
            &self,
            _target: &TargetAttr,
            _source: Option<&SourceAttr>,
            _node: &EnvNode<'_>,
            _config: &SourceConfig,
        ) -> Result<Vec<String>> {
            Err(AppError::validation("boom"))
        }
    }

    fn mapping() -> ContentMapping {
        toml::from_str(
            r#"
            [[models]]
            type = "cq:Page"

            [[models.target_attrs]]
            name = "id"
            class_name = "content-id"

            [[models.target_attrs]]
            name = "abstract"
            text_value = "Fixed text"
            class_name = "content-id"

            [[models.target_attrs]]
            name = "title"
            source_attrs = [{ name = "jcr:title" }]

            [[models.target_attrs]]
            name = "keywords"
            source_attrs = [{ name = "keywords", unique_values = true }]

            [[models.target_attrs]]
            name = "body"
            source_attrs = [{ name = "body", convert_html_to_text = true }]

            [[models.target_attrs]]
            name = "broken"
            class_name = "failing"

            [[models.target_attrs]]
            name = "missing"
            source_attrs = [{ name = "nope" }]

            [[models.target_attrs]]
            name = "tags"
            source_attrs = [{ name = "cq:tags" }]
            "#,
        )
        .unwrap()
    }

    fn session(endpoint: &str) -> Session {
        let mut source = sample_source();
        source.endpoint = endpoint.to_string();
        source.mapping = mapping();
        Session::full_run(EngineConfig::default(), source)
    }

    fn page() -> ContentNode {
        ContentNode::parse(
            "/content/site/en/home",
            json!({
                "jcr:primaryType": "cq:Page",
                "jcr:content": {
                    "jcr:title": "Home",
                    "keywords": ["a", "b", "a"],
                    "body": "<p>Hello <b>world</b></p>",
                    "cq:tags": ["category:news", "malformed"]
                }
            }),
            LifecycleEvent::None,
            "/content",
        )
    }

    async fn taxonomy() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/_cq_tags/category.infinity.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jcr:title": "Category"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/content/_cq_tags/category/news.infinity.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jcr:title": "News",
                "jcr:title.pt_BR": "Notícias"
            })))
            .mount(&server)
            .await;
        server
    }

    fn registry() -> Registry {
        let mut registry = Registry::with_builtins();
        registry.register_attribute("failing", Failing);
        registry
    }

    #[tokio::test]
    async fn test_resolve_all_strategies() {
        let server = taxonomy().await;
        let session = session(&server.uri());
        let client = RepositoryClient::new(&EngineConfig::default()).unwrap();
        let registry = registry();
        let mapper = AttributeMapper::new(&registry, &client);
        let node = page();
        let env = EnvNode::new(&node, Environment::Authoring);

        let values = mapper.resolve(&session, &env).await;

        assert_eq!(values.get("id").unwrap(), &["/content/site/en/home".to_string()][..]);
        assert_eq!(values.get("abstract").unwrap(), &["Fixed text".to_string()][..]);
        assert_eq!(values.get("title").unwrap(), &["Home".to_string()][..]);
        assert_eq!(values.get("keywords").unwrap().len(), 2);
        assert_eq!(values.get("body").unwrap(), &["Hello world".to_string()][..]);
        assert!(!values.contains_key("broken"));
        assert!(!values.contains_key("missing"));
        assert_eq!(values.get("category").unwrap(), &["News".to_string()][..]);
        assert!(session.has_spec("category"));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let server = taxonomy().await;
        let session = session(&server.uri());
        let client = RepositoryClient::new(&EngineConfig::default()).unwrap();
        let registry = registry();
        let mapper = AttributeMapper::new(&registry, &client);
        let node = page();
        let env = EnvNode::new(&node, Environment::Authoring);

        let first = mapper.resolve(&session, &env).await;
        let second = mapper.resolve(&session, &env).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_tag_label_uses_locale_of_path() {
        let server = taxonomy().await;
        let session = session(&server.uri());
        let client = RepositoryClient::new(&EngineConfig::default()).unwrap();
        let registry = registry();
        let mapper = AttributeMapper::new(&registry, &client);
        let node = ContentNode::parse(
            "/content/site/pt/home",
            json!({ "jcr:content": { "cq:tags": ["category:news"] } }),
            LifecycleEvent::None,
            "/content",
        );
        let env = EnvNode::new(&node, Environment::Publishing);

        let values = mapper.resolve(&session, &env).await;
        assert_eq!(values.get("category").unwrap(), &["Notícias".to_string()][..]);
    }

    #[test]
    fn test_property_values() {
        assert_eq!(property_values(&json!(["x", 1, null])), vec!["x", "1"]);
        assert_eq!(property_values(&json!(true)), vec!["true"]);
        assert!(property_values(&json!(null)).is_empty());
    }
}
