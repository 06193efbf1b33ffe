// src/extensions/builtin.rs

//! Extensions available under stable keys without configuration.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::extensions::{AttributeExtractor, DeltaDateExtractor, UrlResolver};
use crate::models::{EnvNode, SourceAttr, SourceConfig, TargetAttr, keys, tree};
use crate::utils::html_to_text;
use crate::utils::url::id_from_url;

const ROOT: &str = "root";
const TEXT: &str = "text";
const RESPONSIVE_GRID: &str = "wcm/foundation/components/responsivegrid";

fn iso(date: DateTime<Utc>) -> String {
    date.format(keys::ISO_DATE_FORMAT).to_string()
}

/// Change fingerprint: last modified, else created, else now.
pub fn default_delta_date(node: &EnvNode<'_>) -> DateTime<Utc> {
    node.node
        .last_modified_at
        .or(node.node.created_at)
        .unwrap_or_else(Utc::now)
}

/// Node path as content id.
pub struct ContentId;

impl AttributeExtractor for ContentId {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        Ok(vec![node.node.path().to_string()])
    }
}

/// Public page URL of the node in its environment.
pub struct ContentUrl;

impl ContentUrl {
    pub fn url(node: &EnvNode<'_>, config: &SourceConfig) -> String {
        format!(
            "{}{}{}",
            node.url_prefix(config),
            node.node.path(),
            keys::HTML_EXTENSION
        )
    }
}

impl AttributeExtractor for ContentUrl {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        config: &SourceConfig,
    ) -> Result<Vec<String>> {
        Ok(vec![Self::url(node, config)])
    }
}

impl UrlResolver for ContentUrl {
    fn id_from_url(&self, url: &str, _config: &SourceConfig) -> Result<String> {
        id_from_url(url).ok_or_else(|| AppError::extension("url-id", format!("invalid URL '{url}'")))
    }
}

/// Node type, e.g. `cq:Page`.
pub struct TypeName;

impl AttributeExtractor for TypeName {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        Ok(vec![node.node.node_type.clone()])
    }
}

pub struct CreationDate;

impl AttributeExtractor for CreationDate {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        Ok(node.node.created_at.map(iso).into_iter().collect())
    }
}

/// Last modification, falling back to creation.
pub struct ModificationDate;

impl AttributeExtractor for ModificationDate {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        Ok(node
            .node
            .last_modified_at
            .or(node.node.created_at)
            .map(iso)
            .into_iter()
            .collect())
    }
}

/// Last replication to publish; now when never replicated.
pub struct PublicationDate;

impl AttributeExtractor for PublicationDate {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        Ok(vec![iso(node.node.publication_at.unwrap_or_else(Utc::now))])
    }
}

/// Plain text of the HTML held by the source property.
pub struct HtmlToText;

impl AttributeExtractor for HtmlToText {
    fn extract(
        &self,
        _target: &TargetAttr,
        source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        let text = source
            .and_then(|s| s.name.as_deref())
            .and_then(|name| node.node.property(name))
            .and_then(tree::scalar_text)
            .map(|html| html_to_text(&html));
        Ok(text.into_iter().collect())
    }
}

/// Text of the responsive-grid components under the page root.
pub struct PageComponents;

impl PageComponents {
    fn component_html(component: &Map<String, Value>, out: &mut String) {
        if let Some(text) = tree::str_prop(component, TEXT) {
            out.push_str(text);
        }
        for (key, value) in component {
            if key.starts_with(keys::JCR_PREFIX) || key.starts_with(keys::SLING_PREFIX) {
                continue;
            }
            if let Some(child) = value.as_object() {
                Self::component_html(child, out);
            }
        }
    }
}

impl AttributeExtractor for PageComponents {
    fn extract(
        &self,
        _target: &TargetAttr,
        _source: Option<&SourceAttr>,
        node: &EnvNode<'_>,
        _config: &SourceConfig,
    ) -> Result<Vec<String>> {
        let Some(root) = node.node.content().get(ROOT).and_then(Value::as_object) else {
            log::debug!("No root node found in content of {}", node.node.path());
            return Ok(Vec::new());
        };

        let components: Vec<String> = root
            .values()
            .filter_map(Value::as_object)
            .filter(|grid| tree::str_prop(grid, keys::SLING_RESOURCE_TYPE) == Some(RESPONSIVE_GRID))
            .filter_map(|grid| {
                let mut html = String::new();
                Self::component_html(grid, &mut html);
                let text = html_to_text(&html);
                (!text.is_empty()).then_some(text)
            })
            .collect();

        log::debug!(
            "Extracted {} components from {}",
            components.len(),
            node.node.path()
        );
        if components.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![components.join("\n")])
    }
}

/// Default change fingerprint.
pub struct DeltaDate;

impl DeltaDateExtractor for DeltaDate {
    fn delta_date(&self, node: &EnvNode<'_>, _config: &SourceConfig) -> Result<DateTime<Utc>> {
        Ok(default_delta_date(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::tests::sample_source;
    use crate::models::{ContentNode, Environment, LifecycleEvent};
    use serde_json::json;

    fn node(raw: Value) -> ContentNode {
        ContentNode::parse("/content/site/en/home", raw, LifecycleEvent::None, "/content")
    }

    fn target() -> TargetAttr {
        TargetAttr {
            name: "t".into(),
            ..TargetAttr::default()
        }
    }

    #[test]
    fn test_content_url_per_environment() {
        let config = sample_source();
        let n = node(json!({}));
        let author = EnvNode::new(&n, Environment::Authoring);
        let publish = EnvNode::new(&n, Environment::Publishing);
        assert_eq!(
            ContentUrl.extract(&target(), None, &author, &config).unwrap(),
            vec!["http://author.example.com/content/site/en/home.html"]
        );
        assert_eq!(
            ContentUrl.extract(&target(), None, &publish, &config).unwrap(),
            vec!["https://www.example.com/content/site/en/home.html"]
        );
        assert_eq!(
            ContentUrl
                .id_from_url("https://www.example.com/content/site/en/home.html", &config)
                .unwrap(),
            "/content/site/en/home"
        );
    }

    #[test]
    fn test_dates() {
        let config = sample_source();
        let n = node(json!({
            "jcr:created": "Mon Jan 15 2024 10:30:00 GMT+0000",
            "jcr:content": { "jcr:title": "x" }
        }));
        let env = EnvNode::new(&n, Environment::Authoring);
        assert_eq!(
            CreationDate.extract(&target(), None, &env, &config).unwrap(),
            vec!["2024-01-15T10:30:00Z"]
        );
        assert_eq!(
            ModificationDate.extract(&target(), None, &env, &config).unwrap(),
            vec!["2024-01-15T10:30:00Z"]
        );
        assert_eq!(
            PublicationDate.extract(&target(), None, &env, &config).unwrap().len(),
            1
        );

        let bare = node(json!({}));
        let env = EnvNode::new(&bare, Environment::Authoring);
        assert!(CreationDate.extract(&target(), None, &env, &config).unwrap().is_empty());
    }

    #[test]
    fn test_delta_date_preference() {
        let config = sample_source();
        let n = node(json!({
            "jcr:created": "Mon Jan 15 2024 10:30:00 GMT+0000",
            "jcr:content": { "cq:lastModified": "Wed Mar 20 2024 14:00:00 GMT+0000" }
        }));
        let env = EnvNode::new(&n, Environment::Authoring);
        assert_eq!(
            iso(DeltaDate.delta_date(&env, &config).unwrap()),
            "2024-03-20T14:00:00Z"
        );

        let created_only = node(json!({ "jcr:created": "Mon Jan 15 2024 10:30:00 GMT+0000" }));
        let env = EnvNode::new(&created_only, Environment::Authoring);
        assert_eq!(
            iso(DeltaDate.delta_date(&env, &config).unwrap()),
            "2024-01-15T10:30:00Z"
        );

        let before = Utc::now();
        let none = node(json!({}));
        let env = EnvNode::new(&none, Environment::Authoring);
        assert!(DeltaDate.delta_date(&env, &config).unwrap() >= before);
    }

    #[test]
    fn test_html_to_text_reads_property() {
        let config = sample_source();
        let n = node(json!({ "jcr:content": { "body": "<p>Hello <i>there</i></p>" } }));
        let env = EnvNode::new(&n, Environment::Authoring);
        let source = SourceAttr {
            name: Some("body".into()),
            ..SourceAttr::default()
        };
        assert_eq!(
            HtmlToText.extract(&target(), Some(&source), &env, &config).unwrap(),
            vec!["Hello there"]
        );
        assert!(HtmlToText.extract(&target(), None, &env, &config).unwrap().is_empty());
    }

    #[test]
    fn test_page_components() {
        let config = sample_source();
        let n = node(json!({ "jcr:content": { "root": {
            "container": {
                "sling:resourceType": "wcm/foundation/components/responsivegrid",
                "title": { "text": "<h1>Welcome</h1>" },
                "jcr:ignored": { "text": "hidden" },
                "body": { "inner": { "text": "<p>Body copy</p>" } }
            },
            "other": {
                "sling:resourceType": "site/components/teaser",
                "text": "not a grid"
            }
        }}}));
        let env = EnvNode::new(&n, Environment::Authoring);
        assert_eq!(
            PageComponents.extract(&target(), None, &env, &config).unwrap(),
            vec!["Welcome Body copy"]
        );
    }
}
