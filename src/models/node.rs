// src/models/node.rs

//! Typed view over one repository node.
//!
//! A [`ContentNode`] is parsed from the node's `.infinity.json` subtree.
//! Parsing never fails: unparseable dates are logged and left absent, and a
//! missing `jcr:content` object leaves the content-derived fields at their
//! defaults.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::config::SourceConfig;
use crate::models::keys;
use crate::models::tree;

/// Lifecycle event attached to an explicit-paths request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    #[default]
    None,
    Publishing,
    Unpublishing,
    Deindexing,
}

impl FromStr for LifecycleEvent {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Ok(Self::None),
            "PUBLISHING" => Ok(Self::Publishing),
            "UNPUBLISHING" => Ok(Self::Unpublishing),
            "DEINDEXING" => Ok(Self::Deindexing),
            other => Err(AppError::validation(format!("unknown event '{other}'"))),
        }
    }
}

/// Which repository environment a node is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Authoring,
    Publishing,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authoring => "authoring",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a repository date such as `Mon Feb 26 2024 12:00:00 GMT+0000`.
///
/// Trailing text after the offset (e.g. a zone name in parentheses) is ignored.
pub fn parse_repository_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::<FixedOffset>::parse_and_remainder(value.trim(), keys::REPOSITORY_DATE_FORMAT)
        .ok()
        .map(|(date, _)| date.with_timezone(&Utc))
}

/// Parsed view of one repository path.
#[derive(Debug, Clone)]
pub struct ContentNode {
    path: String,
    url: String,
    pub node_type: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub publication_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub content_fragment: bool,
    pub title: String,
    pub template: String,
    pub model: Option<String>,
    pub dependencies: BTreeSet<String>,
    pub attributes: Map<String, Value>,
    raw: Map<String, Value>,
    content: Map<String, Value>,
}

impl ContentNode {
    /// Parse a node's JSON subtree.
    ///
    /// `content_root` is the prefix that marks a string as a cross-reference.
    pub fn parse(path: &str, raw: Value, event: LifecycleEvent, content_root: &str) -> Self {
        let dependencies = tree::strings_with_prefix(&raw, content_root);
        let raw = match raw {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let mut node = Self {
            path: path.to_string(),
            url: format!("{path}{}", keys::HTML_EXTENSION),
            node_type: tree::str_prop(&raw, keys::JCR_PRIMARY_TYPE)
                .unwrap_or_default()
                .to_string(),
            created_at: None,
            last_modified_at: None,
            publication_at: None,
            delivered: false,
            content_fragment: false,
            title: String::new(),
            template: String::new(),
            model: None,
            dependencies,
            attributes: Map::new(),
            content: Map::new(),
            raw,
        };

        if let Some(content) = node.raw.get(keys::JCR_CONTENT).and_then(Value::as_object) {
            node.content = content.clone();
            node.apply_content(event);
        }
        if let Some(created) = tree::str_prop(&node.raw, keys::JCR_CREATED) {
            node.created_at = node.date_or_warn(created, "created");
        }
        node
    }

    fn apply_content(&mut self, event: LifecycleEvent) {
        self.delivered = match event {
            LifecycleEvent::Publishing => {
                log::info!("Overriding publishing status for path: {}", self.path);
                true
            }
            LifecycleEvent::Unpublishing => {
                log::info!("Overriding unpublishing status for path: {}", self.path);
                false
            }
            LifecycleEvent::None | LifecycleEvent::Deindexing => {
                self.is_activated(keys::CQ_LAST_REPLICATION_ACTION)
                    && self.is_activated(keys::CQ_LAST_REPLICATION_ACTION_PUBLISH)
            }
        };

        self.template = tree::str_prop(&self.content, keys::CQ_TEMPLATE)
            .unwrap_or_default()
            .to_string();
        self.title = tree::str_prop(&self.content, keys::JCR_TITLE)
            .unwrap_or_default()
            .to_string();
        self.content_fragment = self
            .content
            .get(keys::CONTENT_FRAGMENT)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.model = self
            .content
            .get(keys::DATA_FOLDER)
            .and_then(Value::as_object)
            .and_then(|data| tree::str_prop(data, keys::CQ_MODEL))
            .map(str::to_string);

        self.last_modified_at = self
            .first_present(&[keys::JCR_LAST_MODIFIED, keys::CQ_LAST_MODIFIED])
            .and_then(|value| self.date_or_warn(value, "last modified"));
        self.publication_at = match self
            .first_present(&[keys::CQ_LAST_REPLICATED_PUBLISH, keys::CQ_LAST_REPLICATED])
        {
            Some(value) => self.date_or_warn(value, "publication"),
            None => Some(Utc::now()),
        };
    }

    fn is_activated(&self, key: &str) -> bool {
        tree::str_prop(&self.content, key) == Some(keys::ACTIVATE)
    }

    fn first_present(&self, candidates: &[&str]) -> Option<&str> {
        candidates
            .iter()
            .find_map(|key| tree::str_prop(&self.content, key))
    }

    fn date_or_warn(&self, value: &str, label: &str) -> Option<DateTime<Utc>> {
        let parsed = parse_repository_date(value);
        if parsed.is_none() {
            log::warn!(
                "Failed to parse {} date '{}' for path: {}",
                label,
                value,
                self.path
            );
        }
        parsed
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The full raw subtree.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// The `jcr:content` object, empty when the node has none.
    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    pub fn has_content(&self) -> bool {
        self.raw.contains_key(keys::JCR_CONTENT)
    }

    /// Property from the content object, else from the extracted attributes.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.content
            .get(name)
            .or_else(|| self.attributes.get(name))
    }

    /// Project the object at `data_path` (relative to `jcr:content`) onto
    /// [`ContentNode::attributes`].
    ///
    /// On a missing or non-object segment the attributes are left unchanged.
    pub fn set_data_path(&mut self, data_path: &str) {
        if data_path.trim().is_empty() {
            log::warn!("Data path is empty for object at path: {}", self.path);
            return;
        }
        let target = match tree::descend(&self.content, data_path) {
            Ok(target) => target,
            Err(segment) => {
                log::warn!(
                    "Node '{}' not found or not an object in data path '{}' for object at path: {}",
                    segment,
                    data_path,
                    self.path
                );
                return;
            }
        };

        log::debug!(
            "Extracting attributes from data path: {} for object at path: {}",
            data_path,
            self.path
        );
        let extracted: Vec<(String, Value)> = target
            .iter()
            .filter(|(key, _)| !key.ends_with(keys::LAST_MODIFIED_SUFFIX))
            .map(|(key, value)| (key.clone(), normalize_date_value(value)))
            .collect();
        self.attributes.extend(extracted);
    }

    /// Whether the node's type equals the source's content-type filter.
    pub fn matches_content_type(&self, source: &SourceConfig) -> bool {
        self.node_type == source.content_type
    }

    /// Site display name from the content title.
    pub fn site_name(&self) -> Option<&str> {
        tree::str_prop(&self.content, keys::JCR_TITLE)
    }
}

impl PartialEq for ContentNode {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

fn normalize_date_value(value: &Value) -> Value {
    match value {
        Value::String(s) => match parse_repository_date(s) {
            Some(date) => Value::String(date.format(keys::ISO_DATE_FORMAT).to_string()),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// A node evaluated for one environment.
#[derive(Debug, Clone, Copy)]
pub struct EnvNode<'a> {
    pub node: &'a ContentNode,
    pub environment: Environment,
}

impl<'a> EnvNode<'a> {
    pub fn new(node: &'a ContentNode, environment: Environment) -> Self {
        Self { node, environment }
    }

    /// URL prefix of the environment.
    pub fn url_prefix<'s>(&self, source: &'s SourceConfig) -> &'s str {
        match self.environment {
            Environment::Authoring => &source.author_url_prefix,
            Environment::Publishing => &source.publish_url_prefix,
        }
    }

    /// Target site of the environment.
    pub fn site<'s>(&self, source: &'s SourceConfig) -> &'s str {
        match self.environment {
            Environment::Authoring => &source.author_site,
            Environment::Publishing => &source.publish_site,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn page_json() -> Value {
        json!({
            "jcr:primaryType": "cq:Page",
            "jcr:created": "Mon Feb 26 2024 12:00:00 GMT+0000",
            "jcr:content": {
                "jcr:title": "Home",
                "cq:template": "/conf/site/templates/page",
                "cq:lastReplicationAction": "Activate",
                "cq:lastReplicationAction_publish": "Activate",
                "cq:lastModified": "Tue Feb 27 2024 08:30:00 GMT+0100",
                "cq:lastReplicated": "Wed Feb 28 2024 10:00:00 GMT+0000",
                "link": "/content/site/en/about",
                "data": { "cq:model": "/conf/site/models/article" }
            },
            "child": { "ref": ["/content/dam/logo.png", "/etc/other"] }
        })
    }

    #[test]
    fn test_parse_page() {
        let node = ContentNode::parse(
            "/content/site/en/home",
            page_json(),
            LifecycleEvent::None,
            "/content",
        );
        assert_eq!(node.url(), "/content/site/en/home.html");
        assert_eq!(node.node_type, "cq:Page");
        assert_eq!(node.title, "Home");
        assert_eq!(node.template, "/conf/site/templates/page");
        assert_eq!(node.model.as_deref(), Some("/conf/site/models/article"));
        assert!(node.delivered);
        assert!(!node.content_fragment);
        assert_eq!(
            node.created_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 26, 12, 0, 0).unwrap())
        );
        assert_eq!(
            node.last_modified_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 27, 7, 30, 0).unwrap())
        );
        assert_eq!(
            node.publication_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 28, 10, 0, 0).unwrap())
        );
        assert!(node.dependencies.contains("/content/site/en/about"));
        assert!(node.dependencies.contains("/content/dam/logo.png"));
        assert!(!node.dependencies.contains("/etc/other"));
    }

    #[test]
    fn test_event_overrides_delivered() {
        let unpublished =
            ContentNode::parse("/p", page_json(), LifecycleEvent::Unpublishing, "/content");
        assert!(!unpublished.delivered);

        let mut raw = page_json();
        raw["jcr:content"]["cq:lastReplicationAction_publish"] = json!("Deactivate");
        let not_delivered = ContentNode::parse("/p", raw.clone(), LifecycleEvent::None, "/content");
        assert!(!not_delivered.delivered);
        let forced = ContentNode::parse("/p", raw, LifecycleEvent::Publishing, "/content");
        assert!(forced.delivered);
    }

    #[test]
    fn test_bad_dates_are_absent() {
        let raw = json!({
            "jcr:created": "yesterday",
            "jcr:content": { "jcr:lastModified": "not a date" }
        });
        let node = ContentNode::parse("/p", raw, LifecycleEvent::None, "/content");
        assert!(node.created_at.is_none());
        assert!(node.last_modified_at.is_none());
    }

    #[test]
    fn test_no_content_defaults() {
        let node = ContentNode::parse(
            "/p",
            json!({"jcr:primaryType": "nt:folder"}),
            LifecycleEvent::Publishing,
            "/content",
        );
        assert!(!node.delivered);
        assert!(node.title.is_empty());
        assert!(node.publication_at.is_none());
        assert!(!node.has_content());
    }

    #[test]
    fn test_publication_falls_back_to_now() {
        let raw = json!({ "jcr:content": { "jcr:title": "x" } });
        let node = ContentNode::parse("/p", raw, LifecycleEvent::None, "/content");
        assert!(node.publication_at.is_some());
        assert!(node.last_modified_at.is_none());
    }

    #[test]
    fn test_set_data_path() {
        let raw = json!({
            "jcr:content": {
                "contentFragment": true,
                "data": { "master": {
                    "headline": "Hi",
                    "headline@LastModified": 1700000000,
                    "published": "Mon Feb 26 2024 12:00:00 GMT+0000"
                }}
            }
        });
        let mut node = ContentNode::parse("/p", raw, LifecycleEvent::None, "/content");
        assert!(node.content_fragment);

        node.set_data_path("data/missing");
        assert!(node.attributes.is_empty());

        node.set_data_path("data/master");
        assert_eq!(node.attributes.get("headline"), Some(&json!("Hi")));
        assert!(!node.attributes.contains_key("headline@LastModified"));
        assert_eq!(
            node.attributes.get("published"),
            Some(&json!("2024-02-26T12:00:00Z"))
        );
        assert_eq!(node.property("headline"), Some(&json!("Hi")));
    }

    #[test]
    fn test_lifecycle_event_from_str() {
        assert_eq!(
            "publishing".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::Publishing
        );
        assert_eq!(
            "".parse::<LifecycleEvent>().unwrap(),
            LifecycleEvent::None
        );
        assert!("bogus".parse::<LifecycleEvent>().is_err());
    }
}
