// src/models/job.rs

//! Index job items and recorded index state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::mapping::AttributeSpec;

pub const ID_ATTR: &str = "id";
pub const SOURCE_APPS_ATTR: &str = "source_apps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobAction {
    Create,
    Delete,
}

/// One add/remove instruction for the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub action: JobAction,
    pub sites: Vec<String>,
    pub locale: String,
    /// Flattened attributes: a string, or a list once a key has several values
    pub attributes: Map<String, Value>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Field declarations for the attributes carried by a CREATE job
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<AttributeSpec>,
}

impl JobItem {
    /// Content id carried by the job, if any.
    pub fn object_id(&self) -> Option<&str> {
        self.attributes.get(ID_ATTR).and_then(Value::as_str)
    }

    /// Set the first value of `name`, or promote it to a list on later values.
    pub fn push_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.get_mut(name) {
            None => {
                self.attributes
                    .insert(name.to_string(), Value::String(value.to_string()));
            }
            Some(Value::Array(items)) => items.push(Value::String(value.to_string())),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value.to_string())]);
            }
        }
    }
}

/// A job plus the run context the sink needs to record it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub item: JobItem,
    pub source: String,
    pub provider: String,
    /// Cross-references of the node the job was built from
    pub dependencies: BTreeSet<String>,
    pub standalone: bool,
}

/// Previously recorded index entry for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub object_id: String,
    pub source: String,
    pub provider: String,
    pub environment: String,
    pub locale: String,
    pub sites: Vec<String>,
    pub checksum: String,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl IndexRecord {
    /// Record derived from an emitted CREATE job.
    pub fn from_envelope(envelope: &JobEnvelope) -> Option<Self> {
        let item = &envelope.item;
        if item.action != JobAction::Create {
            return None;
        }
        Some(Self {
            object_id: item.object_id()?.to_string(),
            source: envelope.source.clone(),
            provider: envelope.provider.clone(),
            environment: item.environment.clone(),
            locale: item.locale.clone(),
            sites: item.sites.clone(),
            checksum: item.checksum.clone().unwrap_or_default(),
            dependencies: envelope.dependencies.clone(),
        })
    }

    /// Same object, environment, locale and sites.
    pub fn same_entry(&self, other: &IndexRecord) -> bool {
        self.object_id == other.object_id
            && self.source == other.source
            && self.provider == other.provider
            && self.environment == other.environment
            && self.locale == other.locale
            && self.sites == other.sites
    }

    /// Whether a DELETE job removes this entry.
    pub fn removed_by(&self, item: &JobItem) -> bool {
        item.action == JobAction::Delete
            && item.object_id() == Some(self.object_id.as_str())
            && item.environment == self.environment
            && item.locale == self.locale
            && item.sites.iter().any(|site| self.sites.contains(site))
    }
}
