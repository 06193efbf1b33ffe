// src/models/mapping.rs

//! Declarative attribute mapping definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::keys;

/// Trimmed, non-empty value of an optional string.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Where one value of a target attribute comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceAttr {
    /// Property name on the content object or extracted attributes
    #[serde(default)]
    pub name: Option<String>,

    /// Extension key resolving this source
    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub convert_html_to_text: bool,

    #[serde(default)]
    pub unique_values: bool,
}

impl SourceAttr {
    pub fn extension(&self) -> Option<&str> {
        non_blank(&self.class_name)
    }

    pub fn is_tags(&self) -> bool {
        self.name.as_deref() == Some(keys::CQ_TAGS)
    }
}

/// One output attribute of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetAttr {
    pub name: String,

    /// Literal value used verbatim
    #[serde(default)]
    pub text_value: Option<String>,

    /// Extension key resolving the whole attribute
    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub source_attrs: Option<Vec<SourceAttr>>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub facet: bool,

    #[serde(default)]
    pub facet_name: BTreeMap<String, String>,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default)]
    pub multi_valued: bool,

    #[serde(default, rename = "type")]
    pub attr_type: Option<String>,
}

impl TargetAttr {
    /// Resolved entirely by its own extension.
    pub fn extension_only(&self) -> Option<&str> {
        match self.source_attrs {
            None => non_blank(&self.class_name),
            Some(_) => None,
        }
    }

    /// Literal text, when non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text_value.as_deref().filter(|s| !s.is_empty())
    }

    fn apply_definition(&mut self, spec: &AttributeSpec) {
        if self.name.trim().is_empty() {
            self.name = spec.name.clone();
        }
        if let Some(class_name) = non_blank(&spec.class_name) {
            match self.source_attrs.as_mut().filter(|sources| !sources.is_empty()) {
                Some(sources) => {
                    for source in sources.iter_mut().filter(|s| s.extension().is_none()) {
                        source.class_name = Some(class_name.to_string());
                    }
                }
                None => {
                    self.source_attrs = Some(vec![SourceAttr {
                        class_name: Some(class_name.to_string()),
                        ..SourceAttr::default()
                    }]);
                    self.class_name = Some(class_name.to_string());
                }
            }
        }
        self.description = spec.description.clone();
        self.facet = spec.facet;
        self.facet_name = spec.facet_name.clone();
        self.mandatory = spec.mandatory;
        self.multi_valued = spec.multi_valued;
        self.attr_type = Some(spec.attr_type.clone());
    }
}

/// Field declaration for the downstream index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,

    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default = "default_attr_type", rename = "type")]
    pub attr_type: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub facet: bool,

    /// Facet label per locale, plus `default`
    #[serde(default)]
    pub facet_name: BTreeMap<String, String>,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default)]
    pub multi_valued: bool,
}

fn default_attr_type() -> String {
    "STRING".into()
}

impl AttributeSpec {
    /// Multi-valued, non-mandatory string facet.
    pub fn tag_facet(name: &str, labels: BTreeMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            class_name: None,
            attr_type: default_attr_type(),
            description: labels.get(keys::DEFAULT_LABEL).cloned(),
            facet: true,
            facet_name: labels,
            mandatory: false,
            multi_valued: true,
        }
    }
}

/// Target attributes for one content type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "type")]
    pub content_type: String,

    /// Asset flavor: `contentFragment` or `static-file`
    #[serde(default)]
    pub sub_type: Option<String>,

    /// Content extractor extension key
    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub target_attrs: Vec<TargetAttr>,
}

/// Full mapping definition of a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMapping {
    /// Delta-date extension key
    #[serde(default)]
    pub delta_class_name: Option<String>,

    #[serde(default)]
    pub models: Vec<Model>,

    #[serde(default)]
    pub target_attr_definitions: Vec<AttributeSpec>,
}

impl Model {
    pub fn sub_type(&self) -> Option<&str> {
        non_blank(&self.sub_type)
    }
}

impl ContentMapping {
    pub fn delta_extension(&self) -> Option<&str> {
        non_blank(&self.delta_class_name)
    }

    /// The model for `content_type` with mapping-level definitions merged in.
    ///
    /// Definitions come first (in definition order), then model-only targets.
    pub fn model_for(&self, content_type: &str) -> Option<Model> {
        let model = self.models.iter().find(|m| m.content_type == content_type)?;

        let mut targets: Vec<TargetAttr> = Vec::new();
        for spec in &self.target_attr_definitions {
            match model.target_attrs.iter().find(|t| t.name == spec.name) {
                Some(existing) => {
                    let mut target = existing.clone();
                    target.apply_definition(spec);
                    targets.push(target);
                }
                None if spec.mandatory => {
                    let mut target = TargetAttr::default();
                    target.apply_definition(spec);
                    targets.push(target);
                }
                None => {}
            }
        }
        for target in &model.target_attrs {
            if !targets.iter().any(|t| t.name == target.name) {
                targets.push(target.clone());
            }
        }

        Some(Model {
            content_type: model.content_type.clone(),
            sub_type: model.sub_type.clone(),
            class_name: model.class_name.clone(),
            target_attrs: targets,
        })
    }
}
