// src/models/session.rs

//! Per-run traversal state.

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::models::config::{EngineConfig, SourceConfig};
use crate::models::mapping::{AttributeSpec, Model};
use crate::models::node::LifecycleEvent;

/// Transient state of one traversal run.
///
/// Everything is fixed at construction except the attribute-spec list,
/// which grows as tag facets are discovered.
#[derive(Debug)]
pub struct Session {
    pub engine: EngineConfig,
    pub source: SourceConfig,
    /// Model of the configured content type, with definitions merged in
    pub model: Option<Model>,
    pub event: LifecycleEvent,
    /// On-demand run (explicit paths) rather than a full background pass
    pub standalone: bool,
    pub index_children: bool,
    pub site_name: Option<String>,
    attribute_specs: Mutex<Vec<AttributeSpec>>,
}

impl Session {
    pub fn new(
        engine: EngineConfig,
        source: SourceConfig,
        event: LifecycleEvent,
        standalone: bool,
        index_children: bool,
    ) -> Self {
        let model = source.mapping.model_for(&source.content_type);
        let specs = source.mapping.target_attr_definitions.clone();
        let site_name = source
            .site_name
            .clone()
            .filter(|name| !name.trim().is_empty());
        Self {
            engine,
            source,
            model,
            event,
            standalone,
            index_children,
            site_name,
            attribute_specs: Mutex::new(specs),
        }
    }

    /// Full background run over the whole source.
    pub fn full_run(engine: EngineConfig, source: SourceConfig) -> Self {
        Self::new(engine, source, LifecycleEvent::None, false, true)
    }

    /// On-demand run over explicit paths.
    pub fn paths_run(
        engine: EngineConfig,
        source: SourceConfig,
        event: LifecycleEvent,
        recursive: bool,
    ) -> Self {
        Self::new(engine, source, event, true, recursive)
    }

    /// Copy of this session for a dependency cascade: same source, event NONE.
    pub fn cascade(&self) -> Self {
        let mut session = Self::new(
            self.engine.clone(),
            self.source.clone(),
            LifecycleEvent::None,
            true,
            false,
        );
        session.site_name = self.site_name.clone();
        *session.specs_mut() = self.attribute_specs();
        session
    }

    pub fn with_site_name(mut self, site_name: Option<String>) -> Self {
        if self.site_name.is_none() {
            self.site_name = site_name.filter(|name| !name.trim().is_empty());
        }
        self
    }

    fn specs_mut(&self) -> std::sync::MutexGuard<'_, Vec<AttributeSpec>> {
        self.attribute_specs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the known attribute specs.
    pub fn attribute_specs(&self) -> Vec<AttributeSpec> {
        self.specs_mut().clone()
    }

    pub fn has_spec(&self, name: &str) -> bool {
        self.specs_mut().iter().any(|spec| spec.name == name)
    }

    /// Register a spec unless one with the same name exists. Returns whether it was added.
    pub fn register_spec(&self, spec: AttributeSpec) -> bool {
        let mut specs = self.specs_mut();
        if specs.iter().any(|known| known.name == spec.name) {
            return false;
        }
        specs.push(spec);
        true
    }

    /// Specs describing the given job attributes, in attribute order.
    pub fn specs_for(&self, attributes: &Map<String, Value>) -> Vec<AttributeSpec> {
        let specs = self.specs_mut();
        attributes
            .keys()
            .filter_map(|key| specs.iter().find(|spec| &spec.name == key).cloned())
            .collect()
    }

    pub fn provider(&self) -> &str {
        &self.source.provider_name
    }
}
