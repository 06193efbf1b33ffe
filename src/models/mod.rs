// src/models/mod.rs

//! Domain models for the connector.
//!
//! Configuration, the parsed node view, mapping definitions, resolved
//! attribute values, per-run session state and the emitted job items.

mod attr_map;
pub(crate) mod config;
mod job;
pub mod keys;
mod mapping;
mod node;
mod session;
pub mod tree;

// Re-export all public types
pub use attr_map::{AttrValueMap, AttrValues};
pub use config::{Config, EngineConfig, LocalePath, MAX_PARALLELISM, SourceConfig};
pub use job::{ID_ATTR, IndexRecord, JobAction, JobEnvelope, JobItem, SOURCE_APPS_ATTR};
pub use mapping::{AttributeSpec, ContentMapping, Model, SourceAttr, TargetAttr};
pub use node::{ContentNode, EnvNode, Environment, LifecycleEvent, parse_repository_date};
pub use session::Session;
