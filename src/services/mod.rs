// src/services/mod.rs

//! Service layer for the connector.
//!
//! - Repository fetch with response cache (`RepositoryClient`)
//! - Attribute mapping and tag taxonomy (`AttributeMapper`, `TagResolver`)
//! - Delta and job construction (`JobBuilder`)
//! - Tree traversal (`Navigator`)

pub mod fetch;
pub mod jobs;
pub mod mapping;
pub mod navigator;
pub mod tags;

pub use fetch::{RepositoryClient, ResponseCache};
pub use jobs::{JobBuilder, build_delete_job, data_path, is_eligible};
pub use mapping::AttributeMapper;
pub use navigator::{ExecutionStrategy, Navigator, OnceFilter, RunGuard, RunningSources};
pub use tags::{TagResolver, pick_label, tag_labels};
