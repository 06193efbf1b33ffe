// src/pipeline/mod.rs

//! Entry points for synchronization runs.
//!
//! - `Connector::index_all`: full run over a source from its root path
//! - `Connector::index_paths`: on-demand run over explicit paths or URLs

pub mod connector;

pub use connector::{Connector, PathsRequest, URL_ID_RESOLVER};
