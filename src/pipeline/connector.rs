// src/pipeline/connector.rs

//! Long-lived connector: owns the shared client, extension registry,
//! collaborators and running-sources guard, and builds one session per run.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::extensions::Registry;
use crate::models::{ContentNode, EngineConfig, LifecycleEvent, Session, SourceConfig};
use crate::services::{
    ExecutionStrategy, JobBuilder, Navigator, RepositoryClient, RunningSources,
};
use crate::storage::{IndexingContext, JobSink};

/// Resolver key used to turn page URLs into content ids.
pub const URL_ID_RESOLVER: &str = "url-id";

/// An explicit-paths request.
#[derive(Debug, Clone)]
pub struct PathsRequest {
    pub paths: Vec<String>,
    pub event: LifecycleEvent,
    /// Visit children of the requested nodes
    pub recursive: bool,
    /// `paths` are public URLs rather than content ids
    pub urls: bool,
}

impl PathsRequest {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths,
            event: LifecycleEvent::None,
            recursive: false,
            urls: false,
        }
    }
}

pub struct Connector {
    engine: EngineConfig,
    registry: Registry,
    client: RepositoryClient,
    sink: Arc<dyn JobSink>,
    context: Arc<dyn IndexingContext>,
    running: RunningSources,
}

impl Connector {
    pub fn new(
        engine: EngineConfig,
        registry: Registry,
        sink: Arc<dyn JobSink>,
        context: Arc<dyn IndexingContext>,
    ) -> Result<Self> {
        Ok(Self {
            client: RepositoryClient::new(&engine)?,
            engine,
            registry,
            sink,
            context,
            running: RunningSources::new(),
        })
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn client(&self) -> &RepositoryClient {
        &self.client
    }

    pub fn running(&self) -> &RunningSources {
        &self.running
    }

    fn navigator(&self) -> Navigator<'_> {
        let jobs = JobBuilder::new(
            &self.registry,
            &self.client,
            self.sink.as_ref(),
            self.context.as_ref(),
        );
        Navigator::new(
            &self.client,
            jobs,
            self.sink.as_ref(),
            self.context.as_ref(),
            &self.running,
            ExecutionStrategy::from_config(&self.engine),
        )
    }

    /// Site display name: configured, else the title of the root node.
    async fn site_name(&self, source: &SourceConfig) -> Option<String> {
        if source.site_name.is_some() {
            return source.site_name.clone();
        }
        let raw = self.client.fetch(source, &source.root_path, true).await?;
        let root = ContentNode::parse(
            &source.root_path,
            Value::Object(raw),
            LifecycleEvent::None,
            &self.engine.content_root,
        );
        root.site_name().map(str::to_string)
    }

    /// Index every eligible node of `source`.
    ///
    /// Returns false when a full run of the source was already in progress.
    pub async fn index_all(&self, source: &SourceConfig) -> bool {
        log::info!("Executing IndexAll command for source: {}", source.name);
        let site_name = self.site_name(source).await;
        let session = Session::full_run(self.engine.clone(), source.clone()).with_site_name(site_name);
        self.navigator().run_full(&session).await
    }

    /// Index (or de-index) an explicit list of paths of `source`.
    pub async fn index_paths(&self, source: &SourceConfig, request: PathsRequest) {
        let paths = if request.urls {
            self.ids_from_urls(source, &request.paths)
        } else {
            request
                .paths
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .collect()
        };
        if paths.is_empty() {
            log::warn!("No paths to index for source: {}", source.name);
            return;
        }

        log::info!(
            "Executing IndexPaths command for {} paths in source: {}",
            paths.len(),
            source.name
        );
        let site_name = self.site_name(source).await;
        let session = Session::paths_run(
            self.engine.clone(),
            source.clone(),
            request.event,
            request.recursive,
        )
        .with_site_name(site_name);
        self.navigator().run_paths(&session, &paths).await;
    }

    /// Content ids of page URLs; unresolvable and blank entries are dropped.
    pub fn ids_from_urls(&self, source: &SourceConfig, urls: &[String]) -> Vec<String> {
        let Some(resolver) = self.registry.url_resolver(URL_ID_RESOLVER) else {
            log::warn!("No URL resolver registered for '{}'", URL_ID_RESOLVER);
            return Vec::new();
        };
        urls.iter()
            .filter(|url| !url.trim().is_empty())
            .filter_map(|url| match resolver.id_from_url(url, source) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("Cannot resolve id of '{}': {}", url, e);
                    None
                }
            })
            .filter(|id| !id.trim().is_empty())
            .collect()
    }

    /// Raw tree document of one node, bypassing the cache.
    pub async fn fetch_node(&self, source: &SourceConfig, path: &str) -> Option<Map<String, Value>> {
        self.client.fetch(source, path, false).await
    }
}
