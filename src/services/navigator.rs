// src/services/navigator.rs

//! Tree traversal: full-source runs and explicit-path runs.
//!
//! Children of a node are discovered in raw key order and visited either
//! one after another or with a bounded number in flight. A bounded visit
//! that fails falls back to the sequential strategy for that subtree.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt, stream};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{ContentNode, EngineConfig, LifecycleEvent, Session, SourceConfig, keys};
use crate::services::fetch::RepositoryClient;
use crate::services::jobs::JobBuilder;
use crate::storage::{IndexingContext, JobSink};

/// How the children of a node are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    /// At most this many child fetches in flight per parent
    Bounded(usize),
}

impl ExecutionStrategy {
    pub fn from_config(engine: &EngineConfig) -> Self {
        if engine.parallel {
            Self::Bounded(engine.effective_parallelism())
        } else {
            Self::Sequential
        }
    }
}

/// Once-only filtering of child paths.
#[derive(Debug, Clone)]
pub struct OnceFilter {
    once: bool,
    pattern: Option<Regex>,
}

impl OnceFilter {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let pattern = match source.once_pattern.trim() {
            "" => None,
            pattern => Some(Regex::new(pattern)?),
        };
        Ok(Self {
            once: source.once,
            pattern,
        })
    }

    /// False iff the once pattern matches `path` from its start.
    pub fn is_not_once(&self, path: &str) -> bool {
        match &self.pattern {
            Some(pattern) => !pattern.find(path).is_some_and(|m| m.start() == 0),
            None => true,
        }
    }

    pub fn should_process(&self, path: &str) -> bool {
        !self.once || self.is_not_once(path)
    }
}

/// Names of sources with a full run in progress.
#[derive(Debug, Default)]
pub struct RunningSources {
    names: Mutex<HashSet<String>>,
}

impl RunningSources {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self) -> MutexGuard<'_, HashSet<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `source` as running; `None` when it already is.
    pub fn try_acquire(&self, source: &str) -> Option<RunGuard<'_>> {
        if !self.names().insert(source.to_string()) {
            return None;
        }
        Some(RunGuard {
            sources: self,
            name: source.to_string(),
        })
    }

    pub fn is_running(&self, source: &str) -> bool {
        self.names().contains(source)
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears the running mark of a source when dropped.
#[derive(Debug)]
pub struct RunGuard<'a> {
    sources: &'a RunningSources,
    name: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.sources.names().remove(&self.name);
    }
}

/// Session plus the compiled once filter of one run.
struct Run<'s> {
    session: &'s Session,
    once: OnceFilter,
}

impl<'s> Run<'s> {
    fn new(session: &'s Session) -> Result<Self> {
        Ok(Self {
            session,
            once: OnceFilter::new(&session.source)?,
        })
    }
}

/// Walks the repository and hands eligible nodes to the job builder.
pub struct Navigator<'a> {
    client: &'a RepositoryClient,
    jobs: JobBuilder<'a>,
    sink: &'a dyn JobSink,
    context: &'a dyn IndexingContext,
    running: &'a RunningSources,
    strategy: ExecutionStrategy,
}

impl<'a> Navigator<'a> {
    pub fn new(
        client: &'a RepositoryClient,
        jobs: JobBuilder<'a>,
        sink: &'a dyn JobSink,
        context: &'a dyn IndexingContext,
        running: &'a RunningSources,
        strategy: ExecutionStrategy,
    ) -> Self {
        Self {
            client,
            jobs,
            sink,
            context,
            running,
            strategy,
        }
    }

    /// Index the whole source from its root path.
    ///
    /// Returns false when skipped because the source is already running.
    pub async fn run_full(&self, session: &Session) -> bool {
        let source = &session.source.name;
        let Some(_guard) = self.running.try_acquire(source) else {
            log::warn!(
                "Skipping IndexAll[source={}]. Source '{}' is already being processed.",
                source,
                source
            );
            return false;
        };

        log::info!("Starting exclusive execution: IndexAll[source={}]", source);
        if let Err(e) = self.index_all(session).await {
            log::error!("Error executing IndexAll[source={}]: {}", source, e);
        }
        self.finish(session).await;
        log::info!("Completed exclusive execution: IndexAll[source={}]", source);
        true
    }

    async fn index_all(&self, session: &Session) -> Result<()> {
        if !session.source.uses_content_type() {
            log::warn!(
                "Content type parameter not configured for source: {}",
                session.source.name
            );
            return Ok(());
        }
        let run = Run::new(session)?;
        let root = &session.source.root_path;
        if let Some(raw) = self.client.fetch(&session.source, root, false).await {
            self.navigate_and_index(&run, root, raw).await;
        }
        Ok(())
    }

    /// Index explicit paths, then the recorded dependents of those paths.
    pub async fn run_paths(&self, session: &Session, paths: &[String]) {
        let paths: Vec<String> = paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect();
        self.run_standalone(session, &paths).await;

        if !session.engine.follow_dependencies || paths.is_empty() {
            return;
        }
        let dependents = match self
            .context
            .dependents_of(&session.source.name, session.provider(), &paths)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                log::error!("Cannot resolve dependents of {} paths: {}", paths.len(), e);
                return;
            }
        };
        if dependents.is_empty() {
            log::debug!("No dependencies found for {} paths", paths.len());
            return;
        }
        log::info!(
            "Processing {} dependencies for source: {}",
            dependents.len(),
            session.source.name
        );
        self.run_standalone(&session.cascade(), &dependents).await;
    }

    async fn run_standalone(&self, session: &Session, paths: &[String]) {
        let description = format!(
            "IndexPaths[source={}, pathCount={}]",
            session.source.name,
            paths.len()
        );
        log::info!("Starting standalone execution: {}", description);
        if let Err(e) = self.index_paths(session, paths).await {
            log::error!("Error executing {}: {}", description, e);
        }
        self.finish(session).await;
    }

    async fn index_paths(&self, session: &Session, paths: &[String]) -> Result<()> {
        let run = Run::new(session)?;
        for path in paths {
            log::debug!("Processing path: {}", path);
            if session.event == LifecycleEvent::Deindexing {
                self.jobs.delete_from_records(session, path).await;
                continue;
            }
            match self.client.fetch(&session.source, path, false).await {
                Some(raw) => self.navigate_and_index(&run, path, raw).await,
                None => {
                    log::debug!("Content not found, creating de-index job for path: {}", path);
                    self.jobs.delete_from_records(session, path).await;
                }
            }
        }
        Ok(())
    }

    async fn finish(&self, session: &Session) {
        match self.sink.finish(&session.source.name, session.standalone).await {
            Ok(()) => log::info!(
                "Finished indexing for source: {} (standalone={})",
                session.source.name,
                session.standalone
            ),
            Err(e) => log::error!("Finishing source {} failed: {}", session.source.name, e),
        }
    }

    async fn navigate_and_index(&self, run: &Run<'_>, path: &str, raw: Map<String, Value>) {
        let session = run.session;
        let node = ContentNode::parse(
            path,
            Value::Object(raw),
            session.event,
            &session.engine.content_root,
        );
        log::debug!("Navigating node: {} with type: {}", path, node.node_type);

        let children = if session.index_children {
            children_of(run, &node)
        } else {
            Vec::new()
        };
        if node.matches_content_type(&session.source) {
            self.jobs.prepare_index_object(session, node).await;
        }
        if !children.is_empty() {
            self.navigate_children(run, path, &children).await;
        }
    }

    async fn navigate_children(&self, run: &Run<'_>, parent: &str, children: &[String]) {
        match self.strategy {
            ExecutionStrategy::Sequential => self.visit_sequential(run, children).await,
            ExecutionStrategy::Bounded(limit) => {
                if let Err(e) = self.visit_bounded(run, children, limit).await {
                    log::warn!(
                        "Concurrent processing of {} failed, falling back to sequential: {}",
                        parent,
                        e
                    );
                    self.visit_sequential(run, children).await;
                }
            }
        }
    }

    async fn visit_sequential(&self, run: &Run<'_>, children: &[String]) {
        for child in children {
            self.visit_child(run, child.clone()).await;
        }
    }

    async fn visit_bounded(&self, run: &Run<'_>, children: &[String], limit: usize) -> Result<()> {
        stream::iter(children.iter().map(Ok::<_, AppError>))
            .try_for_each_concurrent(limit.max(1), |child| async move {
                AssertUnwindSafe(self.visit_child(run, child.clone()))
                    .catch_unwind()
                    .await
                    .map_err(|panic| AppError::traversal(child.as_str(), panic_message(&*panic)))
            })
            .await
    }

    fn visit_child<'s>(&'s self, run: &'s Run<'s>, path: String) -> BoxFuture<'s, ()> {
        async move {
            if let Some(raw) = self.client.fetch(&run.session.source, &path, false).await {
                self.navigate_and_index(run, &path, raw).await;
            }
        }
        .boxed()
    }
}

/// Child paths of `node` worth fetching, in raw key order.
fn children_of(run: &Run<'_>, node: &ContentNode) -> Vec<String> {
    let static_files = run.session.source.sub_type == keys::STATIC_FILE_SUB_TYPE;
    node.raw()
        .iter()
        .filter(|(_, value)| value.is_object())
        .map(|(key, _)| key)
        .filter(|key| !keys::is_reserved_key(key))
        .filter(|key| static_files || keys::has_no_image_extension(key))
        .map(|key| format!("{}/{}", node.path(), key))
        .filter(|path| run.once.should_process(path))
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic during traversal".to_string())
}
