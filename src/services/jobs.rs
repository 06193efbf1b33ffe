// src/services/jobs.rs

//! Delta computation and job construction.
//!
//! A node that passes the eligibility check becomes one CREATE job per
//! enabled environment. Un-delivered content on the publish side is only
//! removed from the index during on-demand runs.

use chrono::{DateTime, Utc};

use crate::extensions::{Registry, default_delta_date};
use crate::models::{
    AttrValueMap, ContentNode, EnvNode, Environment, ID_ATTR, JobAction, JobEnvelope, JobItem,
    SOURCE_APPS_ATTR, Session, keys,
};
use crate::services::fetch::RepositoryClient;
use crate::services::mapping::AttributeMapper;
use crate::storage::{IndexingContext, JobSink};

/// Whether a type-matched node may be indexed by this session.
pub fn is_eligible(session: &Session, node: &ContentNode) -> bool {
    let source = &session.source;
    if !node.path().starts_with(&source.root_path) {
        log::debug!(
            "Skipping object {} as it is outside the root path {}",
            node.path(),
            source.root_path
        );
        return false;
    }
    if !source.uses_content_type() {
        log::warn!("Content type is empty for source {}", source.name);
        return false;
    }
    match source.content_type.as_str() {
        keys::PAGE_TYPE => true,
        keys::ASSET_TYPE => match asset_sub_type(session) {
            Some(keys::CONTENT_FRAGMENT_MODEL) => node.content_fragment,
            Some(keys::STATIC_FILE_MODEL) => true,
            _ => false,
        },
        _ => false,
    }
}

fn asset_sub_type(session: &Session) -> Option<&str> {
    if session.source.content_type != keys::ASSET_TYPE {
        return None;
    }
    session.model.as_ref().and_then(|model| model.sub_type())
}

/// Sub-object projected onto the node attributes, if any.
pub fn data_path(session: &Session, node: &ContentNode) -> Option<&'static str> {
    match asset_sub_type(session) {
        Some(keys::CONTENT_FRAGMENT_MODEL) if node.content_fragment => {
            Some(keys::CONTENT_FRAGMENT_DATA_PATH)
        }
        Some(keys::STATIC_FILE_MODEL) => Some(keys::STATIC_FILE_DATA_PATH),
        _ => None,
    }
}

/// DELETE job for one object.
pub fn build_delete_job(
    session: &Session,
    sites: Vec<String>,
    locale: &str,
    object_id: &str,
    environment: &str,
) -> JobItem {
    let mut item = JobItem {
        action: JobAction::Delete,
        sites,
        locale: locale.to_string(),
        attributes: serde_json::Map::new(),
        environment: environment.to_string(),
        checksum: None,
        specs: Vec::new(),
    };
    item.push_attribute(ID_ATTR, object_id);
    item.push_attribute(SOURCE_APPS_ATTR, session.provider());
    item
}

/// Builds jobs for nodes and hands them to the sink.
pub struct JobBuilder<'a> {
    registry: &'a Registry,
    mapper: AttributeMapper<'a>,
    sink: &'a dyn JobSink,
    context: &'a dyn IndexingContext,
}

impl<'a> JobBuilder<'a> {
    pub fn new(
        registry: &'a Registry,
        client: &'a RepositoryClient,
        sink: &'a dyn JobSink,
        context: &'a dyn IndexingContext,
    ) -> Self {
        Self {
            registry,
            mapper: AttributeMapper::new(registry, client),
            sink,
            context,
        }
    }

    /// Change fingerprint of a node.
    ///
    /// The mapping's delta extension wins; when it is missing or fails the
    /// default preference (last modified, created, now) applies.
    pub fn delta_date(&self, session: &Session, node: &EnvNode<'_>) -> DateTime<Utc> {
        let Some(key) = session.source.mapping.delta_extension() else {
            return default_delta_date(node);
        };
        match self.registry.delta_date(key) {
            Some(extension) => match extension.delta_date(node, &session.source) {
                Ok(date) => date,
                Err(e) => {
                    log::error!("Delta extension '{}' failed for {}: {}", key, node.node.path(), e);
                    default_delta_date(node)
                }
            },
            None => {
                log::debug!("No delta extension registered for '{}'", key);
                default_delta_date(node)
            }
        }
    }

    /// CREATE job carrying the flattened attributes of a node.
    pub fn build_create_job(
        &self,
        session: &Session,
        node: &EnvNode<'_>,
        locale: &str,
        attributes: &AttrValueMap,
    ) -> JobItem {
        let mut item = JobItem {
            action: JobAction::Create,
            sites: vec![node.site(&session.source).to_string()],
            locale: locale.to_string(),
            attributes: serde_json::Map::new(),
            environment: node.environment.to_string(),
            checksum: Some(self.delta_date(session, node).timestamp_millis().to_string()),
            specs: Vec::new(),
        };
        if let Some(site_name) = session.site_name.as_deref().filter(|s| !s.trim().is_empty()) {
            item.push_attribute(keys::SITE_ATTRIBUTE, site_name);
        }
        for (name, values) in attributes.iter() {
            for value in values.iter().filter(|v| !v.trim().is_empty()) {
                item.push_attribute(name, value);
            }
        }
        item.specs = session.specs_for(&item.attributes);
        item
    }

    /// Eligibility check, data-path projection, then per-environment jobs.
    pub async fn prepare_index_object(&self, session: &Session, mut node: ContentNode) {
        if !is_eligible(session, &node) {
            return;
        }
        if let Some(path) = data_path(session, &node) {
            node.set_data_path(path);
        }
        self.index_object(session, &node).await;
    }

    /// Emit the jobs of one node for each enabled environment.
    pub async fn index_object(&self, session: &Session, node: &ContentNode) {
        if session.source.author {
            self.index_environment(session, &EnvNode::new(node, Environment::Authoring))
                .await;
        }
        if session.source.publish {
            let publishing = EnvNode::new(node, Environment::Publishing);
            if node.delivered {
                self.index_environment(session, &publishing).await;
            } else if session.standalone {
                self.force_delete(session, &publishing).await;
            } else {
                log::info!(
                    "Ignoring deIndex because {} is not publishing.",
                    describe(session, node.path(), Environment::Publishing)
                );
            }
        }
    }

    async fn index_environment(&self, session: &Session, node: &EnvNode<'_>) {
        let locale = session.source.locale_for_path(node.node.path());
        let attributes = self.mapper.resolve(session, node).await;
        let item = self.build_create_job(session, node, locale, &attributes);
        self.emit(session, item, node.node.dependencies.clone()).await;
    }

    async fn force_delete(&self, session: &Session, node: &EnvNode<'_>) {
        let item = build_delete_job(
            session,
            vec![session.source.publish_site.clone()],
            session.source.locale_for_path(node.node.path()),
            node.node.path(),
            Environment::Publishing.as_str(),
        );
        self.emit(session, item, node.node.dependencies.clone()).await;
        log::info!(
            "Forcing deIndex because {} is not publishing.",
            describe(session, node.node.path(), node.environment)
        );
    }

    /// One DELETE job per recorded entry of `object_id`. Failures are isolated.
    pub async fn delete_from_records(&self, session: &Session, object_id: &str) {
        let records = match self
            .context
            .records_for(object_id, &session.source.name, session.provider())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                log::error!("Cannot read index records of {}: {}", object_id, e);
                return;
            }
        };
        if records.is_empty() {
            log::debug!(
                "No indexing items found for contentId: {} in source: {}",
                object_id,
                session.source.name
            );
            return;
        }

        for record in records {
            log::info!(
                "DeIndex initiated for {} ({}, {}, {:?}): tree document not found.",
                object_id,
                record.environment,
                record.locale,
                record.sites
            );
            let item = build_delete_job(
                session,
                record.sites.clone(),
                &record.locale,
                &record.object_id,
                &record.environment,
            );
            self.emit(session, item, Default::default()).await;
        }
    }

    async fn emit(
        &self,
        session: &Session,
        item: JobItem,
        dependencies: std::collections::BTreeSet<String>,
    ) {
        let envelope = JobEnvelope {
            item,
            source: session.source.name.clone(),
            provider: session.provider().to_string(),
            dependencies,
            standalone: session.standalone,
        };
        let action = envelope.item.action;
        let id = envelope.item.object_id().unwrap_or_default().to_string();
        match self.sink.add_job(envelope).await {
            Ok(true) => log::debug!("Queued {:?} job for {}", action, id),
            Ok(false) => log::warn!("Sink declined {:?} job for {}", action, id),
            Err(e) => log::error!("Failed to queue {:?} job for {}: {}", action, id, e),
        }
    }
}

fn describe(session: &Session, path: &str, environment: Environment) -> String {
    format!(
        "{} object ({} - {} - {})",
        path,
        session.source.name,
        environment,
        session.source.locale_for_path(path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::extensions::DeltaDateExtractor;
    use crate::models::config::tests::sample_source;
    use crate::models::{EngineConfig, LifecycleEvent, SourceConfig};
    use crate::storage::MemoryStore;
    use crate::storage::tests::record;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    struct FailingDelta;

    impl DeltaDateExtractor for FailingDelta {
        fn delta_date(&self, _node: &EnvNode<'_>, _config: &SourceConfig) -> Result<DateTime<Utc>> {
            Err(AppError::validation("no date"))
        }
    }

    struct FixedDelta;

    impl DeltaDateExtractor for FixedDelta {
        fn delta_date(&self, _node: &EnvNode<'_>, _config: &SourceConfig) -> Result<DateTime<Utc>> {
            Ok(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        }
    }

    fn source() -> SourceConfig {
        let mut source = sample_source();
        source.site_name = Some("WKND".into());
        source.mapping = toml::from_str(
            r#"
            [[models]]
            type = "cq:Page"

            [[models.target_attrs]]
            name = "id"
            class_name = "content-id"

            [[models.target_attrs]]
            name = "title"
            source_attrs = [{ name = "jcr:title" }]

            [[models.target_attrs]]
            name = "keywords"
            source_attrs = [{ name = "keywords" }]
            "#,
        )
        .unwrap();
        source
    }

    fn page(delivered: bool) -> ContentNode {
        let action = if delivered { "Activate" } else { "Deactivate" };
        ContentNode::parse(
            "/content/site/en/home",
            json!({
                "jcr:primaryType": "cq:Page",
                "jcr:created": "Mon Jan 15 2024 10:30:00 GMT+0000",
                "jcr:content": {
                    "jcr:title": "Home",
                    "keywords": ["a", " ", "b"],
                    "cq:lastModified": "Wed Mar 20 2024 14:00:00 GMT+0000",
                    "cq:lastReplicationAction": action,
                    "cq:lastReplicationAction_publish": action,
                    "fileReference": "/content/dam/site/hero.jpg"
                }
            }),
            LifecycleEvent::None,
            "/content",
        )
    }

    fn parts() -> (Registry, RepositoryClient, MemoryStore) {
        (
            Registry::with_builtins(),
            RepositoryClient::new(&EngineConfig::default()).unwrap(),
            MemoryStore::new(),
        )
    }

    #[tokio::test]
    async fn test_index_object_emits_one_create_per_environment() {
        let (registry, client, store) = parts();
        let builder = JobBuilder::new(&registry, &client, &store, &store);
        let session = Session::full_run(EngineConfig::default(), source());

        builder.index_object(&session, &page(true)).await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].item.environment, "authoring");
        assert_eq!(jobs[0].item.sites, vec!["wknd-author"]);
        assert_eq!(jobs[1].item.environment, "publishing");
        assert_eq!(jobs[1].item.sites, vec!["wknd-publish"]);
        for job in &jobs {
            assert_eq!(job.item.action, JobAction::Create);
            assert_eq!(job.item.locale, "en_US");
            assert_eq!(job.item.attributes["site"], json!("WKND"));
            assert_eq!(job.item.attributes["keywords"], json!(["a", "b"]));
            assert!(job.dependencies.contains("/content/dam/site/hero.jpg"));
        }
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_undelivered_full_run_skips_publish() {
        let (registry, client, store) = parts();
        let builder = JobBuilder::new(&registry, &client, &store, &store);
        let session = Session::full_run(EngineConfig::default(), source());

        builder.index_object(&session, &page(false)).await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].item.environment, "authoring");
    }

    #[tokio::test]
    async fn test_undelivered_standalone_forces_delete() {
        let (registry, client, store) = parts();
        let builder = JobBuilder::new(&registry, &client, &store, &store);
        let session = Session::paths_run(EngineConfig::default(), source(), LifecycleEvent::None, false);

        builder.index_object(&session, &page(false)).await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 2);
        let delete = &jobs[1].item;
        assert_eq!(delete.action, JobAction::Delete);
        assert_eq!(delete.sites, vec!["wknd-publish"]);
        assert_eq!(delete.environment, "publishing");
        assert_eq!(delete.attributes["id"], json!("/content/site/en/home"));
        assert_eq!(delete.attributes["source_apps"], json!("AEM"));
        assert!(jobs[1].standalone);
    }

    #[tokio::test]
    async fn test_checksum_is_delta_epoch_millis() {
        let (mut registry, client, store) = parts();
        registry.register_delta_date("failing", FailingDelta);
        registry.register_delta_date("fixed", FixedDelta);
        let node = page(true);
        let env = EnvNode::new(&node, Environment::Authoring);

        let mut source = source();
        let builder = JobBuilder::new(&registry, &client, &store, &store);
        let session = Session::full_run(EngineConfig::default(), source.clone());
        let item = builder.build_create_job(&session, &env, "en_US", &AttrValueMap::new());
        let expected = Utc.with_ymd_and_hms(2024, 3, 20, 14, 0, 0).unwrap();
        assert_eq!(item.checksum, Some(expected.timestamp_millis().to_string()));

        source.mapping.delta_class_name = Some("failing".into());
        let session = Session::full_run(EngineConfig::default(), source.clone());
        assert_eq!(builder.delta_date(&session, &env), expected);

        source.mapping.delta_class_name = Some("fixed".into());
        let session = Session::full_run(EngineConfig::default(), source);
        let item = builder.build_create_job(&session, &env, "en_US", &AttrValueMap::new());
        assert_eq!(item.checksum.as_deref(), Some("1577836800000"));
    }

    #[tokio::test]
    async fn test_delete_from_records_one_job_per_record() {
        let (registry, client, _) = parts();
        let store = MemoryStore::with_records(vec![
            record("/content/site/en/removed", "authoring", "wknd-author"),
            record("/content/site/en/removed", "publishing", "wknd-publish"),
            record("/content/site/en/other", "authoring", "wknd-author"),
        ]);
        let builder = JobBuilder::new(&registry, &client, &store, &store);
        let session = Session::paths_run(EngineConfig::default(), source(), LifecycleEvent::None, true);

        builder.delete_from_records(&session, "/content/site/en/removed").await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.item.action == JobAction::Delete));
        assert_eq!(store.records().len(), 1);

        builder.delete_from_records(&session, "/content/site/en/never").await;
        assert_eq!(store.jobs().len(), 2);
    }

    #[test]
    fn test_eligibility() {
        let session = Session::full_run(EngineConfig::default(), source());
        assert!(is_eligible(&session, &page(true)));

        let outside = ContentNode::parse("/content/other/x", json!({}), LifecycleEvent::None, "/content");
        assert!(!is_eligible(&session, &outside));

        let mut assets = source();
        assets.content_type = "dam:Asset".into();
        assets.mapping = toml::from_str(
            r#"
            [[models]]
            type = "dam:Asset"
            sub_type = "contentFragment"
            "#,
        )
        .unwrap();
        let session = Session::full_run(EngineConfig::default(), assets.clone());
        let fragment = ContentNode::parse(
            "/content/site/en/cf",
            json!({ "jcr:content": { "contentFragment": true } }),
            LifecycleEvent::None,
            "/content",
        );
        assert!(is_eligible(&session, &fragment));
        assert_eq!(data_path(&session, &fragment), Some("data/master"));
        let plain = ContentNode::parse("/content/site/en/img", Value::Null, LifecycleEvent::None, "/content");
        assert!(!is_eligible(&session, &plain));

        assets.mapping.models[0].sub_type = Some("static-file".into());
        let session = Session::full_run(EngineConfig::default(), assets);
        assert!(is_eligible(&session, &plain));
        assert_eq!(data_path(&session, &plain), Some("metadata"));
    }
}
