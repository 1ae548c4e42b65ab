//! Lookout provider façade.
//!
//! This crate defines the per-kind fetch strategy the panel controller depends on, the
//! registry that builds one provider per kind on first use, and the in-process and mock
//! object sources providers are built over.

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::anyhow;
use metrics::{counter, histogram};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use tracing::{info, warn};

pub use lookout_core::{
    DetailsError, DetailsResult, ObjectSource, ResourceDescriptor, ResourceIdentifier, ResourceKind, Section,
};

/// Fetch strategy for one kind.
#[async_trait::async_trait]
pub trait DetailsProvider: Send + Sync {
    async fn fetch_details(&self, descriptor: &ResourceDescriptor) -> DetailsResult<Value>;
}

/// Provider that fetches the primary object and then the kind's descriptive sections.
///
/// The primary fetch decides success; a failing section is logged, listed under
/// `degraded`, and otherwise ignored.
pub struct SectionedProvider {
    kind: ResourceKind,
    source: Arc<dyn ObjectSource>,
}

impl SectionedProvider {
    pub fn new(kind: ResourceKind, source: Arc<dyn ObjectSource>) -> Self {
        Self { kind, source }
    }

    fn target_label(descriptor: &ResourceDescriptor) -> String {
        match descriptor.namespace.as_deref() {
            Some(ns) if descriptor.requires_namespace() => format!("{} {}/{}", descriptor.display_kind(), ns, descriptor.name),
            _ => format!("{} {}", descriptor.display_kind(), descriptor.name),
        }
    }
}

#[async_trait::async_trait]
impl DetailsProvider for SectionedProvider {
    async fn fetch_details(&self, descriptor: &ResourceDescriptor) -> DetailsResult<Value> {
        if descriptor.kind != self.kind {
            return Err(DetailsError::DescriptorInvalid(format!(
                "{} provider cannot fetch a {}",
                self.kind, descriptor.kind
            )));
        }
        descriptor.validate()?;
        let t0 = Instant::now();
        let object = self.source.get_object(descriptor).await.map_err(|e| {
            counter!("details_primary_failures_total", 1u64);
            DetailsError::PrimaryFetchFailed { target: Self::target_label(descriptor), message: format!("{:#}", e) }
        })?;

        let sections = self.kind.info().sections;
        let results = futures::future::join_all(
            sections.iter().map(|section| self.source.get_section(descriptor, *section, &object)),
        )
        .await;

        let mut payload = json!({ "object": object });
        let mut degraded: Vec<&str> = Vec::new();
        for (section, res) in sections.iter().zip(results) {
            match res {
                Ok(v) => payload[section.key()] = v,
                Err(e) => {
                    let err = DetailsError::SecondaryFetchFailed { section: section.key().to_string(), message: format!("{:#}", e) };
                    warn!(kind = %self.kind, name = %descriptor.name, error = %err, "provider: continuing without section");
                    counter!("details_secondary_failures_total", 1u64);
                    degraded.push(section.key());
                }
            }
        }
        payload["degraded"] = json!(degraded);
        histogram!("details_provider_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(kind = %self.kind, name = %descriptor.name, degraded = degraded.len(), took_ms = %t0.elapsed().as_millis(), "provider: fetch ok");
        Ok(payload)
    }
}

/// Builds the provider for a kind. Called at most once per kind by [`ProviderRegistry`].
pub trait ProviderFactory: Send + Sync {
    fn build(&self, kind: ResourceKind) -> Arc<dyn DetailsProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(ResourceKind) -> Arc<dyn DetailsProvider> + Send + Sync,
{
    fn build(&self, kind: ResourceKind) -> Arc<dyn DetailsProvider> {
        self(kind)
    }
}

/// Factory building a [`SectionedProvider`] over a shared source for every kind.
pub struct SourceFactory {
    source: Arc<dyn ObjectSource>,
}

impl SourceFactory {
    pub fn new(source: Arc<dyn ObjectSource>) -> Self {
        Self { source }
    }
}

impl ProviderFactory for SourceFactory {
    fn build(&self, kind: ResourceKind) -> Arc<dyn DetailsProvider> {
        Arc::new(SectionedProvider::new(kind, self.source.clone()))
    }
}

/// One provider per kind, constructed lazily and memoized by kind.
pub struct ProviderRegistry {
    factory: Box<dyn ProviderFactory>,
    built: FxHashMap<ResourceKind, Arc<dyn DetailsProvider>>,
}

impl ProviderRegistry {
    pub fn new(factory: impl ProviderFactory + 'static) -> Self {
        Self { factory: Box::new(factory), built: FxHashMap::default() }
    }

    pub fn from_source(source: Arc<dyn ObjectSource>) -> Self {
        Self::new(SourceFactory::new(source))
    }

    /// Registry backed by the kube client of the current process.
    pub fn in_proc() -> Self {
        Self::from_source(Arc::new(lookout_kubehub::KubeSource::new()))
    }

    pub fn provider(&mut self, kind: ResourceKind) -> Arc<dyn DetailsProvider> {
        let factory = &self.factory;
        self.built
            .entry(kind)
            .or_insert_with(|| {
                info!(kind = %kind, "registry: building provider");
                factory.build(kind)
            })
            .clone()
    }

    pub fn built_count(&self) -> usize {
        self.built.len()
    }

    pub async fn fetch_details(&mut self, kind: ResourceKind, descriptor: &ResourceDescriptor) -> DetailsResult<Value> {
        self.provider(kind).fetch_details(descriptor).await
    }
}

// ----------------- Mock implementation -----------------

fn object_key(kind: ResourceKind, namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}/{}", kind, namespace.unwrap_or(""), name)
}

/// Simple in-memory source for tests.
#[derive(Default)]
pub struct MockSource {
    objects: HashMap<String, Value>,
    sections: HashMap<(String, Section), Value>,
    failing_sections: HashSet<Section>,
    object_calls: AtomicUsize,
    section_calls: Mutex<Vec<Section>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, kind: ResourceKind, namespace: Option<&str>, name: &str, object: Value) -> Self {
        self.objects.insert(object_key(kind, namespace, name), object);
        self
    }

    pub fn with_section(mut self, kind: ResourceKind, namespace: Option<&str>, name: &str, section: Section, value: Value) -> Self {
        self.sections.insert((object_key(kind, namespace, name), section), value);
        self
    }

    pub fn failing(mut self, section: Section) -> Self {
        self.failing_sections.insert(section);
        self
    }

    pub fn object_calls(&self) -> usize {
        self.object_calls.load(Ordering::SeqCst)
    }

    pub fn section_calls(&self) -> Vec<Section> {
        self.section_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ObjectSource for MockSource {
    async fn get_object(&self, target: &ResourceDescriptor) -> anyhow::Result<Value> {
        self.object_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .get(&object_key(target.kind, target.namespace.as_deref(), &target.name))
            .cloned()
            .ok_or_else(|| anyhow!("{} \"{}\" not found", target.display_kind(), target.name))
    }

    async fn get_section(&self, target: &ResourceDescriptor, section: Section, _object: &Value) -> anyhow::Result<Value> {
        if let Ok(mut calls) = self.section_calls.lock() {
            calls.push(section);
        }
        if self.failing_sections.contains(&section) {
            return Err(anyhow!("{} unavailable", section.key()));
        }
        Ok(self
            .sections
            .get(&(object_key(target.kind, target.namespace.as_deref(), &target.name), section))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cron_job() -> ResourceDescriptor {
        ResourceDescriptor::namespaced(ResourceKind::CronJob, "ops", "nightly", "prod")
    }

    fn source() -> MockSource {
        MockSource::new()
            .with_object(ResourceKind::CronJob, Some("ops"), "nightly", json!({ "metadata": { "name": "nightly" } }))
            .with_section(ResourceKind::CronJob, Some("ops"), "nightly", Section::Jobs, json!([{ "name": "nightly-1" }]))
    }

    #[tokio::test]
    async fn assembles_object_and_sections() {
        let p = SectionedProvider::new(ResourceKind::CronJob, Arc::new(source()));
        let v = p.fetch_details(&cron_job()).await.unwrap();
        assert_eq!(v["object"]["metadata"]["name"], "nightly");
        assert_eq!(v["jobs"][0]["name"], "nightly-1");
        assert_eq!(v["events"], json!([]));
        assert_eq!(v["degraded"], json!([]));
    }

    #[tokio::test]
    async fn secondary_failure_degrades_without_error() {
        let p = SectionedProvider::new(ResourceKind::CronJob, Arc::new(source().failing(Section::Events)));
        let v = p.fetch_details(&cron_job()).await.expect("secondary failures must not fail the fetch");
        assert_eq!(v["degraded"], json!(["events"]));
        assert!(v.get("events").is_none());
        assert_eq!(v["jobs"][0]["name"], "nightly-1");
    }

    #[tokio::test]
    async fn primary_failure_is_typed_and_skips_sections() {
        let src = Arc::new(MockSource::new());
        let p = SectionedProvider::new(ResourceKind::ConfigMap, src.clone());
        let d = ResourceDescriptor::namespaced(ResourceKind::ConfigMap, "default", "app-config", "prod");
        let err = p.fetch_details(&d).await.unwrap_err();
        match err {
            DetailsError::PrimaryFetchFailed { target, message } => {
                assert_eq!(target, "ConfigMap default/app-config");
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(src.section_calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_descriptor_is_rejected_before_io() {
        let src = Arc::new(MockSource::new());
        let p = SectionedProvider::new(ResourceKind::Pod, src.clone());
        let d = ResourceDescriptor::new(ResourceKind::Pod, "web-1", "prod");
        assert!(matches!(p.fetch_details(&d).await, Err(DetailsError::DescriptorInvalid(_))));
        assert_eq!(src.object_calls(), 0);
    }

    #[tokio::test]
    async fn registry_builds_each_kind_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let src: Arc<dyn ObjectSource> = Arc::new(source());
        let mut reg = ProviderRegistry::new(move |kind: ResourceKind| -> Arc<dyn DetailsProvider> {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(SectionedProvider::new(kind, src.clone()))
        });
        let d = cron_job();
        reg.fetch_details(ResourceKind::CronJob, &d).await.unwrap();
        reg.fetch_details(ResourceKind::CronJob, &d).await.unwrap();
        let _ = reg.provider(ResourceKind::Pod);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(reg.built_count(), 2);
    }
}
