#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use lookout_api::{DetailsProvider, ProviderRegistry};
use lookout_core::{DetailsError, DetailsResult, ResourceDescriptor, ResourceIdentifier, ResourceKind, TtlPolicy};
use lookout_panel::{DetailsController, OutboundMessage, PanelHost, PanelOptions, PanelSink, Workbench};
use lookout_store::{DetailsCache, TtlCache};
use serde_json::{json, Value};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Created { id: String, options: PanelOptions },
    Title { id: String, title: String },
    Content { id: String, template: String, name: String },
    Reveal { id: String },
    Post { id: String, message: OutboundMessage },
    Close { id: String },
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    sinks: Mutex<Vec<PanelSink>>,
    pub fail_create: AtomicBool,
}

impl RecordingHost {
    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Created { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn posts(&self) -> Vec<OutboundMessage> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Post { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn data_posts(&self) -> Vec<OutboundMessage> {
        self.posts().into_iter().filter(|m| !m.is_error()).collect()
    }

    pub fn last_post(&self) -> Option<OutboundMessage> {
        self.posts().pop()
    }

    /// Title of the panel as last set through create or retitle.
    pub fn last_title(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            HostCall::Created { options, .. } => Some(options.title),
            HostCall::Title { title, .. } => Some(title),
            _ => None,
        })
    }

    pub fn sink(&self, n: usize) -> PanelSink {
        self.sinks.lock().unwrap()[n].clone()
    }
}

impl PanelHost for RecordingHost {
    fn create_panel(&self, id: &str, options: &PanelOptions, sink: PanelSink) -> anyhow::Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("window closed"));
        }
        self.sinks.lock().unwrap().push(sink);
        self.record(HostCall::Created { id: id.to_string(), options: options.clone() });
        Ok(())
    }

    fn set_title(&self, id: &str, title: &str) {
        self.record(HostCall::Title { id: id.to_string(), title: title.to_string() });
    }

    fn set_content(&self, id: &str, template_id: &str, descriptor: &ResourceDescriptor) {
        self.record(HostCall::Content { id: id.to_string(), template: template_id.to_string(), name: descriptor.name.clone() });
    }

    fn reveal(&self, id: &str) {
        self.record(HostCall::Reveal { id: id.to_string() });
    }

    fn post_message(&self, id: &str, message: &OutboundMessage) -> anyhow::Result<()> {
        self.record(HostCall::Post { id: id.to_string(), message: message.clone() });
        Ok(())
    }

    fn close(&self, id: &str) {
        self.record(HostCall::Close { id: id.to_string() });
    }
}

#[derive(Default)]
pub struct RecordingWorkbench {
    pub clipboard: Mutex<Vec<String>>,
    pub notifications: Mutex<Vec<String>>,
    pub yaml: Mutex<Vec<ResourceIdentifier>>,
    pub default_namespaces: Mutex<Vec<(String, String)>>,
    pub categories: Mutex<Vec<(String, String, Option<String>)>>,
    pub fail_clipboard: AtomicBool,
}

#[async_trait::async_trait]
impl Workbench for RecordingWorkbench {
    async fn write_clipboard(&self, text: &str) -> anyhow::Result<()> {
        if self.fail_clipboard.load(Ordering::SeqCst) {
            return Err(anyhow!("clipboard unavailable"));
        }
        self.clipboard.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn notify_error(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
    }

    async fn open_yaml_editor(&self, resource: ResourceIdentifier) -> anyhow::Result<()> {
        self.yaml.lock().unwrap().push(resource);
        Ok(())
    }

    async fn set_default_namespace(&self, context_id: &str, namespace: &str) -> anyhow::Result<()> {
        self.default_namespaces.lock().unwrap().push((context_id.to_string(), namespace.to_string()));
        Ok(())
    }

    async fn reveal_category(&self, context_id: &str, category: &str, namespace: Option<&str>) -> anyhow::Result<()> {
        self.categories
            .lock()
            .unwrap()
            .push((context_id.to_string(), category.to_string(), namespace.map(str::to_string)));
        Ok(())
    }
}

/// Provider answering every kind. A name's next call can be gated (held until released);
/// names can be made to fail, to return an internal error or to panic. Successful payloads carry the call number as `n`.
#[derive(Default)]
pub struct FakeProvider {
    calls: AtomicUsize,
    names: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    internal: Mutex<HashSet<String>>,
}

impl FakeProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    pub fn gate(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(name.to_string(), gate.clone());
        gate
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn heal(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }

    /// Answer with an error that is not meant for the panel.
    pub fn internal_error(&self, name: &str) {
        self.internal.lock().unwrap().insert(name.to_string());
    }

    pub fn panic_on(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait::async_trait]
impl DetailsProvider for FakeProvider {
    async fn fetch_details(&self, descriptor: &ResourceDescriptor) -> DetailsResult<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.names.lock().unwrap().push(descriptor.name.clone());
        let gate = self.gates.lock().unwrap().remove(&descriptor.name);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.panicking.lock().unwrap().contains(&descriptor.name) {
            panic!("provider blew up");
        }
        if self.internal.lock().unwrap().contains(&descriptor.name) {
            return Err(DetailsError::SecondaryFetchFailed { section: "events".into(), message: "token expired".into() });
        }
        if self.failing.lock().unwrap().contains(&descriptor.name) {
            return Err(DetailsError::PrimaryFetchFailed {
                target: format!("{} {}", descriptor.kind, descriptor.name),
                message: "connection refused".into(),
            });
        }
        Ok(json!({
            "object": { "kind": descriptor.kind.as_str(), "metadata": { "name": descriptor.name } },
            "n": n,
            "degraded": [],
        }))
    }
}

pub struct Harness {
    pub controller: DetailsController,
    pub host: Arc<RecordingHost>,
    pub workbench: Arc<RecordingWorkbench>,
    pub provider: Arc<FakeProvider>,
    pub cache: Arc<TtlCache>,
}

pub fn harness() -> Harness {
    let provider = Arc::new(FakeProvider::default());
    let cache = Arc::new(TtlCache::with_capacity(64));
    let p = provider.clone();
    let registry = ProviderRegistry::new(move |_kind: ResourceKind| -> Arc<dyn DetailsProvider> { p.clone() });
    build(registry, cache.clone(), provider, cache)
}

/// Harness over a caller-supplied registry and cache; `provider` and `cache` fields are then
/// unused placeholders.
pub fn harness_with(registry: ProviderRegistry, cache: Arc<dyn DetailsCache>) -> Harness {
    build(registry, cache, Arc::new(FakeProvider::default()), Arc::new(TtlCache::with_capacity(1)))
}

fn build(registry: ProviderRegistry, used: Arc<dyn DetailsCache>, provider: Arc<FakeProvider>, cache: Arc<TtlCache>) -> Harness {
    let host = Arc::new(RecordingHost::default());
    let workbench = Arc::new(RecordingWorkbench::default());
    let controller =
        DetailsController::new(host.clone(), workbench.clone(), registry, used).with_ttl(TtlPolicy::default());
    Harness { controller, host, workbench, provider, cache }
}

/// Cache whose reads blow up.
pub struct PanickingCache;

#[async_trait::async_trait]
impl DetailsCache for PanickingCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        panic!("cache corrupted");
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}

    async fn invalidate(&self, _key: &str) {}
}

pub fn pod(name: &str) -> ResourceDescriptor {
    ResourceDescriptor::namespaced(ResourceKind::Pod, "default", name, "prod")
}

pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}
