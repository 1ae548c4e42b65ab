//! Lookout kubehub: kube-rs backed object source.
//!
//! One client per cluster context, created lazily and reused. Primary objects are fetched as
//! `DynamicObject`s from the descriptor's group/version/plural, so no discovery round-trip is
//! needed; sections are list calls shaped into compact JSON by [`sections`].

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::core::v1::Event;
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client, Config,
};
use lookout_core::{ApiTarget, ObjectSource, ResourceDescriptor, Section};
use metrics::histogram;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub mod sections;

/// Kube-backed [`ObjectSource`].
pub struct KubeSource {
    clients: Mutex<HashMap<String, Client>>,
    events_limit: u32,
}

impl Default for KubeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KubeSource {
    pub fn new() -> Self {
        let events_limit = std::env::var("LOOKOUT_EVENTS_LIMIT").ok().and_then(|s| s.parse::<u32>().ok()).unwrap_or(50);
        Self { clients: Mutex::new(HashMap::new()), events_limit }
    }

    /// Client for a kubeconfig context; empty selects the current context.
    pub async fn client_for(&self, context_id: &str) -> Result<Client> {
        let mut clients = self.clients.lock().await;
        if let Some(c) = clients.get(context_id) {
            return Ok(c.clone());
        }
        let t0 = Instant::now();
        let client = if context_id.is_empty() {
            Client::try_default().await.context("building default kube client")?
        } else {
            let opts = KubeConfigOptions { context: Some(context_id.to_string()), ..Default::default() };
            let config = Config::from_kubeconfig(&opts)
                .await
                .with_context(|| format!("loading kubeconfig context {}", context_id))?;
            Client::try_from(config).with_context(|| format!("building kube client for {}", context_id))?
        };
        info!(context = %context_id, took_ms = %t0.elapsed().as_millis(), "kube client ready");
        clients.insert(context_id.to_string(), client.clone());
        Ok(client)
    }

    async fn list(&self, target: &ResourceDescriptor, ar: &ApiResource, namespace: Option<&str>, lp: &ListParams) -> Result<Vec<serde_json::Value>> {
        let client = self.client_for(&target.context_id).await?;
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(client, ns, ar),
            None => Api::all_with(client, ar),
        };
        let list = api.list(lp).await.with_context(|| format!("listing {}", ar.plural))?;
        list.items
            .iter()
            .map(|o| serde_json::to_value(o).context("serializing DynamicObject"))
            .collect()
    }

    async fn events(&self, target: &ResourceDescriptor, object: &serde_json::Value) -> Result<serde_json::Value> {
        let client = self.client_for(&target.context_id).await?;
        let kind = target.display_kind();
        let api: Api<Event> = match target.namespace.as_deref().filter(|_| target.requires_namespace()) {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        let lp = ListParams::default()
            .fields(&sections::event_field_selector(kind, &target.name, sections::uid_of(object)))
            .limit(self.events_limit);
        let list = api.list(&lp).await.context("listing events")?;
        Ok(sections::shape_events(list.items))
    }
}

/// Map a descriptor's target onto a kube `ApiResource`.
pub fn api_resource(target: &ApiTarget) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&target.group, &target.version, &target.kind);
    ApiResource::from_gvk_with_plural(&gvk, &target.plural)
}

fn core_resource(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("", "v1", kind), plural)
}

fn group_resource(group: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, "v1", kind), plural)
}

/// Names of the contexts in the user's kubeconfig.
pub fn kube_contexts() -> Result<(Vec<String>, Option<String>)> {
    let kc = Kubeconfig::read().context("reading kubeconfig")?;
    let names = kc.contexts.iter().map(|c| c.name.clone()).collect();
    Ok((names, kc.current_context))
}

#[async_trait::async_trait]
impl ObjectSource for KubeSource {
    async fn get_object(&self, target: &ResourceDescriptor) -> Result<serde_json::Value> {
        let t0 = Instant::now();
        let api_target = target.api_target().map_err(|e| anyhow!(e))?;
        info!(gvk = %api_target.gvk_key(), name = %target.name, ns = %target.namespace.as_deref().unwrap_or("-"), context = %target.context_id, "kube: get start");
        let client = self.client_for(&target.context_id).await?;
        let ar = api_resource(&api_target);
        let api: Api<DynamicObject> = if api_target.namespaced {
            match target.namespace.as_deref() {
                Some(ns) => Api::namespaced_with(client, ns, &ar),
                None => return Err(anyhow!("namespace required for namespaced kind")),
            }
        } else {
            Api::all_with(client, &ar)
        };
        let obj = api
            .get(&target.name)
            .await
            .with_context(|| format!("getting {} {}", api_target.kind, target.name))?;
        let mut raw = serde_json::to_value(&obj).context("serializing DynamicObject")?;
        sections::strip_managed_fields(&mut raw);
        histogram!("details_fetch_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(took_ms = %t0.elapsed().as_millis(), "kube: get ok");
        Ok(raw)
    }

    async fn get_section(&self, target: &ResourceDescriptor, section: Section, object: &serde_json::Value) -> Result<serde_json::Value> {
        debug!(section = ?section, name = %target.name, "kube: section start");
        let ns = target.namespace.as_deref();
        let out = match section {
            Section::Events => self.events(target, object).await?,
            Section::Quotas => {
                let items = self.list(target, &core_resource("ResourceQuota", "resourcequotas"), Some(&target.name), &ListParams::default()).await?;
                sections::shape_quotas(&items)
            }
            Section::LimitRanges => {
                let items = self.list(target, &core_resource("LimitRange", "limitranges"), Some(&target.name), &ListParams::default()).await?;
                sections::shape_limit_ranges(&items)
            }
            Section::MountingPods => {
                let pods = self.list(target, &core_resource("Pod", "pods"), ns, &ListParams::default()).await?;
                sections::pods_mounting_claim(&pods, &target.name)
            }
            Section::RelatedClaims => {
                let claims = self.list(target, &core_resource("PersistentVolumeClaim", "persistentvolumeclaims"), ns, &ListParams::default()).await?;
                sections::related_claims(&claims, object)
            }
            Section::Claims => {
                let claims = self.list(target, &core_resource("PersistentVolumeClaim", "persistentvolumeclaims"), None, &ListParams::default()).await?;
                sections::claims_for_storage_class(&claims, &target.name)
            }
            Section::ReferencingPods => {
                let pods = self.list(target, &core_resource("Pod", "pods"), ns, &ListParams::default()).await?;
                sections::pods_referencing(&pods, target.kind, &target.name)
            }
            Section::Endpoints => {
                let client = self.client_for(&target.context_id).await?;
                let ar = core_resource("Endpoints", "endpoints");
                let api: Api<DynamicObject> = match ns {
                    Some(ns) => Api::namespaced_with(client, ns, &ar),
                    None => return Err(anyhow!("namespace required for endpoints")),
                };
                match api.get_opt(&target.name).await.context("getting endpoints")? {
                    Some(ep) => sections::shape_endpoints(&serde_json::to_value(&ep)?),
                    None => serde_json::Value::Array(Vec::new()),
                }
            }
            Section::ReplicaSets => {
                let rs = self.list(target, &group_resource("apps", "ReplicaSet", "replicasets"), ns, &ListParams::default()).await?;
                sections::owned_replica_sets(&rs, object)
            }
            Section::Jobs => {
                let jobs = self.list(target, &group_resource("batch", "Job", "jobs"), ns, &ListParams::default()).await?;
                sections::owned_jobs(&jobs, object)
            }
            Section::NodePods => {
                let lp = ListParams::default().fields(&format!("spec.nodeName={}", target.name));
                let pods = self.list(target, &core_resource("Pod", "pods"), None, &lp).await?;
                sections::pod_summaries(&pods)
            }
        };
        Ok(out)
    }
}
