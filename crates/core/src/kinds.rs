//! Per-kind behaviour as data: scope, API version, cache prefix, panel template, outbound
//! update command, TTL category and the descriptive sections each provider adds.
//!
//! Adding a kind means adding a `ResourceKind` variant and one entry here; the match in
//! [`kind_info`] keeps that exhaustive.

#![forbid(unsafe_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ResourceKind;

/// Best-effort data a provider gathers next to the primary object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Events,
    Quotas,
    LimitRanges,
    MountingPods,
    RelatedClaims,
    Claims,
    ReferencingPods,
    Endpoints,
    ReplicaSets,
    Jobs,
    NodePods,
}

impl Section {
    /// Key under which the section lands in the payload.
    pub fn key(self) -> &'static str {
        match self {
            Section::Events => "events",
            Section::Quotas => "quotas",
            Section::LimitRanges => "limitRanges",
            Section::MountingPods => "pods",
            Section::RelatedClaims => "relatedClaims",
            Section::Claims => "claims",
            Section::ReferencingPods => "pods",
            Section::Endpoints => "endpoints",
            Section::ReplicaSets => "replicaSets",
            Section::Jobs => "jobs",
            Section::NodePods => "pods",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TtlCategory {
    Workload,
    Config,
    Storage,
    Cluster,
    Generic,
}

#[derive(Debug)]
pub struct KindInfo {
    pub kind: ResourceKind,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Empty for `Generic`; the descriptor carries its own.
    pub api_version: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
    pub cache_prefix: &'static str,
    pub template_id: &'static str,
    pub update_command: &'static str,
    pub ttl: TtlCategory,
    pub sections: &'static [Section],
}

static POD: KindInfo = KindInfo {
    kind: ResourceKind::Pod,
    name: "Pod",
    aliases: &["po", "pods"],
    api_version: "v1",
    plural: "pods",
    namespaced: true,
    cache_prefix: "pod",
    template_id: "pod-details",
    update_command: "updatePodData",
    ttl: TtlCategory::Workload,
    sections: &[Section::Events],
};

static NAMESPACE: KindInfo = KindInfo {
    kind: ResourceKind::Namespace,
    name: "Namespace",
    aliases: &["ns", "namespaces"],
    api_version: "v1",
    plural: "namespaces",
    namespaced: false,
    cache_prefix: "namespace",
    template_id: "namespace-details",
    update_command: "updateNamespaceData",
    ttl: TtlCategory::Cluster,
    sections: &[Section::Quotas, Section::LimitRanges],
};

static PVC: KindInfo = KindInfo {
    kind: ResourceKind::PersistentVolumeClaim,
    name: "PersistentVolumeClaim",
    aliases: &["pvc", "pvcs", "persistentvolumeclaims"],
    api_version: "v1",
    plural: "persistentvolumeclaims",
    namespaced: true,
    cache_prefix: "pvc",
    template_id: "pvc-details",
    update_command: "updatePersistentVolumeClaimData",
    ttl: TtlCategory::Storage,
    sections: &[Section::Events, Section::MountingPods, Section::RelatedClaims],
};

static PV: KindInfo = KindInfo {
    kind: ResourceKind::PersistentVolume,
    name: "PersistentVolume",
    aliases: &["pv", "pvs", "persistentvolumes"],
    api_version: "v1",
    plural: "persistentvolumes",
    namespaced: false,
    cache_prefix: "pv",
    template_id: "pv-details",
    update_command: "updatePersistentVolumeData",
    ttl: TtlCategory::Storage,
    sections: &[Section::Events],
};

static SECRET: KindInfo = KindInfo {
    kind: ResourceKind::Secret,
    name: "Secret",
    aliases: &["secrets"],
    api_version: "v1",
    plural: "secrets",
    namespaced: true,
    cache_prefix: "secret",
    template_id: "secret-details",
    update_command: "updateSecretData",
    ttl: TtlCategory::Config,
    sections: &[Section::Events, Section::ReferencingPods],
};

static SERVICE: KindInfo = KindInfo {
    kind: ResourceKind::Service,
    name: "Service",
    aliases: &["svc", "services"],
    api_version: "v1",
    plural: "services",
    namespaced: true,
    cache_prefix: "service",
    template_id: "service-details",
    update_command: "updateServiceData",
    ttl: TtlCategory::Config,
    sections: &[Section::Events, Section::Endpoints],
};

static CONFIG_MAP: KindInfo = KindInfo {
    kind: ResourceKind::ConfigMap,
    name: "ConfigMap",
    aliases: &["cm", "configmaps"],
    api_version: "v1",
    plural: "configmaps",
    namespaced: true,
    cache_prefix: "configmap",
    template_id: "configmap-details",
    update_command: "updateConfigMapData",
    ttl: TtlCategory::Config,
    sections: &[Section::Events, Section::ReferencingPods],
};

static STORAGE_CLASS: KindInfo = KindInfo {
    kind: ResourceKind::StorageClass,
    name: "StorageClass",
    aliases: &["sc", "storageclasses"],
    api_version: "storage.k8s.io/v1",
    plural: "storageclasses",
    namespaced: false,
    cache_prefix: "storageclass",
    template_id: "storageclass-details",
    update_command: "updateStorageClassData",
    ttl: TtlCategory::Storage,
    sections: &[Section::Claims],
};

static DEPLOYMENT: KindInfo = KindInfo {
    kind: ResourceKind::Deployment,
    name: "Deployment",
    aliases: &["deploy", "deployments"],
    api_version: "apps/v1",
    plural: "deployments",
    namespaced: true,
    cache_prefix: "deployment",
    template_id: "deployment-details",
    update_command: "updateDeploymentData",
    ttl: TtlCategory::Workload,
    sections: &[Section::Events, Section::ReplicaSets],
};

static CRON_JOB: KindInfo = KindInfo {
    kind: ResourceKind::CronJob,
    name: "CronJob",
    aliases: &["cj", "cronjobs"],
    api_version: "batch/v1",
    plural: "cronjobs",
    namespaced: true,
    cache_prefix: "cronjob",
    template_id: "cronjob-details",
    update_command: "updateCronJobData",
    ttl: TtlCategory::Workload,
    sections: &[Section::Events, Section::Jobs],
};

static NODE: KindInfo = KindInfo {
    kind: ResourceKind::Node,
    name: "Node",
    aliases: &["no", "nodes"],
    api_version: "v1",
    plural: "nodes",
    namespaced: false,
    cache_prefix: "node",
    template_id: "node-details",
    update_command: "updateNodeData",
    ttl: TtlCategory::Cluster,
    sections: &[Section::Events, Section::NodePods],
};

static GENERIC: KindInfo = KindInfo {
    kind: ResourceKind::Generic,
    name: "Resource",
    aliases: &["generic"],
    api_version: "",
    plural: "",
    namespaced: false,
    cache_prefix: "generic",
    template_id: "generic-details",
    update_command: "updateResourceData",
    ttl: TtlCategory::Generic,
    sections: &[Section::Events],
};

pub fn kind_info(kind: ResourceKind) -> &'static KindInfo {
    match kind {
        ResourceKind::Pod => &POD,
        ResourceKind::Namespace => &NAMESPACE,
        ResourceKind::PersistentVolumeClaim => &PVC,
        ResourceKind::PersistentVolume => &PV,
        ResourceKind::Secret => &SECRET,
        ResourceKind::Service => &SERVICE,
        ResourceKind::ConfigMap => &CONFIG_MAP,
        ResourceKind::StorageClass => &STORAGE_CLASS,
        ResourceKind::Deployment => &DEPLOYMENT,
        ResourceKind::CronJob => &CRON_JOB,
        ResourceKind::Node => &NODE,
        ResourceKind::Generic => &GENERIC,
    }
}

/// Cache lifetimes per kind category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub workload: Duration,
    pub config: Duration,
    pub storage: Duration,
    pub cluster: Duration,
    pub generic: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            workload: Duration::from_secs(15),
            config: Duration::from_secs(60),
            storage: Duration::from_secs(60),
            cluster: Duration::from_secs(120),
            generic: Duration::from_secs(30),
        }
    }
}

impl TtlPolicy {
    /// Upper bound for any cache lifetime.
    pub const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Read `LOOKOUT_TTL_{WORKLOAD,CONFIG,STORAGE,CLUSTER,GENERIC}_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs).min(Self::MAX_TTL))
                .unwrap_or(default)
        };
        Self {
            workload: secs("LOOKOUT_TTL_WORKLOAD_SECS", d.workload),
            config: secs("LOOKOUT_TTL_CONFIG_SECS", d.config),
            storage: secs("LOOKOUT_TTL_STORAGE_SECS", d.storage),
            cluster: secs("LOOKOUT_TTL_CLUSTER_SECS", d.cluster),
            generic: secs("LOOKOUT_TTL_GENERIC_SECS", d.generic),
        }
    }

    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        let ttl = match kind_info(kind).ttl {
            TtlCategory::Workload => self.workload,
            TtlCategory::Config => self.config,
            TtlCategory::Storage => self.storage,
            TtlCategory::Cluster => self.cluster,
            TtlCategory::Generic => self.generic,
        };
        ttl.min(Self::MAX_TTL)
    }
}
