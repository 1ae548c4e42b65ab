//! Lookout core types: resource kinds, descriptors, cache keys and the error taxonomy
//! shared by providers, the cache and the panel controller.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod kinds;

pub use kinds::{kind_info, KindInfo, Section, TtlCategory, TtlPolicy};

/// Closed set of kinds the details panel knows how to show.
///
/// `Generic` is the fallback for anything without a specialized provider; the concrete
/// group/version/kind then travels in the descriptor's `extra` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    Namespace,
    PersistentVolumeClaim,
    PersistentVolume,
    Secret,
    Service,
    ConfigMap,
    StorageClass,
    Deployment,
    CronJob,
    Node,
    Generic,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::Pod,
        ResourceKind::Namespace,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::PersistentVolume,
        ResourceKind::Secret,
        ResourceKind::Service,
        ResourceKind::ConfigMap,
        ResourceKind::StorageClass,
        ResourceKind::Deployment,
        ResourceKind::CronJob,
        ResourceKind::Node,
        ResourceKind::Generic,
    ];

    pub fn info(self) -> &'static KindInfo {
        kind_info(self)
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    /// Parse a kind name or one of its kubectl-style short names (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim();
        Self::ALL.into_iter().find(|k| {
            let info = k.info();
            info.name.eq_ignore_ascii_case(needle)
                || info.aliases.iter().any(|a| a.eq_ignore_ascii_case(needle))
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = DetailsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DetailsError::DescriptorInvalid(format!("unknown kind: {}", s)))
    }
}

/// Identifies one resource instance. Built once and never mutated; navigation and refresh
/// always produce a fresh descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Cluster context identifier; empty means the current kubeconfig context.
    #[serde(default)]
    pub context_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, name: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self { kind, name: name.into(), namespace: None, context_id: context_id.into(), extra: BTreeMap::new() }
    }

    pub fn namespaced(
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        Self::new(kind, name, context_id).with_namespace(namespace)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Kind label used in titles; generic descriptors show the concrete kind they carry.
    pub fn display_kind(&self) -> &str {
        match self.kind {
            ResourceKind::Generic => self.extra_str("kind").unwrap_or(self.kind.as_str()),
            k => k.as_str(),
        }
    }

    pub fn title(&self) -> String {
        format!("{} / {}", self.display_kind(), self.name)
    }

    pub fn requires_namespace(&self) -> bool {
        match self.kind {
            ResourceKind::Generic => self.extra.get("namespaced").and_then(|v| v.as_bool()).unwrap_or(false),
            k => k.info().namespaced,
        }
    }

    /// Reject incomplete descriptors before any cache or network access.
    pub fn validate(&self) -> DetailsResult<()> {
        if self.name.trim().is_empty() {
            return Err(DetailsError::DescriptorInvalid(format!("{} name is empty", self.display_kind())));
        }
        if self.requires_namespace() && self.namespace.as_deref().map_or(true, |ns| ns.trim().is_empty()) {
            return Err(DetailsError::DescriptorInvalid(format!(
                "namespace is required for {} {}",
                self.display_kind(),
                self.name
            )));
        }
        if self.kind == ResourceKind::Generic {
            for key in ["apiVersion", "kind"] {
                if self.extra_str(key).map_or(true, str::is_empty) {
                    return Err(DetailsError::DescriptorInvalid(format!(
                        "generic resource {} is missing `{}`",
                        self.name, key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Composite cache key: `{kind}-describe:{contextId}:{namespace}:{name}`.
    pub fn cache_key(&self) -> String {
        let prefix = match self.kind {
            ResourceKind::Generic => self
                .extra_str("kind")
                .map(|k| k.to_ascii_lowercase())
                .unwrap_or_else(|| self.kind.info().cache_prefix.to_string()),
            k => k.info().cache_prefix.to_string(),
        };
        format!(
            "{}-describe:{}:{}:{}",
            prefix,
            self.context_id,
            self.namespace.as_deref().unwrap_or(""),
            self.name
        )
    }

    pub fn api_version(&self) -> Option<&str> {
        match self.kind {
            ResourceKind::Generic => self.extra_str("apiVersion"),
            k => Some(k.info().api_version),
        }
    }

    /// Resolve group/version/kind/plural for API access.
    pub fn api_target(&self) -> DetailsResult<ApiTarget> {
        self.validate()?;
        let api_version = self.api_version().unwrap_or_default();
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version.to_string()),
        };
        let (kind, plural) = match self.kind {
            ResourceKind::Generic => {
                let kind = self.extra_str("kind").unwrap_or_default().to_string();
                let plural = self
                    .extra_str("plural")
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| format!("{}s", kind.to_ascii_lowercase()));
                (kind, plural)
            }
            k => (k.info().name.to_string(), k.info().plural.to_string()),
        };
        Ok(ApiTarget { group, version, kind, plural, namespaced: self.requires_namespace() })
    }

    /// Identifier handed to the YAML editor.
    pub fn identifier(&self) -> DetailsResult<ResourceIdentifier> {
        let target = self.api_target()?;
        Ok(ResourceIdentifier {
            kind: target.kind,
            name: self.name.clone(),
            namespace: if target.namespaced { self.namespace.clone() } else { None },
            api_version: self.api_version().unwrap_or_default().to_string(),
            cluster: self.context_id.clone(),
        })
    }
}

/// Group/version/kind plus plural and scope for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTarget {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl ApiTarget {
    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Resource reference for the YAML editor hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub api_version: String,
    pub cluster: String,
}

/// Errors surfaced by the details layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DetailsError {
    #[error("invalid descriptor: {0}")]
    DescriptorInvalid(String),
    #[error("failed to fetch {target}: {message}")]
    PrimaryFetchFailed { target: String, message: String },
    #[error("secondary fetch `{section}` failed: {message}")]
    SecondaryFetchFailed { section: String, message: String },
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("side effect failed: {0}")]
    SideEffectFailed(String),
    #[error("panel unavailable: {0}")]
    PanelUnavailable(String),
}

impl DetailsError {
    /// Whether the error belongs in the panel (as opposed to logs or a transient notification).
    pub fn is_user_visible(&self) -> bool {
        matches!(self, DetailsError::DescriptorInvalid(_) | DetailsError::PrimaryFetchFailed { .. })
    }
}

pub type DetailsResult<T> = Result<T, DetailsError>;

/// Raw access to cluster objects. The primary object is mandatory; sections are best-effort
/// descriptive data derived from the object (events, dependents, history).
#[async_trait::async_trait]
pub trait ObjectSource: Send + Sync {
    async fn get_object(&self, target: &ResourceDescriptor) -> anyhow::Result<serde_json::Value>;

    async fn get_section(
        &self,
        target: &ResourceDescriptor,
        section: Section,
        object: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}
