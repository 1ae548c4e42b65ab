#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use lookout_core::{DetailsError, DetailsResult, ResourceDescriptor, ResourceKind};
use serde_json::Value;

/// Target of a navigation request as sent by the panel: never the source kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavTarget {
    pub name: String,
    pub namespace: Option<String>,
    pub context_id: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl NavTarget {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Resource-to-resource links a panel may follow.
pub fn is_edge(from: ResourceKind, to: ResourceKind) -> bool {
    use ResourceKind::*;
    matches!(
        (from, to),
        (PersistentVolumeClaim, Pod)
            | (PersistentVolumeClaim, PersistentVolumeClaim)
            | (PersistentVolume, PersistentVolumeClaim)
            | (StorageClass, PersistentVolumeClaim)
            | (ConfigMap, Pod)
    )
}

/// Kinds whose panels link into tree categories instead of single resources.
pub fn reveals_categories(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Node | ResourceKind::Generic)
}

/// Build the descriptor a navigation from `from` lands on.
///
/// A target without a context stays in the source's context. A namespaced target without a
/// namespace stays in the source's namespace.
pub fn resolve(from: &ResourceDescriptor, to: ResourceKind, target: NavTarget) -> DetailsResult<ResourceDescriptor> {
    if !is_edge(from.kind, to) {
        return Err(DetailsError::Protocol(format!("no navigation from {} to {}", from.kind, to)));
    }
    let context_id = target.context_id.filter(|c| !c.is_empty()).unwrap_or_else(|| from.context_id.clone());
    let mut descriptor = ResourceDescriptor::new(to, target.name, context_id);
    descriptor.extra = target.extra;
    descriptor.namespace = match target.namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) => Some(ns),
        None if descriptor.requires_namespace() => from.namespace.clone(),
        None => None,
    };
    Ok(descriptor)
}
