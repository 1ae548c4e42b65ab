#![forbid(unsafe_code)]

use std::sync::Arc;

use lookout_core::{ResourceDescriptor, ResourceKind};

use crate::model::Generation;

/// The one resource the panel is showing.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRecord {
    pub kind: ResourceKind,
    pub descriptor: Arc<ResourceDescriptor>,
    pub generation: Generation,
}

/// Single active slot plus the generation counter that stamps every load.
#[derive(Debug, Default)]
pub struct ActiveContextStore {
    counter: Generation,
    active: Option<ActiveRecord>,
}

impl ActiveContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was active and return the new generation.
    pub fn set_active(&mut self, kind: ResourceKind, descriptor: Arc<ResourceDescriptor>) -> Generation {
        self.counter += 1;
        self.active = Some(ActiveRecord { kind, descriptor, generation: self.counter });
        self.counter
    }

    pub fn is_current(&self, kind: ResourceKind, descriptor: &ResourceDescriptor, generation: Generation) -> bool {
        match &self.active {
            Some(a) => a.generation == generation && a.kind == kind && *a.descriptor == *descriptor,
            None => false,
        }
    }

    pub fn get_active(&self) -> Option<(ResourceKind, &ResourceDescriptor)> {
        self.active.as_ref().map(|a| (a.kind, a.descriptor.as_ref()))
    }

    pub fn record(&self) -> Option<&ActiveRecord> {
        self.active.as_ref()
    }

    /// Per-kind view: the active descriptor if, and only if, `kind` is the active kind.
    pub fn active_for(&self, kind: ResourceKind) -> Option<&ResourceDescriptor> {
        self.active.as_ref().filter(|a| a.kind == kind).map(|a| a.descriptor.as_ref())
    }

    pub fn active_kind(&self) -> Option<ResourceKind> {
        self.active.as_ref().map(|a| a.kind)
    }

    /// Latest generation handed out; survives `clear`.
    pub fn generation(&self) -> Generation {
        self.counter
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}
