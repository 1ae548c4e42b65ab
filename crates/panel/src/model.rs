#![forbid(unsafe_code)]

use std::sync::Arc;

use lookout_core::{DetailsResult, ResourceDescriptor, ResourceKind};
use serde_json::Value;

use crate::PanelId;

/// Monotonic token identifying one load operation.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Validating,
    CacheHit,
    CacheMiss,
    Fetching,
    Displayed,
    Errored,
}

/// `Refresh` bypasses the cache read and always reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Show,
    Refresh,
}

/// The latest load started by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOperation {
    pub generation: Generation,
    pub mode: LoadMode,
    pub phase: LoadPhase,
}

impl LoadOperation {
    pub fn idle() -> Self {
        Self { generation: 0, mode: LoadMode::Show, phase: LoadPhase::Idle }
    }
}

/// Sent by load tasks back to the controller, which applies it only while the
/// generation is still current.
#[derive(Debug)]
pub enum LoadUpdate {
    Progress {
        generation: Generation,
        kind: ResourceKind,
        descriptor: Arc<ResourceDescriptor>,
        phase: LoadPhase,
    },
    Finished {
        generation: Generation,
        kind: ResourceKind,
        descriptor: Arc<ResourceDescriptor>,
        result: DetailsResult<Value>,
        from_cache: bool,
    },
}

/// What the controller did with a [`LoadUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Progress,
    Displayed,
    Errored,
    Stale,
}

/// Inputs of the controller's event loop.
#[derive(Debug)]
pub enum ControllerEvent {
    Show(ResourceDescriptor),
    Message { panel: PanelId, message: Value },
    Disposed { panel: PanelId },
    Close,
    Shutdown,
}
