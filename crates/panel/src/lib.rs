//! Lookout details panel controller.
//!
//! One controller owns the single details panel, the active resource record and the load
//! operations feeding the panel. Loads run as spawned tasks and report back over a channel;
//! the controller applies a result only while its generation is still the active one.

#![forbid(unsafe_code)]

use std::sync::Arc;

use lookout_api::ProviderRegistry;
use lookout_core::{ResourceDescriptor, TtlPolicy};
use lookout_store::DetailsCache;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

pub mod active;
pub mod host;
pub mod model;
pub mod nav;
pub mod protocol;

mod panel;
mod router;
mod tasks;

pub use active::{ActiveContextStore, ActiveRecord};
pub use host::{PanelHost, PanelOptions, PanelSink, Placement, Workbench, VIEW_TYPE};
pub use model::{Applied, ControllerEvent, Generation, LoadMode, LoadOperation, LoadPhase, LoadUpdate};
pub use nav::NavTarget;
pub use protocol::{Command, InboundMessage, OutboundMessage};
pub use router::Routed;

pub type PanelId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelHandle {
    pub id: PanelId,
    pub title: String,
    /// Flips once; a disposed handle is never reused.
    pub disposed: bool,
}

pub struct DetailsController {
    host: Arc<dyn PanelHost>,
    workbench: Arc<dyn Workbench>,
    providers: ProviderRegistry,
    cache: Arc<dyn DetailsCache>,
    ttl: TtlPolicy,
    active: ActiveContextStore,
    panel: Option<PanelHandle>,
    panels_created: u64,
    load: LoadOperation,
    in_flight: usize,
    updates_tx: UnboundedSender<LoadUpdate>,
    updates_rx: UnboundedReceiver<LoadUpdate>,
    events_tx: UnboundedSender<ControllerEvent>,
    events_rx: UnboundedReceiver<ControllerEvent>,
}

impl DetailsController {
    pub fn new(
        host: Arc<dyn PanelHost>,
        workbench: Arc<dyn Workbench>,
        providers: ProviderRegistry,
        cache: Arc<dyn DetailsCache>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            host,
            workbench,
            providers,
            cache,
            ttl: TtlPolicy::from_env(),
            active: ActiveContextStore::new(),
            panel: None,
            panels_created: 0,
            load: LoadOperation::idle(),
            in_flight: 0,
            updates_tx,
            updates_rx,
            events_tx,
            events_rx,
        }
    }

    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle { tx: self.events_tx.clone() }
    }

    pub fn panel(&self) -> Option<&PanelHandle> {
        self.panel.as_ref()
    }

    pub fn panels_created(&self) -> u64 {
        self.panels_created
    }

    pub fn active(&self) -> &ActiveContextStore {
        &self.active
    }

    pub fn load(&self) -> LoadOperation {
        self.load
    }

    pub fn load_phase(&self) -> LoadPhase {
        self.load.phase
    }

    /// Spawned loads that have not reported their result yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn live_panel_id(&self) -> Option<&str> {
        self.panel.as_ref().filter(|p| !p.disposed).map(|p| p.id.as_str())
    }

    /// Apply one event. Returns false when the loop should stop.
    pub async fn handle_event(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::Show(descriptor) => {
                if let Err(err) = self.show(descriptor.kind, descriptor) {
                    warn!(error = %err, "controller: show failed");
                }
            }
            ControllerEvent::Message { panel, message } => {
                if self.live_panel_id() == Some(panel.as_str()) {
                    self.handle_message(message).await;
                } else {
                    debug!(panel = %panel, "controller: message from a retired panel");
                }
            }
            ControllerEvent::Disposed { panel } => {
                if self.panel.as_ref().map(|p| p.id.as_str()) == Some(panel.as_str()) {
                    self.dispose();
                }
            }
            ControllerEvent::Close => self.close(),
            ControllerEvent::Shutdown => return false,
        }
        true
    }

    /// Drive the controller until [`ControllerHandle::shutdown`].
    pub async fn run(mut self) {
        info!("controller: running");
        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                Some(update) = self.updates_rx.recv() => {
                    self.apply_update(update).await;
                }
                else => break,
            }
        }
        info!(pending = self.in_flight, "controller: stopped");
    }
}

/// Cloneable entry point for hosts driving a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: UnboundedSender<ControllerEvent>,
}

impl ControllerHandle {
    pub fn send(&self, event: ControllerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn show(&self, descriptor: ResourceDescriptor) -> bool {
        self.send(ControllerEvent::Show(descriptor))
    }

    pub fn close(&self) -> bool {
        self.send(ControllerEvent::Close)
    }

    pub fn shutdown(&self) -> bool {
        self.send(ControllerEvent::Shutdown)
    }
}
