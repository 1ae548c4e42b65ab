#![forbid(unsafe_code)]

//! Seams to the surrounding editor: the panel surface and the workbench commands
//! the router triggers.

use anyhow::anyhow;
use lookout_core::{ResourceDescriptor, ResourceIdentifier};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::ControllerEvent;
use crate::protocol::OutboundMessage;
use crate::PanelId;

pub const VIEW_TYPE: &str = "lookout.resourceDetails";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Active,
    Beside,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOptions {
    pub view_type: &'static str,
    pub title: String,
    pub placement: Placement,
    pub enable_scripts: bool,
    pub retain_context_when_hidden: bool,
}

impl PanelOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            view_type: VIEW_TYPE,
            title: title.into(),
            placement: Placement::Active,
            enable_scripts: true,
            retain_context_when_hidden: true,
        }
    }
}

/// Route from one panel back into the controller. Handed to the host when the panel
/// is created; events carry the panel id so a replaced panel cannot act on the new one.
#[derive(Debug, Clone)]
pub struct PanelSink {
    panel: PanelId,
    tx: UnboundedSender<ControllerEvent>,
}

impl PanelSink {
    pub(crate) fn new(panel: PanelId, tx: UnboundedSender<ControllerEvent>) -> Self {
        Self { panel, tx }
    }

    pub fn panel_id(&self) -> &str {
        &self.panel
    }

    /// Deliver a message posted by the panel content. Returns false once the
    /// controller is gone.
    pub fn post(&self, message: Value) -> bool {
        self.tx.send(ControllerEvent::Message { panel: self.panel.clone(), message }).is_ok()
    }

    /// The user closed the panel.
    pub fn disposed(&self) {
        let _ = self.tx.send(ControllerEvent::Disposed { panel: self.panel.clone() });
    }
}

/// Panel surface owned by the editor host.
pub trait PanelHost: Send + Sync {
    fn create_panel(&self, id: &str, options: &PanelOptions, sink: PanelSink) -> anyhow::Result<()>;
    fn set_title(&self, id: &str, title: &str);
    /// Load the static template for a kind; data arrives later through `post_message`.
    fn set_content(&self, id: &str, template_id: &str, descriptor: &ResourceDescriptor);
    fn reveal(&self, id: &str);
    fn post_message(&self, id: &str, message: &OutboundMessage) -> anyhow::Result<()>;
    fn close(&self, id: &str);
}

/// Workbench commands reachable from panel messages.
#[allow(unused_variables)]
#[async_trait::async_trait]
pub trait Workbench: Send + Sync {
    async fn write_clipboard(&self, text: &str) -> anyhow::Result<()>;
    async fn notify_error(&self, message: &str);
    async fn open_yaml_editor(&self, resource: ResourceIdentifier) -> anyhow::Result<()>;
    async fn set_default_namespace(&self, context_id: &str, namespace: &str) -> anyhow::Result<()>;
    /// Reveal a category of the resource tree, optionally scoped to a namespace.
    async fn reveal_category(&self, context_id: &str, category: &str, namespace: Option<&str>) -> anyhow::Result<()>;

    async fn open_terminal(&self, target: &ResourceDescriptor, container: Option<&str>) -> anyhow::Result<()> {
        Err(anyhow!("terminal: not implemented yet"))
    }

    async fn start_port_forward(
        &self,
        target: &ResourceDescriptor,
        local_port: Option<u16>,
        remote_port: Option<u16>,
    ) -> anyhow::Result<()> {
        Err(anyhow!("port-forward: not implemented yet"))
    }
}
