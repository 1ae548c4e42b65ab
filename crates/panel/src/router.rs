#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Arc;

use lookout_core::{DetailsError, ResourceDescriptor, ResourceKind};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use crate::host::Workbench;
use crate::nav;
use crate::protocol::{Command, InboundMessage};
use crate::DetailsController;

/// Outcome of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Handled,
    /// A side effect failed and the user was notified outside the panel.
    Notified(DetailsError),
    /// Malformed, unknown or not applicable to the active kind.
    Ignored(DetailsError),
}

async fn side_effect<F>(workbench: &dyn Workbench, action: &str, fut: F) -> Routed
where
    F: Future<Output = anyhow::Result<()>>,
{
    match fut.await {
        Ok(()) => Routed::Handled,
        Err(e) => {
            let err = DetailsError::SideEffectFailed(format!("{}: {:#}", action, e));
            warn!(error = %err, "router: side effect failed");
            workbench.notify_error(&err.to_string()).await;
            Routed::Notified(err)
        }
    }
}

impl DetailsController {
    /// Dispatch a message from the panel. Kind-scoped commands are routed by the active
    /// record, never by anything the message claims.
    pub async fn handle_message(&mut self, raw: Value) -> Routed {
        let command = match InboundMessage::parse(raw).and_then(|m| Command::from_message(&m)) {
            Ok(c) => c,
            Err(err) => return self.ignore(err),
        };
        debug!(command = ?command, active = ?self.active.active_kind(), "router: dispatch");
        let wb = self.workbench.clone();
        match command {
            Command::Refresh => match self.refresh() {
                Ok(_) => Routed::Handled,
                Err(err) => self.ignore(err),
            },
            Command::CopyValue(text) => side_effect(&*wb, "copy to clipboard", wb.write_clipboard(&text)).await,
            Command::OpenTerminal { container } => {
                let Some(target) = self.active_descriptor() else {
                    return self.ignore(DetailsError::Protocol("openTerminal with nothing active".into()));
                };
                side_effect(&*wb, "open terminal", wb.open_terminal(&target, container.as_deref())).await
            }
            Command::StartPortForward { local_port, remote_port } => {
                let Some(target) = self.active_descriptor() else {
                    return self.ignore(DetailsError::Protocol("startPortForward with nothing active".into()));
                };
                side_effect(&*wb, "start port-forward", wb.start_port_forward(&target, local_port, remote_port)).await
            }
            Command::ViewYaml => {
                let Some(target) = self.active_descriptor() else {
                    return self.ignore(DetailsError::Protocol("viewYaml with nothing active".into()));
                };
                match target.identifier() {
                    Ok(id) => side_effect(&*wb, "open yaml", wb.open_yaml_editor(id)).await,
                    Err(err) => self.ignore(err),
                }
            }
            Command::NavigateTo { kind, target } => match self.navigate(kind, target) {
                Ok(_) => Routed::Handled,
                Err(err) => self.ignore(err),
            },
            Command::NavigateToCategory { category, namespace } => {
                let Some(from) = self.active_descriptor().filter(|d| nav::reveals_categories(d.kind)) else {
                    return self.ignore(DetailsError::Protocol(format!(
                        "navigateToCategory is not available for {:?}",
                        self.active.active_kind()
                    )));
                };
                side_effect(&*wb, "reveal category", wb.reveal_category(&from.context_id, &category, namespace.as_deref())).await
            }
            Command::SetDefaultNamespace { namespace } => {
                let Some(ns) = self.active.active_for(ResourceKind::Namespace).cloned() else {
                    return self.ignore(DetailsError::Protocol("setDefaultNamespace outside a Namespace panel".into()));
                };
                let namespace = namespace.unwrap_or_else(|| ns.name.clone());
                side_effect(&*wb, "set default namespace", wb.set_default_namespace(&ns.context_id, &namespace)).await
            }
            Command::NavigateToResource { resource_type, name, namespace } => {
                let Some(ns) = self.active.active_for(ResourceKind::Namespace).cloned() else {
                    return self.ignore(DetailsError::Protocol("navigateToResource outside a Namespace panel".into()));
                };
                let namespace = namespace.unwrap_or_else(|| ns.name.clone());
                match name {
                    Some(name) => {
                        let Some(kind) = ResourceKind::parse(&resource_type) else {
                            return self.ignore(DetailsError::Protocol(format!("unknown resource type: {}", resource_type)));
                        };
                        let mut descriptor = ResourceDescriptor::new(kind, name, ns.context_id.clone());
                        if descriptor.requires_namespace() {
                            descriptor.namespace = Some(namespace);
                        }
                        match self.show(kind, descriptor) {
                            Ok(_) => Routed::Handled,
                            Err(err) => self.ignore(err),
                        }
                    }
                    None => {
                        side_effect(&*wb, "reveal category", wb.reveal_category(&ns.context_id, &resource_type, Some(&namespace)))
                            .await
                    }
                }
            }
        }
    }

    fn active_descriptor(&self) -> Option<Arc<ResourceDescriptor>> {
        self.active.record().map(|r| r.descriptor.clone())
    }

    fn ignore(&self, err: DetailsError) -> Routed {
        counter!("router_protocol_errors_total", 1u64);
        warn!(error = %err, active = ?self.active.active_kind(), "router: ignoring message");
        Routed::Ignored(err)
    }
}
