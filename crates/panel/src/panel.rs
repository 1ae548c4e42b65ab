#![forbid(unsafe_code)]

use std::sync::Arc;

use lookout_core::{DetailsError, DetailsResult, ResourceDescriptor, ResourceKind};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::host::{PanelOptions, PanelSink};
use crate::model::{Generation, LoadMode, LoadOperation};
use crate::nav::{self, NavTarget};
use crate::{DetailsController, PanelHandle, PanelId};

impl DetailsController {
    /// Show a resource in the panel, creating the panel on first use and retitling it after.
    /// Whatever was showing before is superseded.
    pub fn show(&mut self, kind: ResourceKind, descriptor: ResourceDescriptor) -> DetailsResult<Generation> {
        if descriptor.kind != kind {
            return Err(DetailsError::DescriptorInvalid(format!(
                "{} descriptor shown as {}",
                descriptor.kind, kind
            )));
        }
        let descriptor = Arc::new(descriptor);
        let title = descriptor.title();
        let panel_id = self.ensure_panel(&title)?;
        let generation = self.active.set_active(kind, descriptor.clone());
        self.host.set_content(&panel_id, kind.info().template_id, &descriptor);
        self.host.reveal(&panel_id);
        info!(
            kind = %kind,
            name = %descriptor.name,
            ns = %descriptor.namespace.as_deref().unwrap_or("-"),
            context = %descriptor.context_id,
            generation,
            "panel: show"
        );
        self.start_load(generation, kind, descriptor, LoadMode::Show);
        Ok(generation)
    }

    /// Reload whatever is active, bypassing the cached entry.
    pub fn refresh(&mut self) -> DetailsResult<Generation> {
        let (kind, current) = match self.active.record() {
            Some(r) => (r.kind, r.descriptor.clone()),
            None => return Err(DetailsError::Protocol("refresh with nothing active".into())),
        };
        let descriptor = Arc::new(ResourceDescriptor::clone(&current));
        let generation = self.active.set_active(kind, descriptor.clone());
        info!(kind = %kind, name = %descriptor.name, generation, "panel: refresh");
        self.start_load(generation, kind, descriptor, LoadMode::Refresh);
        Ok(generation)
    }

    /// Follow a link from the active resource to `to`.
    pub fn navigate(&mut self, to: ResourceKind, target: NavTarget) -> DetailsResult<Generation> {
        let from = match self.active.record() {
            Some(r) => r.descriptor.clone(),
            None => return Err(DetailsError::Protocol("navigation with nothing active".into())),
        };
        let descriptor = nav::resolve(&from, to, target)?;
        info!(from = %from.kind, to = %to, name = %descriptor.name, context = %descriptor.context_id, "panel: navigate");
        self.show(to, descriptor)
    }

    /// The panel went away. Clears the active record and retires the handle; loads still in
    /// flight are dropped when they report. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.active.clear();
        self.load = LoadOperation::idle();
        match self.panel.as_mut() {
            Some(panel) if !panel.disposed => {
                panel.disposed = true;
                info!(panel = %panel.id, pending = self.in_flight, "panel: disposed");
            }
            _ => debug!("panel: dispose without a live panel"),
        }
    }

    /// Close the panel from the controller side.
    pub fn close(&mut self) {
        if let Some(id) = self.live_panel_id().map(str::to_string) {
            self.host.close(&id);
        }
        self.dispose();
    }

    fn ensure_panel(&mut self, title: &str) -> DetailsResult<PanelId> {
        if let Some(panel) = self.panel.as_mut().filter(|p| !p.disposed) {
            panel.title = title.to_string();
            self.host.set_title(&panel.id, title);
            return Ok(panel.id.clone());
        }
        let id = Uuid::new_v4().to_string();
        let options = PanelOptions::new(title);
        let sink = PanelSink::new(id.clone(), self.events_tx.clone());
        self.host.create_panel(&id, &options, sink).map_err(|e| {
            error!(error = %format!("{:#}", e), "panel: create failed");
            DetailsError::PanelUnavailable(format!("{:#}", e))
        })?;
        self.panels_created += 1;
        info!(panel = %id, title = %title, "panel: created");
        self.panel = Some(PanelHandle { id: id.clone(), title: title.to_string(), disposed: false });
        Ok(id)
    }
}
