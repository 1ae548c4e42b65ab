#![forbid(unsafe_code)]

//! Headless panel host speaking JSON lines: host events on stdout, panel messages and
//! control lines on stdin.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use lookout_core::{ResourceDescriptor, ResourceIdentifier};
use lookout_panel::{ControllerHandle, OutboundMessage, PanelHost, PanelOptions, PanelSink, Workbench};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum HostEvent<'a> {
    #[serde(rename_all = "camelCase")]
    PanelCreated { id: &'a str, title: &'a str, view_type: &'a str, enable_scripts: bool, retain_context_when_hidden: bool },
    Title { id: &'a str, title: &'a str },
    Content { id: &'a str, template: &'a str, resource: &'a ResourceDescriptor },
    Reveal { id: &'a str },
    Message { id: &'a str, message: &'a OutboundMessage },
    Closed { id: &'a str },
    Clipboard { text: &'a str },
    Notify { message: &'a str },
    OpenYaml { resource: &'a ResourceIdentifier },
    DefaultNamespace { context: &'a str, namespace: &'a str },
    RevealCategory { context: &'a str, category: &'a str, namespace: Option<&'a str> },
}

/// Host and workbench backed by stdout.
#[derive(Default)]
pub struct StdioHost {
    sink: Mutex<Option<PanelSink>>,
}

impl StdioHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, event: &HostEvent<'_>) -> Result<()> {
        let line = serde_json::to_string(event).context("encoding host event")?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", line).context("writing host event")?;
        out.flush().context("flushing stdout")
    }

    fn emit_logged(&self, event: &HostEvent<'_>) {
        if let Err(e) = self.emit(event) {
            warn!(error = %format!("{:#}", e), "bridge: emit failed");
        }
    }

    fn current_sink(&self) -> Option<PanelSink> {
        self.sink.lock().ok().and_then(|s| s.clone())
    }
}

impl PanelHost for StdioHost {
    fn create_panel(&self, id: &str, options: &PanelOptions, sink: PanelSink) -> Result<()> {
        self.emit(&HostEvent::PanelCreated {
            id,
            title: &options.title,
            view_type: options.view_type,
            enable_scripts: options.enable_scripts,
            retain_context_when_hidden: options.retain_context_when_hidden,
        })?;
        let mut slot = self.sink.lock().map_err(|_| anyhow!("panel sink lock poisoned"))?;
        *slot = Some(sink);
        Ok(())
    }

    fn set_title(&self, id: &str, title: &str) {
        self.emit_logged(&HostEvent::Title { id, title });
    }

    fn set_content(&self, id: &str, template_id: &str, descriptor: &ResourceDescriptor) {
        self.emit_logged(&HostEvent::Content { id, template: template_id, resource: descriptor });
    }

    fn reveal(&self, id: &str) {
        self.emit_logged(&HostEvent::Reveal { id });
    }

    fn post_message(&self, id: &str, message: &OutboundMessage) -> Result<()> {
        self.emit(&HostEvent::Message { id, message })
    }

    fn close(&self, id: &str) {
        self.emit_logged(&HostEvent::Closed { id });
    }
}

#[async_trait::async_trait]
impl Workbench for StdioHost {
    async fn write_clipboard(&self, text: &str) -> Result<()> {
        self.emit(&HostEvent::Clipboard { text })
    }

    async fn notify_error(&self, message: &str) {
        self.emit_logged(&HostEvent::Notify { message });
    }

    async fn open_yaml_editor(&self, resource: ResourceIdentifier) -> Result<()> {
        self.emit(&HostEvent::OpenYaml { resource: &resource })
    }

    async fn set_default_namespace(&self, context_id: &str, namespace: &str) -> Result<()> {
        self.emit(&HostEvent::DefaultNamespace { context: context_id, namespace })
    }

    async fn reveal_category(&self, context_id: &str, category: &str, namespace: Option<&str>) -> Result<()> {
        self.emit(&HostEvent::RevealCategory { context: context_id, category, namespace })
    }
}

/// One stdin line.
#[derive(Debug, PartialEq)]
pub enum InputLine {
    Show(ResourceDescriptor),
    Dispose,
    Close,
    Message(Value),
}

pub fn parse_line(line: &str) -> Result<InputLine> {
    let value: Value = serde_json::from_str(line).context("stdin line is not JSON")?;
    if let Some(show) = value.get("show") {
        let descriptor: ResourceDescriptor = serde_json::from_value(show.clone()).context("invalid `show` descriptor")?;
        return Ok(InputLine::Show(descriptor));
    }
    if value.get("dispose").and_then(Value::as_bool) == Some(true) {
        return Ok(InputLine::Dispose);
    }
    if value.get("close").and_then(Value::as_bool) == Some(true) {
        return Ok(InputLine::Close);
    }
    Ok(InputLine::Message(value))
}

/// Feed stdin into the controller until EOF or ctrl-c.
pub async fn pump_stdin(host: &StdioHost, handle: &ControllerHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("bridge: interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(InputLine::Show(descriptor)) => {
                handle.show(descriptor);
            }
            Ok(InputLine::Close) => {
                handle.close();
            }
            Ok(InputLine::Dispose) => match host.current_sink() {
                Some(sink) => sink.disposed(),
                None => debug!("bridge: dispose without a panel"),
            },
            Ok(InputLine::Message(message)) => match host.current_sink() {
                Some(sink) => {
                    sink.post(message);
                }
                None => warn!("bridge: message before any panel was shown"),
            },
            Err(e) => warn!(error = %format!("{:#}", e), "bridge: skipping line"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::ResourceKind;
    use serde_json::json;

    #[test]
    fn control_lines() {
        let line = r#"{"show":{"kind":"Pod","name":"web-1","namespace":"default","contextId":"prod"}}"#;
        assert_eq!(
            parse_line(line).unwrap(),
            InputLine::Show(ResourceDescriptor::namespaced(ResourceKind::Pod, "default", "web-1", "prod"))
        );
        assert_eq!(parse_line(r#"{"dispose":true}"#).unwrap(), InputLine::Dispose);
        assert_eq!(parse_line(r#"{"close":true}"#).unwrap(), InputLine::Close);
        assert_eq!(parse_line(r#"{"command":"refresh"}"#).unwrap(), InputLine::Message(json!({"command": "refresh"})));
        assert!(parse_line("not json").is_err());
        assert!(parse_line(r#"{"show":{"kind":"Nope","name":"x"}}"#).is_err());
    }

    #[test]
    fn host_events_are_tagged() {
        let msg = OutboundMessage::error("boom");
        let v = serde_json::to_value(HostEvent::Message { id: "p1", message: &msg }).unwrap();
        assert_eq!(v, json!({"event": "message", "id": "p1", "message": {"command": "error", "message": "boom"}}));
        let v = serde_json::to_value(HostEvent::PanelCreated {
            id: "p1",
            title: "Pod / web-1",
            view_type: "lookout.resourceDetails",
            enable_scripts: true,
            retain_context_when_hidden: true,
        })
        .unwrap();
        assert_eq!(v["event"], "panelCreated");
        assert_eq!(v["viewType"], "lookout.resourceDetails");
    }
}
