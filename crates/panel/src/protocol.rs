#![forbid(unsafe_code)]

//! Wire shapes exchanged with the panel content.

use std::collections::BTreeMap;

use lookout_core::{DetailsError, DetailsResult, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::nav::NavTarget;

/// Message posted by the panel content.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub command: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl InboundMessage {
    pub fn parse(raw: Value) -> DetailsResult<Self> {
        serde_json::from_value(raw).map_err(|e| DetailsError::Protocol(format!("malformed message: {}", e)))
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.get(key)).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
    }

    fn data_port(&self, key: &str) -> Option<u16> {
        self.data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .and_then(|p| u16::try_from(p).ok())
    }

    fn name_or_data(&self) -> Option<String> {
        self.name.as_deref().filter(|s| !s.is_empty()).or_else(|| self.data_str("name")).map(str::to_string)
    }

    fn namespace_or_data(&self) -> Option<String> {
        self.namespace.as_deref().filter(|s| !s.is_empty()).or_else(|| self.data_str("namespace")).map(str::to_string)
    }
}

/// Recognized panel commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    CopyValue(String),
    OpenTerminal { container: Option<String> },
    StartPortForward { local_port: Option<u16>, remote_port: Option<u16> },
    ViewYaml,
    NavigateTo { kind: ResourceKind, target: NavTarget },
    NavigateToCategory { category: String, namespace: Option<String> },
    SetDefaultNamespace { namespace: Option<String> },
    NavigateToResource { resource_type: String, name: Option<String>, namespace: Option<String> },
}

impl Command {
    /// Whether the command's meaning depends on the active kind.
    pub fn is_kind_scoped(&self) -> bool {
        !matches!(
            self,
            Command::Refresh | Command::CopyValue(_) | Command::OpenTerminal { .. } | Command::StartPortForward { .. }
        )
    }

    pub fn from_message(msg: &InboundMessage) -> DetailsResult<Self> {
        let cmd = match msg.command.as_str() {
            "refresh" => Command::Refresh,
            "copyValue" => {
                let text = match (&msg.value, &msg.content) {
                    (Some(Value::String(s)), _) => s.clone(),
                    (Some(Value::Null), Some(c)) | (None, Some(c)) => c.clone(),
                    (Some(Value::Null), None) | (None, None) => match msg.data.as_ref().and_then(|d| d.get("value")) {
                        Some(Value::String(s)) => s.clone(),
                        Some(v) if !v.is_null() => v.to_string(),
                        _ => return Err(DetailsError::Protocol("copyValue without a value".into())),
                    },
                    (Some(v), _) => v.to_string(),
                };
                Command::CopyValue(text)
            }
            "openTerminal" => Command::OpenTerminal { container: msg.data_str("container").map(str::to_string) },
            "startPortForward" => Command::StartPortForward {
                local_port: msg.data_port("localPort"),
                remote_port: msg.data_port("remotePort").or_else(|| msg.data_port("port")),
            },
            "viewYaml" => Command::ViewYaml,
            "setDefaultNamespace" => Command::SetDefaultNamespace { namespace: msg.namespace_or_data().or_else(|| msg.name.clone()) },
            "navigateToCategory" => {
                let category = msg
                    .data_str("category")
                    .map(str::to_string)
                    .or_else(|| msg.name.clone())
                    .ok_or_else(|| DetailsError::Protocol("navigateToCategory without a category".into()))?;
                Command::NavigateToCategory { category, namespace: msg.namespace_or_data() }
            }
            "navigateToResource" => {
                let resource_type = msg
                    .data_str("resourceType")
                    .or_else(|| msg.data_str("kind"))
                    .map(str::to_string)
                    .ok_or_else(|| DetailsError::Protocol("navigateToResource without a resourceType".into()))?;
                Command::NavigateToResource { resource_type, name: msg.name_or_data(), namespace: msg.namespace_or_data() }
            }
            other => match other.strip_prefix("navigateTo").and_then(ResourceKind::parse) {
                Some(kind) => {
                    let name = msg
                        .name_or_data()
                        .ok_or_else(|| DetailsError::Protocol(format!("{} without a target name", other)))?;
                    let mut extra = BTreeMap::new();
                    for key in ["apiVersion", "kind", "plural"] {
                        if let Some(v) = msg.data_str(key) {
                            extra.insert(key.to_string(), Value::String(v.to_string()));
                        }
                    }
                    let target = NavTarget {
                        name,
                        namespace: msg.namespace_or_data(),
                        context_id: msg.data_str("contextId").map(str::to_string),
                        extra,
                    };
                    Command::NavigateTo { kind, target }
                }
                None => return Err(DetailsError::Protocol(format!("unknown command: {}", other))),
            },
        };
        Ok(cmd)
    }
}

/// Message pushed to the panel content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OutboundMessage {
    pub const ERROR: &'static str = "error";

    pub fn data(kind: ResourceKind, data: Value) -> Self {
        Self { command: kind.info().update_command.to_string(), data: Some(data), message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { command: Self::ERROR.to_string(), data: None, message: Some(message.into()) }
    }

    pub fn is_error(&self) -> bool {
        self.command == Self::ERROR
    }
}
