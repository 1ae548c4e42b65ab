#![forbid(unsafe_code)]

mod common;

use std::sync::atomic::Ordering;

use common::{harness, pod, Harness};
use lookout_core::{DetailsError, ResourceDescriptor, ResourceKind};
use lookout_panel::{LoadPhase, Routed};
use serde_json::json;

async fn showing(kind: ResourceKind, descriptor: ResourceDescriptor) -> Harness {
    let mut h = harness();
    h.controller.show(kind, descriptor).unwrap();
    h.controller.settle().await;
    h
}

fn namespace(name: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(ResourceKind::Namespace, name, "prod")
}

#[tokio::test]
async fn unknown_and_malformed_messages_are_ignored() {
    let mut h = showing(ResourceKind::Pod, pod("web-1")).await;
    let posts = h.host.posts().len();

    for raw in [json!({ "command": "selfDestruct" }), json!({ "data": {} }), json!(42), json!({ "command": "navigateToPod" })] {
        let routed = h.controller.handle_message(raw).await;
        assert!(matches!(routed, Routed::Ignored(DetailsError::Protocol(_))), "got {routed:?}");
    }
    assert_eq!(h.host.posts().len(), posts);
    assert_eq!(h.controller.load_phase(), LoadPhase::Displayed);
    assert_eq!(h.controller.active().active_kind(), Some(ResourceKind::Pod));
}

#[tokio::test]
async fn copy_value_writes_clipboard() {
    let mut h = showing(ResourceKind::Service, ResourceDescriptor::namespaced(ResourceKind::Service, "default", "checkout", "prod")).await;
    assert_eq!(h.controller.handle_message(json!({ "command": "copyValue", "value": "10.96.0.12" })).await, Routed::Handled);
    assert_eq!(*h.workbench.clipboard.lock().unwrap(), vec!["10.96.0.12".to_string()]);
}

#[tokio::test]
async fn clipboard_failure_notifies_without_touching_panel() {
    let mut h = showing(ResourceKind::Pod, pod("web-1")).await;
    h.workbench.fail_clipboard.store(true, Ordering::SeqCst);
    let posts = h.host.posts().len();

    let routed = h.controller.handle_message(json!({ "command": "copyValue", "content": "x" })).await;
    assert!(matches!(routed, Routed::Notified(DetailsError::SideEffectFailed(_))));
    let notes = h.workbench.notifications.lock().unwrap().clone();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains("clipboard unavailable"));
    assert_eq!(h.host.posts().len(), posts);
    assert_eq!(h.controller.load_phase(), LoadPhase::Displayed);
}

#[tokio::test]
async fn terminal_and_port_forward_defer_to_workbench() {
    let mut h = showing(ResourceKind::Pod, pod("web-1")).await;
    let routed = h.controller.handle_message(json!({ "command": "openTerminal", "data": { "container": "app" } })).await;
    assert!(matches!(routed, Routed::Notified(_)));
    let routed = h.controller.handle_message(json!({ "command": "startPortForward", "data": { "port": 8080 } })).await;
    assert!(matches!(routed, Routed::Notified(_)));
    assert_eq!(h.workbench.notifications.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn view_yaml_uses_active_descriptor() {
    let mut h = showing(
        ResourceKind::Deployment,
        ResourceDescriptor::namespaced(ResourceKind::Deployment, "shop", "frontend", "prod"),
    )
    .await;
    assert_eq!(h.controller.handle_message(json!({ "command": "viewYaml", "kind": "Pod", "name": "other" })).await, Routed::Handled);
    let yaml = h.workbench.yaml.lock().unwrap().clone();
    assert_eq!(yaml.len(), 1);
    assert_eq!(yaml[0].kind, "Deployment");
    assert_eq!(yaml[0].name, "frontend");
    assert_eq!(yaml[0].namespace.as_deref(), Some("shop"));
    assert_eq!(yaml[0].api_version, "apps/v1");
    assert_eq!(yaml[0].cluster, "prod");
}

#[tokio::test]
async fn view_yaml_with_nothing_active_is_ignored() {
    let mut h = harness();
    assert!(matches!(h.controller.handle_message(json!({ "command": "viewYaml" })).await, Routed::Ignored(_)));
    assert!(matches!(h.controller.handle_message(json!({ "command": "refresh" })).await, Routed::Ignored(_)));
    assert!(h.workbench.yaml.lock().unwrap().is_empty());
}

#[tokio::test]
async fn namespace_commands_follow_active_kind_not_message() {
    let mut h = showing(ResourceKind::Pod, pod("web-1")).await;
    let routed = h
        .controller
        .handle_message(json!({ "command": "setDefaultNamespace", "namespace": "team-a", "data": { "kind": "Namespace" } }))
        .await;
    assert!(matches!(routed, Routed::Ignored(_)));
    assert!(h.workbench.default_namespaces.lock().unwrap().is_empty());

    let mut h = showing(ResourceKind::Namespace, namespace("team-a")).await;
    assert_eq!(h.controller.handle_message(json!({ "command": "setDefaultNamespace" })).await, Routed::Handled);
    assert_eq!(*h.workbench.default_namespaces.lock().unwrap(), vec![("prod".to_string(), "team-a".to_string())]);
}

#[tokio::test]
async fn navigate_to_resource_shows_named_target_or_reveals_category() {
    let mut h = showing(ResourceKind::Namespace, namespace("team-a")).await;

    let routed = h
        .controller
        .handle_message(json!({ "command": "navigateToResource", "name": "api-0", "data": { "resourceType": "pods" } }))
        .await;
    assert_eq!(routed, Routed::Handled);
    let (kind, d) = h.controller.active().get_active().unwrap();
    assert_eq!(kind, ResourceKind::Pod);
    assert_eq!(d.namespace.as_deref(), Some("team-a"));
    assert_eq!(d.context_id, "prod");
    h.controller.settle().await;

    let mut h = showing(ResourceKind::Namespace, namespace("team-a")).await;
    let routed = h
        .controller
        .handle_message(json!({ "command": "navigateToResource", "data": { "resourceType": "deployments" } }))
        .await;
    assert_eq!(routed, Routed::Handled);
    assert_eq!(
        *h.workbench.categories.lock().unwrap(),
        vec![("prod".to_string(), "deployments".to_string(), Some("team-a".to_string()))]
    );
    assert_eq!(h.controller.active().active_kind(), Some(ResourceKind::Namespace));
}

#[tokio::test]
async fn category_links_only_from_node_or_generic() {
    let mut h = showing(ResourceKind::Node, ResourceDescriptor::new(ResourceKind::Node, "worker-1", "prod")).await;
    let routed = h
        .controller
        .handle_message(json!({ "command": "navigateToCategory", "namespace": "kube-system", "data": { "category": "pods" } }))
        .await;
    assert_eq!(routed, Routed::Handled);
    assert_eq!(h.workbench.categories.lock().unwrap().len(), 1);

    let mut h = showing(ResourceKind::Pod, pod("web-1")).await;
    let routed = h.controller.handle_message(json!({ "command": "navigateToCategory", "data": { "category": "pods" } })).await;
    assert!(matches!(routed, Routed::Ignored(_)));
    assert!(h.workbench.categories.lock().unwrap().is_empty());
}

#[tokio::test]
async fn navigation_outside_known_edges_is_ignored() {
    let mut h = showing(ResourceKind::Secret, ResourceDescriptor::namespaced(ResourceKind::Secret, "default", "tls", "prod")).await;
    let routed = h.controller.handle_message(json!({ "command": "navigateToPod", "name": "web-1" })).await;
    assert!(matches!(routed, Routed::Ignored(DetailsError::Protocol(_))));
    assert_eq!(h.controller.active().active_kind(), Some(ResourceKind::Secret));
    assert_eq!(h.controller.panels_created(), 1);
}

#[tokio::test]
async fn storage_edges_carry_explicit_namespace() {
    let mut h = showing(ResourceKind::StorageClass, ResourceDescriptor::new(ResourceKind::StorageClass, "fast-ssd", "prod")).await;
    let routed = h
        .controller
        .handle_message(json!({ "command": "navigateToPersistentVolumeClaim", "name": "data-pvc", "namespace": "db" }))
        .await;
    assert_eq!(routed, Routed::Handled);
    h.controller.settle().await;
    let (kind, d) = h.controller.active().get_active().unwrap();
    assert_eq!(kind, ResourceKind::PersistentVolumeClaim);
    assert_eq!(d.namespace.as_deref(), Some("db"));
    assert_eq!(h.host.last_post().unwrap().command, "updatePersistentVolumeClaimData");
}
