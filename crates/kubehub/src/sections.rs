//! Shaping of list results into the compact JSON the panel templates read.
//!
//! Everything here is pure so it can be tested without a cluster.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;
use lookout_core::ResourceKind;
use serde_json::{json, Value};

pub fn strip_managed_fields(v: &mut Value) {
    if let Some(meta) = v.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("managedFields");
    }
}

fn s<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(|x| x.as_str())
}

fn name_of(v: &Value) -> &str {
    s(v, "/metadata/name").unwrap_or("")
}

pub fn uid_of(v: &Value) -> Option<&str> {
    s(v, "/metadata/uid").filter(|u| !u.is_empty())
}

/// Prefer the object's UID; fall back to kind + name.
pub fn event_field_selector(kind: &str, name: &str, uid: Option<&str>) -> String {
    match uid {
        Some(uid) => format!("involvedObject.uid={}", uid),
        None => format!("involvedObject.kind={},involvedObject.name={}", kind, name),
    }
}

fn event_time(e: &Event) -> Option<DateTime<Utc>> {
    e.last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| e.event_time.as_ref().map(|t| t.0))
        .or_else(|| e.first_timestamp.as_ref().map(|t| t.0))
}

/// Newest first.
pub fn shape_events(mut events: Vec<Event>) -> Value {
    events.sort_by_key(|e| std::cmp::Reverse(event_time(e)));
    let rows: Vec<Value> = events
        .iter()
        .map(|e| {
            json!({
                "type": e.type_.clone().unwrap_or_default(),
                "reason": e.reason.clone().unwrap_or_default(),
                "message": e.message.clone().unwrap_or_default(),
                "count": e.count.unwrap_or(1),
                "lastTimestamp": event_time(e).map(|t| t.to_rfc3339()),
                "source": e.source.as_ref().and_then(|s| s.component.clone()).unwrap_or_default(),
            })
        })
        .collect();
    Value::Array(rows)
}

pub fn shape_quotas(items: &[Value]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|q| json!({
                "name": name_of(q),
                "hard": q.pointer("/status/hard").or_else(|| q.pointer("/spec/hard")).cloned().unwrap_or(Value::Null),
                "used": q.pointer("/status/used").cloned().unwrap_or(Value::Null),
            }))
            .collect(),
    )
}

pub fn shape_limit_ranges(items: &[Value]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|l| json!({
                "name": name_of(l),
                "limits": l.pointer("/spec/limits").cloned().unwrap_or(Value::Array(Vec::new())),
            }))
            .collect(),
    )
}

fn pod_summary(p: &Value) -> Value {
    json!({
        "namespace": s(p, "/metadata/namespace").unwrap_or(""),
        "name": name_of(p),
        "phase": s(p, "/status/phase").unwrap_or(""),
        "node": s(p, "/spec/nodeName").unwrap_or(""),
    })
}

pub fn pod_summaries(pods: &[Value]) -> Value {
    Value::Array(pods.iter().map(pod_summary).collect())
}

fn volumes(p: &Value) -> impl Iterator<Item = &Value> {
    p.pointer("/spec/volumes").and_then(|v| v.as_array()).into_iter().flatten()
}

fn containers(p: &Value) -> impl Iterator<Item = &Value> {
    ["/spec/initContainers", "/spec/containers"]
        .into_iter()
        .filter_map(move |ptr| p.pointer(ptr).and_then(|v| v.as_array()))
        .flatten()
}

pub fn pods_mounting_claim(pods: &[Value], claim: &str) -> Value {
    let rows = pods
        .iter()
        .filter(|p| volumes(p).any(|v| s(v, "/persistentVolumeClaim/claimName") == Some(claim)))
        .map(pod_summary)
        .collect();
    Value::Array(rows)
}

/// Other claims in the namespace that share the object's storage class.
pub fn related_claims(claims: &[Value], object: &Value) -> Value {
    let own = name_of(object);
    let class = s(object, "/spec/storageClassName");
    let rows = claims
        .iter()
        .filter(|c| name_of(c) != own && class.is_some() && s(c, "/spec/storageClassName") == class)
        .map(claim_summary)
        .collect();
    Value::Array(rows)
}

fn claim_summary(c: &Value) -> Value {
    json!({
        "namespace": s(c, "/metadata/namespace").unwrap_or(""),
        "name": name_of(c),
        "phase": s(c, "/status/phase").unwrap_or(""),
        "storageClass": s(c, "/spec/storageClassName").unwrap_or(""),
        "volume": s(c, "/spec/volumeName").unwrap_or(""),
        "capacity": s(c, "/status/capacity/storage").unwrap_or(""),
    })
}

pub fn claims_for_storage_class(claims: &[Value], class: &str) -> Value {
    Value::Array(
        claims
            .iter()
            .filter(|c| s(c, "/spec/storageClassName") == Some(class))
            .map(claim_summary)
            .collect(),
    )
}

fn pod_references(p: &Value, kind: ResourceKind, name: &str) -> bool {
    let (vol_ptr, projected_key, env_from_key, key_ref_key) = match kind {
        ResourceKind::ConfigMap => ("/configMap/name", "configMap", "configMapRef", "configMapKeyRef"),
        ResourceKind::Secret => ("/secret/secretName", "secret", "secretRef", "secretKeyRef"),
        _ => return false,
    };
    let in_volumes = volumes(p).any(|v| {
        s(v, vol_ptr) == Some(name)
            || v.pointer("/projected/sources")
                .and_then(|x| x.as_array())
                .map_or(false, |srcs| srcs.iter().any(|src| src.get(projected_key).and_then(|x| x.get("name")).and_then(|x| x.as_str()) == Some(name)))
    });
    let in_containers = containers(p).any(|c| {
        let env_from = c.get("envFrom").and_then(|x| x.as_array()).map_or(false, |ef| {
            ef.iter().any(|e| e.get(env_from_key).and_then(|x| x.get("name")).and_then(|x| x.as_str()) == Some(name))
        });
        let env = c.get("env").and_then(|x| x.as_array()).map_or(false, |env| {
            env.iter().any(|e| e.pointer(&format!("/valueFrom/{}/name", key_ref_key)).and_then(|x| x.as_str()) == Some(name))
        });
        env_from || env
    });
    in_volumes || in_containers
}

/// Pods that mount or read a ConfigMap or Secret.
pub fn pods_referencing(pods: &[Value], kind: ResourceKind, name: &str) -> Value {
    Value::Array(pods.iter().filter(|p| pod_references(p, kind, name)).map(pod_summary).collect())
}

pub fn shape_endpoints(ep: &Value) -> Value {
    let mut out = Vec::new();
    for subset in ep.get("subsets").and_then(|x| x.as_array()).into_iter().flatten() {
        let ports: Vec<i64> = subset
            .get("ports")
            .and_then(|x| x.as_array())
            .into_iter()
            .flatten()
            .filter_map(|p| p.get("port").and_then(|x| x.as_i64()))
            .collect();
        for (list, ready) in [("addresses", true), ("notReadyAddresses", false)] {
            for addr in subset.get(list).and_then(|x| x.as_array()).into_iter().flatten() {
                let ip = addr.get("ip").and_then(|x| x.as_str()).unwrap_or("");
                let target = s(addr, "/targetRef/name").unwrap_or("");
                if ports.is_empty() {
                    out.push(json!({ "address": ip, "target": target, "ready": ready }));
                }
                for port in &ports {
                    out.push(json!({ "address": format!("{}:{}", ip, port), "target": target, "ready": ready }));
                }
            }
        }
    }
    Value::Array(out)
}

fn owned_by<'a>(items: &'a [Value], owner: &'a Value) -> impl Iterator<Item = &'a Value> {
    let uid = uid_of(owner);
    items.iter().filter(move |i| {
        uid.is_some()
            && i.pointer("/metadata/ownerReferences")
                .and_then(|x| x.as_array())
                .map_or(false, |ors| ors.iter().any(|o| o.get("uid").and_then(|x| x.as_str()) == uid))
    })
}

pub fn owned_replica_sets(items: &[Value], deployment: &Value) -> Value {
    let mut rows: Vec<Value> = owned_by(items, deployment)
        .map(|rs| json!({
            "name": name_of(rs),
            "revision": s(rs, "/metadata/annotations/deployment.kubernetes.io~1revision").unwrap_or(""),
            "replicas": rs.pointer("/spec/replicas").and_then(|x| x.as_i64()).unwrap_or(0),
            "ready": rs.pointer("/status/readyReplicas").and_then(|x| x.as_i64()).unwrap_or(0),
            "created": s(rs, "/metadata/creationTimestamp").unwrap_or(""),
        }))
        .collect();
    rows.sort_by(|a, b| b["created"].as_str().cmp(&a["created"].as_str()));
    Value::Array(rows)
}

/// Jobs spawned by a CronJob, newest first.
pub fn owned_jobs(items: &[Value], cron_job: &Value) -> Value {
    let mut rows: Vec<Value> = owned_by(items, cron_job)
        .map(|j| json!({
            "name": name_of(j),
            "startTime": s(j, "/status/startTime"),
            "completionTime": s(j, "/status/completionTime"),
            "succeeded": j.pointer("/status/succeeded").and_then(|x| x.as_i64()).unwrap_or(0),
            "failed": j.pointer("/status/failed").and_then(|x| x.as_i64()).unwrap_or(0),
            "active": j.pointer("/status/active").and_then(|x| x.as_i64()).unwrap_or(0),
        }))
        .collect();
    rows.sort_by(|a, b| b["startTime"].as_str().cmp(&a["startTime"].as_str()));
    Value::Array(rows)
}
