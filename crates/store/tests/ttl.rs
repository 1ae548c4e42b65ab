#![forbid(unsafe_code)]

use std::time::Duration;

use lookout_store::{DetailsCache, TtlCache};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn set_then_get_round_trips_until_ttl_elapses() {
    let cache = TtlCache::with_capacity(8);
    let key = "service-describe:prod:default:checkout";
    cache.set(key, json!({"object": {"metadata": {"name": "checkout"}}}), Duration::from_secs(60)).await;

    let hit = cache.get(key).await.expect("fresh entry");
    assert_eq!(hit["object"]["metadata"]["name"], "checkout");

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(cache.get(key).await.is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(cache.get(key).await.is_none(), "entry must miss after its ttl");
    assert!(cache.is_empty(), "expired entry is dropped on read");
}

#[tokio::test]
async fn invalidate_removes_only_that_key() {
    let cache = TtlCache::with_capacity(8);
    cache.set("a", json!(1), Duration::from_secs(60)).await;
    cache.set("b", json!(2), Duration::from_secs(60)).await;
    cache.invalidate("a").await;
    cache.invalidate("missing").await;
    assert!(cache.get("a").await.is_none());
    assert_eq!(cache.get("b").await, Some(json!(2)));
}

#[tokio::test]
async fn capacity_evicts_oldest_insert_first() {
    let cache = TtlCache::with_capacity(2);
    cache.set("a", json!("a"), Duration::from_secs(60)).await;
    cache.set("b", json!("b"), Duration::from_secs(60)).await;
    // overwrite keeps insertion slot
    cache.set("a", json!("a2"), Duration::from_secs(60)).await;
    cache.set("c", json!("c"), Duration::from_secs(60)).await;
    assert_eq!(cache.len(), 2);
    assert!(cache.get("a").await.is_none());
    assert_eq!(cache.get("b").await, Some(json!("b")));
    assert_eq!(cache.get("c").await, Some(json!("c")));
}

#[tokio::test(start_paused = true)]
async fn full_cache_sweeps_expired_before_evicting_live() {
    let cache = TtlCache::with_capacity(2);
    cache.set("live", json!(1), Duration::from_secs(100)).await;
    cache.set("short", json!(2), Duration::from_secs(1)).await;
    tokio::time::advance(Duration::from_secs(5)).await;
    cache.set("new", json!(3), Duration::from_secs(100)).await;
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("live").await, Some(json!(1)));
    assert_eq!(cache.get("new").await, Some(json!(3)));
}

#[tokio::test]
async fn oversized_ttl_is_capped_instead_of_overflowing() {
    let cache = TtlCache::with_capacity(4);
    cache.set("forever", json!("x"), Duration::MAX).await;
    assert_eq!(cache.get("forever").await, Some(json!("x")));
}
