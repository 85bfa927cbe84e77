mod common;

use attack_runner::inventory::InventoryCache;
use attack_runner::transport::TransportClient;
use attack_runner::{AttackError, ResponseExtractor};
use common::*;
use core_logic::HttpMethod;
use std::sync::Arc;
use std::time::Duration;

fn inventory(backend: &Arc<ScriptedBackend>, ttl: Duration) -> InventoryCache {
    let config = runner_config();
    let transport = TransportClient::new(&config.http, backend.clone()).unwrap();
    InventoryCache::new(
        Arc::new(transport),
        Arc::new(ResponseExtractor::standard().unwrap()),
        ttl,
    )
}

const TTL: Duration = Duration::from_secs(120);

#[tokio::test]
async fn test_counts_are_extracted_and_cached() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    let inventory = inventory(&backend, TTL);

    let units = inventory.get_available(ORIGIN).await.unwrap();
    assert_eq!(units.get("axe"), Some(&100));
    assert_eq!(units.get("spy"), Some(&5));
    assert_eq!(units.get("light"), Some(&80));
    assert_eq!(units.get("ram"), Some(&0));

    inventory.get_available(ORIGIN).await.unwrap();
    assert_eq!(backend.requests().len(), 1);

    let entry = inventory.cached(ORIGIN).unwrap();
    assert_eq!(entry.location_id, ORIGIN);
    assert!(entry.expires_at > entry.fetched_at);
}

#[tokio::test]
async fn test_refresh_and_invalidate_refetch() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE_NO_TOKEN), ok(PLACE_PAGE)]);
    let inventory = inventory(&backend, TTL);

    let before = inventory.get_available(ORIGIN).await.unwrap();
    assert_eq!(before.get("axe"), Some(&0));

    let after = inventory.refresh(ORIGIN).await.unwrap();
    assert_eq!(after.get("axe"), Some(&100));
    assert_eq!(backend.requests().len(), 2);

    assert!(inventory.invalidate(ORIGIN));
    assert!(!inventory.invalidate(ORIGIN));
    inventory.get_available(ORIGIN).await.unwrap();
    assert_eq!(backend.requests().len(), 3);
}

#[tokio::test]
async fn test_entries_are_per_location() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, "village=101&", vec![ok(PLACE_PAGE)]);
    backend.on(HttpMethod::Get, "village=202&", vec![ok(PLACE_PAGE_NO_TOKEN)]);
    let inventory = inventory(&backend, TTL);

    assert_eq!(inventory.get_available(101).await.unwrap().get("axe"), Some(&100));
    assert_eq!(inventory.get_available(202).await.unwrap().get("axe"), Some(&0));

    inventory.invalidate(101);
    assert!(inventory.cached(101).is_none());
    assert!(inventory.cached(202).is_some());
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    let inventory = inventory(&backend, Duration::from_millis(50));

    inventory.get_available(ORIGIN).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(inventory.cached(ORIGIN).is_none());
    inventory.get_available(ORIGIN).await.unwrap();
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test]
async fn test_fetch_failure_is_a_network_error() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![status(404)]);
    let inventory = inventory(&backend, TTL);

    let err = inventory.get_available(ORIGIN).await.unwrap_err();
    assert!(matches!(err, AttackError::Network(_)));
    assert!(inventory.cached(ORIGIN).is_none());
}
