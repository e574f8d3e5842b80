//! Resolver cache behavior against the fake Graph backend: the ten-minute
//! freshness window, per-scope cache keys, and diagnosable misses.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};

use rustysheets::graph::error::GraphError;
use rustysheets::resolver::NameResolver;

use crate::support::{FakeGraph, ManualClock};

#[actix_web::test]
async fn test_entry_fresh_just_under_ttl() {
    let graph = Arc::new(FakeGraph::seeded());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let resolver = NameResolver::with_clock(graph.clone(), clock.clone());

    let id = resolver.resolve_drive_id("site-1", "Documents").await.unwrap();
    assert_eq!(id, "drive-1");
    assert_eq!(graph.drive_listings.load(Ordering::SeqCst), 1);

    // 9m59s after the entry was written: still served from cache.
    clock.advance(Duration::seconds(599));
    resolver.resolve_drive_id("site-1", "Documents").await.unwrap();
    assert_eq!(graph.drive_listings.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_entry_stale_just_past_ttl() {
    let graph = Arc::new(FakeGraph::seeded());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let resolver = NameResolver::with_clock(graph.clone(), clock.clone());

    resolver.resolve_drive_id("site-1", "Documents").await.unwrap();

    // 10m01s later the entry is stale and a fresh listing is fetched.
    clock.advance(Duration::seconds(601));
    resolver.resolve_drive_id("site-1", "Documents").await.unwrap();
    assert_eq!(graph.drive_listings.load(Ordering::SeqCst), 2);

    // The refresh overwrote the entry, so the window restarts.
    clock.advance(Duration::seconds(599));
    resolver.resolve_drive_id("site-1", "Documents").await.unwrap();
    assert_eq!(graph.drive_listings.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn test_full_chain_resolution_and_caching() {
    let graph = Arc::new(FakeGraph::seeded());
    let resolver = NameResolver::new(graph.clone());

    let drive_id = resolver.resolve_drive_id("site-1", "documents").await.unwrap();
    let item_id = resolver.resolve_item_id(&drive_id, "BUDGET.xlsx").await.unwrap();
    let ws_id = resolver
        .resolve_worksheet_id(&drive_id, &item_id, "sheet1")
        .await
        .unwrap();

    assert_eq!((drive_id.as_str(), item_id.as_str(), ws_id.as_str()),
        ("drive-1", "item-1", "ws-1"));

    // A second pass with canonical casing hits every cache.
    resolver.resolve_drive_id("site-1", "Documents").await.unwrap();
    resolver.resolve_item_id("drive-1", "Budget.xlsx").await.unwrap();
    resolver
        .resolve_worksheet_id("drive-1", "item-1", "Sheet1")
        .await
        .unwrap();

    assert_eq!(graph.drive_listings.load(Ordering::SeqCst), 1);
    assert_eq!(graph.item_listings.load(Ordering::SeqCst), 1);
    assert_eq!(graph.worksheet_listings.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_worksheet_miss_lists_candidates() {
    let graph = Arc::new(FakeGraph::seeded());
    let resolver = NameResolver::new(graph);

    let err = resolver
        .resolve_worksheet_id("drive-1", "item-1", "Sheet99")
        .await
        .unwrap_err();

    match err {
        GraphError::WorksheetNotFound { name, available } => {
            assert_eq!(name, "Sheet99");
            assert_eq!(available, vec!["Sheet1"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
