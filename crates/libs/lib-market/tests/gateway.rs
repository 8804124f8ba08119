//! Gateway and collection service against a local fake marketplace.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use lib_core::dto::TimeFrame;
use lib_core::AppError;
use lib_market::{CacheSettings, CollectionCacheService, MarketUpstream, UpstreamGateway};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct Hits {
    v2: Arc<AtomicUsize>,
    v3: Arc<AtomicUsize>,
}

async fn v2_popular(State(hits): State<Hits>) -> impl IntoResponse {
    hits.v2.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        { "symbol": "mad_lads", "name": "Mad Lads", "floorPrice": 179_990_000_000u64 },
        { "symbol": "unknown", "name": "?" },
        { "symbol": "tensorians", "name": "TENSORIANS", "floorPrice": 59_000_000_000u64 }
    ]))
}

async fn v2_missing(State(hits): State<Hits>) -> impl IntoResponse {
    hits.v2.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "no such endpoint")
}

async fn v2_broken(State(hits): State<Hits>) -> impl IntoResponse {
    hits.v2.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn v3_moved(State(hits): State<Hits>) -> impl IntoResponse {
    hits.v3.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "symbol": "moved", "floorPrice": 1 }))
}

async fn v3_missing(State(hits): State<Hits>) -> impl IntoResponse {
    hits.v3.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "still missing")
}

/// Serve a fake marketplace on an ephemeral port; returns (v2 base, v3 base, hit counters).
async fn spawn_fake_marketplace() -> (String, String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/v2/marketplace/popular_collections", get(v2_popular))
        .route("/v2/collections/moved", get(v2_missing))
        .route("/v2/collections/gone", get(v2_missing))
        .route("/v2/collections/broken", get(v2_broken))
        .route("/v3/collections/moved", get(v3_moved))
        .route("/v3/collections/gone", get(v3_missing))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v2", addr), format!("http://{}/v3", addr), hits)
}

fn gateway(v2: &str, v3: &str) -> UpstreamGateway {
    UpstreamGateway::with_bases(v2, v3, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn primary_success_does_not_touch_secondary() {
    let (v2, v3, hits) = spawn_fake_marketplace().await;
    let gateway = gateway(&v2, &v3);

    let value = gateway
        .get("/marketplace/popular_collections?timeRange=1h")
        .await
        .unwrap();

    assert_eq!(value.as_array().unwrap().len(), 3);
    assert_eq!(hits.v2.load(Ordering::SeqCst), 1);
    assert_eq!(hits.v3.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn primary_not_found_falls_back_once() {
    let (v2, v3, hits) = spawn_fake_marketplace().await;
    let gateway = gateway(&v2, &v3);

    let value = gateway.get("/collections/moved").await.unwrap();

    assert_eq!(value["symbol"], "moved");
    assert_eq!(hits.v2.load(Ordering::SeqCst), 1);
    assert_eq!(hits.v3.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn both_not_found_reports_secondary_status() {
    let (v2, v3, hits) = spawn_fake_marketplace().await;
    let gateway = gateway(&v2, &v3);

    let err = gateway.get("/collections/gone").await.unwrap_err();

    assert_eq!(err.upstream_status(), Some(404));
    match err {
        AppError::Upstream { message, details, .. } => {
            assert_eq!(message, "Magic Eden API error: 404 Not Found");
            assert_eq!(details, "still missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(hits.v3.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn primary_server_error_is_not_retried_on_secondary() {
    let (v2, v3, hits) = spawn_fake_marketplace().await;
    let gateway = gateway(&v2, &v3);

    let err = gateway.get("/collections/broken").await.unwrap_err();

    assert_eq!(err.upstream_status(), Some(500));
    assert_eq!(err.to_error_response().details.as_deref(), Some("upstream exploded"));
    assert_eq!(hits.v3.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    let gateway = gateway("http://127.0.0.1:1/v2", "http://127.0.0.1:1/v3");

    let err = gateway.get("/collections/x").await.unwrap_err();
    assert!(matches!(err, AppError::Network(_) | AppError::Timeout(_)));
}

#[tokio::test]
async fn popular_collections_are_ranked_in_sol_and_cached() {
    let (v2, v3, hits) = spawn_fake_marketplace().await;
    let service = CollectionCacheService::new(
        Arc::new(gateway(&v2, &v3)),
        CacheSettings {
            min_request_interval: Duration::from_millis(1),
            ..CacheSettings::default()
        },
    );

    let first = service.get_popular_collections(TimeFrame::OneDay).await;
    let second = service.get_popular_collections(TimeFrame::OneDay).await;

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].floor_price, Some(179.99));
    assert_eq!(first[1].symbol, "tensorians");
    assert_eq!(first[1].rank, Some(2));
    assert_eq!(first, second);
    assert_eq!(hits.v2.load(Ordering::SeqCst), 1);
}
