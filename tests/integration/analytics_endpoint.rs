//! `POST /api/analytics` over a real socket.

use async_trait::async_trait;
use folio::analytics::{AnalyticsRecord, Geolocator, Location, NoopGeolocator, VisitPolicy};
use folio::error::{ApiError, StorageError};
use folio::server::{router, AnalyticsResponse, AppState};
use folio::store::{AnalyticsStore, MemoryDocumentStore};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

#[derive(Default)]
struct RecordingGeolocator {
    lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl Geolocator for RecordingGeolocator {
    async fn locate(&self, ip: &str) -> Result<Location, ApiError> {
        self.lookups.lock().push(ip.to_string());
        Ok(Location {
            city: Some("Lisbon".to_string()),
            country: Some("Portugal".to_string()),
        })
    }
}

struct StalledGeolocator;

#[async_trait]
impl Geolocator for StalledGeolocator {
    async fn locate(&self, _ip: &str) -> Result<Location, ApiError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Location::default())
    }
}

struct UnavailableAnalytics;

#[async_trait]
impl AnalyticsStore for UnavailableAnalytics {
    async fn append_visit(&self, _record: &AnalyticsRecord) -> Result<String, StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    async fn recent_visits(&self, _limit: usize) -> Result<Vec<AnalyticsRecord>, StorageError> {
        Ok(Vec::new())
    }
}

fn state(
    analytics: Arc<dyn AnalyticsStore>,
    geolocator: Arc<dyn Geolocator>,
    timeout: Duration,
) -> AppState {
    AppState {
        images: Arc::new(MemoryDocumentStore::new()),
        analytics,
        geolocator,
        policy: VisitPolicy {
            geolocation_timeout: timeout,
        },
        default_page_size: 12,
    }
}

/// Serve on an ephemeral port; returns the base URL.
async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state, None)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_visit_recorded_with_location() {
    let store = Arc::new(MemoryDocumentStore::new());
    let geolocator = Arc::new(RecordingGeolocator::default());
    let base = spawn_server(state(store.clone(), geolocator.clone(), Duration::from_secs(2))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analytics", base))
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .json(&json!({"userAgent": FIREFOX, "referrer": "https://news.example", "path": "/gallery"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: AnalyticsResponse = response.json().await.unwrap();
    assert!(body.success);

    assert_eq!(*geolocator.lookups.lock(), vec!["203.0.113.9".to_string()]);
    let visits = store.recent_visits(10).await.unwrap();
    assert_eq!(visits.len(), 1);
    let visit = &visits[0];
    assert_eq!(visit.browser, "Firefox");
    assert_eq!(visit.os, "Linux");
    assert_eq!(visit.city.as_deref(), Some("Lisbon"));
    assert_eq!(visit.referrer, "https://news.example");
    assert_eq!(visit.path, "/gallery");
    assert_eq!(visit.ip.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_defaults_and_no_lookup_without_address() {
    let store = Arc::new(MemoryDocumentStore::new());
    let geolocator = Arc::new(RecordingGeolocator::default());
    let base = spawn_server(state(store.clone(), geolocator.clone(), Duration::from_secs(2))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analytics", base))
        .json(&json!({"userAgent": FIREFOX}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert!(geolocator.lookups.lock().is_empty());
    let visit = store.recent_visits(1).await.unwrap().remove(0);
    assert_eq!(visit.referrer, "Direct");
    assert_eq!(visit.path, "/");
    assert!(visit.city.is_none());
}

#[tokio::test]
async fn test_missing_user_agent_is_rejected() {
    let store = Arc::new(MemoryDocumentStore::new());
    let base = spawn_server(state(store.clone(), Arc::new(NoopGeolocator), Duration::from_secs(2))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analytics", base))
        .json(&json!({"path": "/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: AnalyticsResponse = response.json().await.unwrap();
    assert_eq!(body.error.as_deref(), Some("Missing userAgent"));
    assert!(store.recent_visits(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let store = Arc::new(MemoryDocumentStore::new());
    let base = spawn_server(state(store.clone(), Arc::new(NoopGeolocator), Duration::from_secs(2))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analytics", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: AnalyticsResponse = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.error.as_deref(), Some("Malformed payload"));
    assert!(body.details.is_some());
}

#[tokio::test]
async fn test_store_failure_reports_details() {
    let base = spawn_server(state(
        Arc::new(UnavailableAnalytics),
        Arc::new(NoopGeolocator),
        Duration::from_secs(2),
    ))
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/analytics", base))
        .json(&json!({"userAgent": FIREFOX}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: AnalyticsResponse = response.json().await.unwrap();
    assert_eq!(body.error.as_deref(), Some("Failed to save analytics"));
    assert!(body.details.unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn test_slow_geolocation_does_not_block_write() {
    let store = Arc::new(MemoryDocumentStore::new());
    let base = spawn_server(state(
        store.clone(),
        Arc::new(StalledGeolocator),
        Duration::from_millis(50),
    ))
    .await;

    let started = Instant::now();
    let response = reqwest::Client::new()
        .post(format!("{}/api/analytics", base))
        .header("x-real-ip", "198.51.100.20")
        .json(&json!({"userAgent": FIREFOX}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(10));

    let visit = store.recent_visits(1).await.unwrap().remove(0);
    assert!(visit.city.is_none());
    assert_eq!(visit.ip.as_deref(), Some("198.51.100.20"));
}

#[tokio::test]
async fn test_cors_preflight() {
    let base = spawn_server(state(
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(NoopGeolocator),
        Duration::from_secs(2),
    ))
    .await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/api/analytics", base))
        .header("origin", "https://portfolio.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("POST"));
}
