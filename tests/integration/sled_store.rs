//! Sled document store: persistence across reopen, id uniqueness, visit order.

use super::test_utils::{image, images};
use chrono::{Duration, TimeZone, Utc};
use folio::analytics::AnalyticsRecord;
use folio::error::StorageError;
use folio::feed::{fetch_page, FeedRequest};
use folio::store::{AnalyticsStore, ImageWriter, MemoryDocumentStore, SledDocumentStore};
use folio::types::{ImageDocument, Tag};
use tempfile::TempDir;

fn visit(minutes: i64, path: &str) -> AnalyticsRecord {
    AnalyticsRecord {
        id: None,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes),
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_string(),
        browser: "Firefox".to_string(),
        os: "Linux".to_string(),
        city: None,
        country: None,
        referrer: "Direct".to_string(),
        path: path.to_string(),
        ip: None,
    }
}

#[tokio::test]
async fn test_images_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    {
        let store = SledDocumentStore::new(&path).unwrap();
        for img in images(5, |id| if id == 3 { vec![Tag::Film] } else { vec![] }) {
            store.append_image(&img).await.unwrap();
        }
        store.flush().unwrap();
    }

    let store = SledDocumentStore::new(&path).unwrap();
    assert_eq!(store.image_count(), 5);
    let page = fetch_page(&store, &FeedRequest::default()).await.unwrap();
    assert_eq!(
        page.images.iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![5, 4, 3, 2, 1]
    );
    assert_eq!(page.images[2].tags, vec![Tag::Film]);
}

#[tokio::test]
async fn test_duplicate_id_rejected() {
    let dir = TempDir::new().unwrap();
    let store = SledDocumentStore::new(dir.path()).unwrap();
    store.append_image(&image(7, vec![])).await.unwrap();

    let mut retitled = ImageDocument::from(&image(7, vec![Tag::Night]));
    retitled.title = "Another frame".to_string();
    let err = store.put_document(&retitled).unwrap_err();
    assert!(matches!(err, StorageError::DuplicateId(7)));
    assert_eq!(store.image_count(), 1);
}

#[tokio::test]
async fn test_recent_visits_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = SledDocumentStore::new(dir.path()).unwrap();

    let mut keys = Vec::new();
    for (minutes, path) in [(5, "/b"), (0, "/a"), (10, "/c"), (10, "/d")] {
        keys.push(store.append_visit(&visit(minutes, path)).await.unwrap());
    }
    assert_eq!(store.visit_count(), 4);

    let recent = store.recent_visits(3).await.unwrap();
    let paths: Vec<&str> = recent.iter().map(|v| v.path.as_str()).collect();
    // Same timestamp: later insert first.
    assert_eq!(paths, vec!["/d", "/c", "/b"]);
    assert_eq!(recent[0].id.as_deref(), Some(keys[3].as_str()));

    let all = store.recent_visits(100).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[3].path, "/a");
}

#[tokio::test]
async fn test_memory_and_sled_agree_on_visit_order() {
    let dir = TempDir::new().unwrap();
    let sled = SledDocumentStore::new(dir.path()).unwrap();
    let memory = MemoryDocumentStore::new();

    let sequence = [(0, "/a"), (0, "/b"), (3, "/c"), (3, "/d"), (3, "/e"), (1, "/f")];
    for (minutes, path) in sequence {
        sled.append_visit(&visit(minutes, path)).await.unwrap();
        memory.append_visit(&visit(minutes, path)).await.unwrap();
    }

    let paths = |visits: Vec<AnalyticsRecord>| -> Vec<String> {
        visits.into_iter().map(|v| v.path).collect()
    };
    let expected = vec!["/e", "/d", "/c", "/f", "/b", "/a"];
    assert_eq!(paths(sled.recent_visits(10).await.unwrap()), expected);
    assert_eq!(paths(memory.recent_visits(10).await.unwrap()), expected);
}
