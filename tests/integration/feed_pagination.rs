//! Unfiltered feed paging through the controller, against both stores.

use super::test_utils::{ids, images, memory_store, sled_store};
use folio::feed::{FeedController, LoadOutcome, SkipReason};
use std::sync::Arc;

#[tokio::test]
async fn test_thirty_records_in_pages_of_twelve() {
    let store = Arc::new(memory_store(images(30, |_| vec![])));
    let controller = FeedController::with_page_size(store.clone(), 12);

    controller.mount().await;
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot.images), (19..=30).rev().collect::<Vec<_>>());
    assert!(snapshot.has_more);

    controller.load(false).await;
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot.images), (7..=30).rev().collect::<Vec<_>>());
    assert!(snapshot.has_more);

    assert_eq!(
        controller.load(false).await,
        LoadOutcome::Applied {
            received: 6,
            has_more: false
        }
    );
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot.images), (1..=30).rev().collect::<Vec<_>>());
    assert!(!snapshot.has_more);

    // Exhausted: no further fetch is issued.
    let started = store.queries_started();
    assert_eq!(
        controller.request_next_page().await,
        LoadOutcome::Skipped(SkipReason::Exhausted)
    );
    assert_eq!(store.queries_started(), started);
}

#[tokio::test]
async fn test_reset_replaces_accumulated_list() {
    let store = Arc::new(memory_store(images(40, |_| vec![])));
    let controller = FeedController::with_page_size(store, 5);

    controller.mount().await;
    for _ in 0..4 {
        controller.request_next_page().await;
    }
    assert_eq!(controller.snapshot().images.len(), 25);

    controller.load(true).await;
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot.images), vec![40, 39, 38, 37, 36]);
    assert!(snapshot.has_more);
}

#[tokio::test]
async fn test_sled_store_pages_without_gaps_or_repeats() {
    let (_dir, store) = sled_store(images(53, |_| vec![]));
    let controller = FeedController::with_page_size(Arc::new(store), 7);

    controller.mount().await;
    let mut fetches = 1;
    while controller.snapshot().has_more {
        assert!(matches!(
            controller.request_next_page().await,
            LoadOutcome::Applied { .. }
        ));
        fetches += 1;
    }
    assert_eq!(fetches, 8);
    assert_eq!(
        ids(&controller.snapshot().images),
        (1..=53).rev().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_exact_multiple_ends_on_full_page() {
    let store = Arc::new(memory_store(images(24, |_| vec![])));
    let controller = FeedController::with_page_size(store.clone(), 12);

    controller.mount().await;
    assert_eq!(
        controller.request_next_page().await,
        LoadOutcome::Applied {
            received: 12,
            has_more: false
        }
    );
    assert_eq!(store.queries_started(), 2);
    assert_eq!(controller.snapshot().images.len(), 24);
}

#[tokio::test]
async fn test_empty_store() {
    let store = Arc::new(memory_store(vec![]));
    let controller = FeedController::new(store);
    assert_eq!(
        controller.mount().await,
        LoadOutcome::Applied {
            received: 0,
            has_more: false
        }
    );
    let snapshot = controller.snapshot();
    assert!(snapshot.images.is_empty());
    assert!(!snapshot.is_initial_load);
}
