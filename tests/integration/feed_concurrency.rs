//! In-flight fetches, filter changes during a fetch, and failure handling.

use super::test_utils::{ids, images, memory_store};
use folio::feed::{FeedController, LoadOutcome, SkipReason};
use folio::store::MemoryDocumentStore;
use folio::types::{Tag, TagSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

async fn wait_for_queries(store: &MemoryDocumentStore, count: usize) {
    while store.queries_started() < count {
        tokio::task::yield_now().await;
    }
}

fn alternating(id: u64) -> Vec<Tag> {
    if id % 2 == 0 {
        vec![Tag::Portrait]
    } else {
        vec![Tag::Street]
    }
}

#[tokio::test]
async fn test_at_most_one_fetch_in_flight() {
    let store = Arc::new(memory_store(images(30, |_| vec![])));
    let gate = store.hold_queries();
    let controller = Arc::new(FeedController::with_page_size(store.clone(), 10));

    let mount = tokio::spawn({
        let controller = controller.clone();
        async move { controller.mount().await }
    });
    wait_for_queries(&store, 1).await;
    assert!(controller.snapshot().is_fetching);

    for _ in 0..5 {
        assert_eq!(
            controller.request_next_page().await,
            LoadOutcome::Skipped(SkipReason::InFlight)
        );
    }
    assert_eq!(controller.load(true).await, LoadOutcome::Skipped(SkipReason::InFlight));
    assert_eq!(store.queries_started(), 1);

    gate.release_one();
    assert!(matches!(mount.await.unwrap(), LoadOutcome::Applied { received: 10, .. }));
    let snapshot = controller.snapshot();
    assert!(!snapshot.is_fetching);
    assert_eq!(ids(&snapshot.images), (21..=30).rev().collect::<Vec<_>>());
    gate.open();
}

#[tokio::test]
async fn test_filter_change_discards_stale_settle() {
    let store = Arc::new(memory_store(images(20, alternating)));
    let gate = store.hold_queries();
    let controller = Arc::new(FeedController::with_page_size(store.clone(), 5));

    let stale = tokio::spawn({
        let controller = controller.clone();
        async move { controller.mount().await }
    });
    wait_for_queries(&store, 1).await;

    let fresh = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .set_selected_tags([Tag::Portrait].into_iter().collect())
                .await
        }
    });
    wait_for_queries(&store, 2).await;

    // Cleared synchronously; the new session's first page is pending.
    let snapshot = controller.snapshot();
    assert!(snapshot.images.is_empty());
    assert!(snapshot.is_initial_load);
    assert!(snapshot.is_fetching);

    gate.open();
    assert_eq!(stale.await.unwrap(), LoadOutcome::Discarded);
    assert!(matches!(fresh.await.unwrap(), LoadOutcome::Applied { .. }));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.images.len(), 5);
    assert!(snapshot
        .images
        .iter()
        .all(|image| image.tags.contains(&Tag::Portrait)));
    assert_eq!(
        snapshot.selected_tags,
        [Tag::Portrait].into_iter().collect::<TagSet>()
    );
}

#[tokio::test]
async fn test_cancelled_load_returns_to_idle() {
    let store = Arc::new(memory_store(images(30, |_| vec![])));
    let controller = FeedController::with_page_size(store.clone(), 10);
    controller.mount().await;
    let first_page = controller.snapshot().images;

    let gate = store.hold_queries();
    let cancelled = timeout(Duration::from_millis(50), controller.request_next_page()).await;
    assert!(cancelled.is_err());

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_fetching);
    assert!(snapshot.has_more);
    assert_eq!(snapshot.images, first_page);

    gate.open();
    assert_eq!(
        controller.request_next_page().await,
        LoadOutcome::Applied {
            received: 10,
            has_more: true
        }
    );
    assert_eq!(
        ids(&controller.snapshot().images),
        (11..=30).rev().collect::<Vec<_>>()
    );
    assert!(matches!(controller.load(true).await, LoadOutcome::Applied { received: 10, .. }));
}

#[tokio::test]
async fn test_subscribers_observe_fetch_transitions() {
    let store = Arc::new(memory_store(images(3, |_| vec![])));
    let gate = store.hold_queries();
    let controller = Arc::new(FeedController::new(store.clone()));
    let mut updates = controller.subscribe();

    let mount = tokio::spawn({
        let controller = controller.clone();
        async move { controller.mount().await }
    });
    updates.changed().await.unwrap();
    assert!(updates.borrow_and_update().is_fetching);

    gate.open();
    mount.await.unwrap();
    updates.changed().await.unwrap();
    let settled = updates.borrow_and_update().clone();
    assert!(!settled.is_fetching);
    assert_eq!(ids(&settled.images), vec![3, 2, 1]);
}

#[tokio::test]
async fn test_failed_reset_keeps_list_and_stops_auto_load() {
    let store = Arc::new(memory_store(images(30, |_| vec![])));
    let controller = FeedController::with_page_size(store.clone(), 10);
    controller.mount().await;
    let before = controller.snapshot().images;

    store.fail_next_queries(1);
    assert!(matches!(controller.load(true).await, LoadOutcome::Failed { .. }));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.images, before);
    assert!(!snapshot.has_more);
    assert!(!snapshot.is_fetching);

    let started = store.queries_started();
    assert_eq!(
        controller.request_next_page().await,
        LoadOutcome::Skipped(SkipReason::Exhausted)
    );
    assert_eq!(store.queries_started(), started);

    // An explicit reset recovers.
    assert!(matches!(controller.load(true).await, LoadOutcome::Applied { has_more: true, .. }));
}

#[tokio::test]
async fn test_failed_filter_change_leaves_empty_feed() {
    let store = Arc::new(memory_store(images(10, alternating)));
    let controller = FeedController::with_page_size(store.clone(), 4);
    controller.mount().await;

    store.fail_next_queries(1);
    let outcome = controller.toggle_tag(Tag::Street).await;
    assert!(matches!(outcome, LoadOutcome::Failed { .. }));
    let snapshot = controller.snapshot();
    assert!(snapshot.images.is_empty());
    assert!(!snapshot.has_more);
    assert!(!snapshot.is_initial_load);

    // Retoggling the same selection is a no-op; clearing starts over.
    assert_eq!(
        controller
            .set_selected_tags([Tag::Street].into_iter().collect())
            .await,
        LoadOutcome::Skipped(SkipReason::Unchanged)
    );
    assert!(matches!(controller.clear_tags().await, LoadOutcome::Applied { .. }));
    assert_eq!(ids(&controller.snapshot().images), vec![10, 9, 8, 7]);
}
