//! Tag-filtered feed: any-of matching, intra-page order, legacy records.

use super::test_utils::{ids, image, images, memory_store, sled_store};
use folio::feed::{fetch_page, FeedController, FeedRequest, GalleryView};
use folio::store::{MemoryDocumentStore, SledDocumentStore};
use folio::types::{ImageDocument, Tag, TagSet};
use std::collections::HashSet;
use std::sync::Arc;

fn portrait_for_three_to_five(id: u64) -> Vec<Tag> {
    if (3..=5).contains(&id) {
        vec![Tag::Portrait]
    } else {
        vec![Tag::Landscape]
    }
}

#[tokio::test]
async fn test_portrait_filter_returns_exact_matches_descending() {
    let (_dir, store) = sled_store(images(20, portrait_for_three_to_five));
    let controller = FeedController::new(Arc::new(store));

    controller.toggle_tag(Tag::Portrait).await;
    let snapshot = controller.snapshot();
    assert_eq!(ids(&snapshot.images), vec![5, 4, 3]);
    assert!(!snapshot.has_more);
}

#[tokio::test]
async fn test_any_of_semantics() {
    let store = memory_store(vec![
        image(1, vec![Tag::Night]),
        image(2, vec![Tag::Film, Tag::Street]),
        image(3, vec![Tag::Portrait]),
        image(4, vec![]),
    ]);
    let tags: TagSet = [Tag::Night, Tag::Street].into_iter().collect();
    let page = fetch_page(&store, &FeedRequest::default().with_tags(tags))
        .await
        .unwrap();
    assert_eq!(ids(&page.images), vec![2, 1]);
}

#[tokio::test]
async fn test_filtered_paging_covers_every_match_once() {
    let (_dir, store) = sled_store(images(60, |id| {
        if id % 3 == 0 {
            vec![Tag::Travel]
        } else {
            vec![Tag::Nature]
        }
    }));
    let controller = FeedController::with_page_size(Arc::new(store), 4);
    controller
        .set_selected_tags([Tag::Travel].into_iter().collect())
        .await;
    while controller.snapshot().has_more {
        controller.request_next_page().await;
    }

    let snapshot = controller.snapshot();
    let seen: HashSet<u64> = ids(&snapshot.images).into_iter().collect();
    assert_eq!(seen.len(), snapshot.images.len());
    assert_eq!(seen, (1..=60).filter(|id| id % 3 == 0).collect());
    // Each page of four is sorted on its own.
    for page in snapshot.images.chunks(4) {
        assert!(page.windows(2).all(|w| w[0].id > w[1].id));
    }
}

#[tokio::test]
async fn test_legacy_record_without_tags() {
    let legacy = ImageDocument {
        id: 9,
        title: "Before tags".to_string(),
        url: "https://cdn.example/images/9.jpg".to_string(),
        tags: None,
    };

    let memory = MemoryDocumentStore::new();
    memory.insert_document(legacy.clone()).unwrap();
    memory
        .insert_document(ImageDocument::from(&image(8, vec![])))
        .unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let sled = SledDocumentStore::new(dir.path()).unwrap();
    sled.put_document(&legacy).unwrap();
    sled.put_document(&ImageDocument::from(&image(8, vec![])))
        .unwrap();

    let stores: Vec<Arc<dyn folio::store::ImageStore>> = vec![Arc::new(memory), Arc::new(sled)];
    for store in stores {
        let controller = FeedController::new(store);
        controller.mount().await;
        let snapshot = controller.snapshot();
        assert_eq!(ids(&snapshot.images), vec![9, 8]);
        assert!(snapshot.images[0].tags.is_empty());
        assert_eq!(snapshot.images[0].tags, snapshot.images[1].tags);

        controller.toggle_tag(Tag::Film).await;
        let filtered = controller.snapshot();
        assert!(filtered.images.is_empty());
        assert_eq!(
            GalleryView::derive(&filtered, "").footer.to_string(),
            "No images found"
        );
    }
}

#[tokio::test]
async fn test_unknown_stored_labels_are_dropped() {
    let store = MemoryDocumentStore::new();
    store
        .insert_document(ImageDocument {
            id: 1,
            title: "Mixed".to_string(),
            url: "https://cdn.example/images/1.jpg".to_string(),
            tags: Some(vec!["Macro".to_string(), "Night".to_string()]),
        })
        .unwrap();
    let page = fetch_page(&store, &FeedRequest::default()).await.unwrap();
    assert_eq!(page.images[0].tags, vec![Tag::Night]);
}
