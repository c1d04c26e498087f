//! In-process document store
//!
//! Same query semantics as [`SledDocumentStore`](crate::store::SledDocumentStore),
//! held in memory. Used for demos and tests; supports injected failures and a
//! [`QueryGate`] that parks queries until released, to exercise in-flight states.

use crate::analytics::AnalyticsRecord;
use crate::error::StorageError;
use crate::store::{
    image_document_key, AnalyticsStore, DocumentCursor, ImageStore, ImageWriter, PageQuery,
    StoredImage,
};
use crate::types::{Image, ImageDocument, ImageId};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Default)]
struct Collections {
    /// Document key -> image (store order)
    images: BTreeMap<String, Image>,
    by_id: BTreeMap<ImageId, String>,
    visits: Vec<(String, AnalyticsRecord)>,
}

/// Handle to a gate installed by [`MemoryDocumentStore::hold_queries`]
#[derive(Clone)]
pub struct QueryGate {
    permits: Arc<Semaphore>,
}

impl QueryGate {
    /// Let exactly one parked (or future) query through.
    pub fn release_one(&self) {
        self.permits.add_permits(1);
    }

    /// Lift the gate for all current and future queries.
    pub fn open(&self) {
        self.permits.close();
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
    queries_started: AtomicUsize,
    failures_pending: AtomicUsize,
    gate: Mutex<Option<QueryGate>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given images.
    pub fn with_images(images: impl IntoIterator<Item = Image>) -> Result<Self, StorageError> {
        let store = Self::new();
        for image in images {
            store.insert_document(ImageDocument::from(&image))?;
        }
        Ok(store)
    }

    /// Insert a raw document. Legacy documents may omit `tags`.
    pub fn insert_document(&self, document: ImageDocument) -> Result<DocumentCursor, StorageError> {
        let mut collections = self.collections.write();
        if collections.by_id.contains_key(&document.id) {
            return Err(StorageError::DuplicateId(document.id));
        }
        let key = image_document_key(document.id, &document.title, &document.url);
        let image = document.into_image();
        collections.by_id.insert(image.id, key.clone());
        collections.images.insert(key.clone(), image.clone());
        Ok(DocumentCursor::new(key, image.id))
    }

    /// Number of queries that have reached the store (including parked and failed ones).
    pub fn queries_started(&self) -> usize {
        self.queries_started.load(Ordering::SeqCst)
    }

    /// Fail the next `count` queries with [`StorageError::Unavailable`].
    pub fn fail_next_queries(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Park every subsequent query until the returned gate releases it.
    pub fn hold_queries(&self) -> QueryGate {
        let gate = QueryGate {
            permits: Arc::new(Semaphore::new(0)),
        };
        if let Some(previous) = self.gate.lock().replace(gate.clone()) {
            previous.open();
        }
        gate
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn run_query(&self, query: &PageQuery) -> Vec<StoredImage> {
        let collections = self.collections.read();
        let stored = |key: &String, image: &Image| StoredImage {
            cursor: DocumentCursor::new(key.clone(), image.id),
            image: image.clone(),
        };
        match query {
            PageQuery::Ordered { limit, start_after } => {
                let upper = match start_after {
                    Some(cursor) => Bound::Excluded(cursor.id()),
                    None => Bound::Unbounded,
                };
                collections
                    .by_id
                    .range((Bound::Unbounded, upper))
                    .rev()
                    .take(*limit)
                    .filter_map(|(_, key)| collections.images.get(key).map(|img| stored(key, img)))
                    .collect()
            }
            PageQuery::AnyOf {
                tags,
                limit,
                start_after,
            } => {
                let lower: Bound<&str> = match start_after {
                    Some(cursor) => Bound::Excluded(cursor.key()),
                    None => Bound::Unbounded,
                };
                collections
                    .images
                    .range::<str, _>((lower, Bound::Unbounded))
                    .filter(|(_, image)| image.tags.iter().any(|t| tags.contains(t)))
                    .take(*limit)
                    .map(|(key, image)| stored(key, image))
                    .collect()
            }
        }
    }
}

#[async_trait]
impl ImageStore for MemoryDocumentStore {
    async fn query(&self, query: &PageQuery) -> Result<Vec<StoredImage>, StorageError> {
        self.queries_started.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            // A closed semaphore means the gate was lifted.
            if let Ok(permit) = gate.permits.acquire().await {
                permit.forget();
            }
        }

        if self.take_failure() {
            return Err(StorageError::Unavailable("injected query failure".to_string()));
        }
        Ok(self.run_query(query))
    }
}

#[async_trait]
impl ImageWriter for MemoryDocumentStore {
    async fn append_image(&self, image: &Image) -> Result<DocumentCursor, StorageError> {
        self.insert_document(ImageDocument::from(image))
    }
}

#[async_trait]
impl AnalyticsStore for MemoryDocumentStore {
    async fn append_visit(&self, record: &AnalyticsRecord) -> Result<String, StorageError> {
        let mut collections = self.collections.write();
        let key = format!("visit-{:08}", collections.visits.len() + 1);
        collections.visits.push((key.clone(), record.clone()));
        Ok(key)
    }

    async fn recent_visits(&self, limit: usize) -> Result<Vec<AnalyticsRecord>, StorageError> {
        let collections = self.collections.read();
        let mut visits: Vec<AnalyticsRecord> = collections
            .visits
            .iter()
            .map(|(key, record)| {
                let mut record = record.clone();
                record.id = Some(key.clone());
                record
            })
            .collect();
        visits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        visits.truncate(limit);
        Ok(visits)
    }
}
