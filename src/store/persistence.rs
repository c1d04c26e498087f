//! Persistence layer for the document store

use crate::analytics::AnalyticsRecord;
use crate::error::StorageError;
use crate::store::{
    image_document_key, AnalyticsStore, DocumentCursor, ImageStore, ImageWriter, PageQuery,
    StoredImage,
};
use crate::types::{Image, ImageDocument, TagSet};
use async_trait::async_trait;
use std::ops::Bound;
use std::path::Path;
use tracing::debug;

const IMAGES_TREE: &str = "images";
const IMAGES_BY_ID_TREE: &str = "images_by_id";
const ANALYTICS_TREE: &str = "analytics";

/// Sled-based document store
///
/// `images` holds JSON documents under their document key (store order).
/// `images_by_id` maps big-endian `id` to document key and backs the ordered scan.
/// `analytics` holds JSON visit records under `timestamp_ms ++ sequence`.
pub struct SledDocumentStore {
    db: sled::Db,
    images: sled::Tree,
    images_by_id: sled::Tree,
    analytics: sled::Tree,
}

impl SledDocumentStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    /// Build on an already opened database (shared with other components)
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let images = db.open_tree(IMAGES_TREE)?;
        let images_by_id = db.open_tree(IMAGES_BY_ID_TREE)?;
        let analytics = db.open_tree(ANALYTICS_TREE)?;
        Ok(Self {
            db,
            images,
            images_by_id,
            analytics,
        })
    }

    /// Get the underlying sled database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Store a raw image document. Legacy documents may omit `tags`.
    pub fn put_document(&self, document: &ImageDocument) -> Result<DocumentCursor, StorageError> {
        let id_key = document.id.to_be_bytes();
        if self.images_by_id.contains_key(id_key)? {
            return Err(StorageError::DuplicateId(document.id));
        }
        let key = image_document_key(document.id, &document.title, &document.url);
        let value = serde_json::to_vec(document)?;
        self.images.insert(key.as_bytes(), value)?;
        self.images_by_id.insert(id_key, key.as_bytes())?;
        debug!(image_id = document.id, key = %key, "Stored image document");
        Ok(DocumentCursor::new(key, document.id))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn visit_count(&self) -> usize {
        self.analytics.len()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn decode_stored(key: &[u8], value: &[u8]) -> Result<StoredImage, StorageError> {
        let document: ImageDocument = serde_json::from_slice(value)?;
        let key = String::from_utf8(key.to_vec())
            .map_err(|e| StorageError::Serialization(format!("Invalid document key: {}", e)))?;
        let image = document.into_image();
        Ok(StoredImage {
            cursor: DocumentCursor::new(key, image.id),
            image,
        })
    }

    fn query_ordered(
        &self,
        limit: usize,
        start_after: Option<&DocumentCursor>,
    ) -> Result<Vec<StoredImage>, StorageError> {
        let iter = match start_after {
            Some(cursor) => self.images_by_id.range(..cursor.id().to_be_bytes()),
            None => self.images_by_id.iter(),
        };
        let mut page = Vec::with_capacity(limit);
        for item in iter.rev() {
            if page.len() >= limit {
                break;
            }
            let (_, doc_key) = item?;
            let value = self
                .images
                .get(&doc_key)?
                .ok_or_else(|| {
                    StorageError::DocumentNotFound(String::from_utf8_lossy(&doc_key).into_owned())
                })?;
            page.push(Self::decode_stored(&doc_key, &value)?);
        }
        Ok(page)
    }

    fn query_any_of(
        &self,
        tags: &TagSet,
        limit: usize,
        start_after: Option<&DocumentCursor>,
    ) -> Result<Vec<StoredImage>, StorageError> {
        let iter = match start_after {
            Some(cursor) => {
                let lower: Bound<&[u8]> = Bound::Excluded(cursor.key().as_bytes());
                let upper: Bound<&[u8]> = Bound::Unbounded;
                self.images.range::<&[u8], _>((lower, upper))
            }
            None => self.images.iter(),
        };
        let mut page = Vec::with_capacity(limit);
        for item in iter {
            if page.len() >= limit {
                break;
            }
            let (key, value) = item?;
            let stored = Self::decode_stored(&key, &value)?;
            if stored.image.tags.iter().any(|t| tags.contains(t)) {
                page.push(stored);
            }
        }
        Ok(page)
    }
}

#[async_trait]
impl ImageStore for SledDocumentStore {
    async fn query(&self, query: &PageQuery) -> Result<Vec<StoredImage>, StorageError> {
        match query {
            PageQuery::Ordered { limit, start_after } => {
                self.query_ordered(*limit, start_after.as_ref())
            }
            PageQuery::AnyOf {
                tags,
                limit,
                start_after,
            } => self.query_any_of(tags, *limit, start_after.as_ref()),
        }
    }
}

#[async_trait]
impl ImageWriter for SledDocumentStore {
    async fn append_image(&self, image: &Image) -> Result<DocumentCursor, StorageError> {
        let cursor = self.put_document(&ImageDocument::from(image))?;
        self.db.flush_async().await?;
        Ok(cursor)
    }
}

#[async_trait]
impl AnalyticsStore for SledDocumentStore {
    async fn append_visit(&self, record: &AnalyticsRecord) -> Result<String, StorageError> {
        let millis = u64::try_from(record.timestamp.timestamp_millis()).unwrap_or(0);
        let seq = self.db.generate_id()?;
        let mut key = Vec::with_capacity(16);
        key.extend_from_slice(&millis.to_be_bytes());
        key.extend_from_slice(&seq.to_be_bytes());

        let mut stored = record.clone();
        stored.id = None;
        self.analytics.insert(&key, serde_json::to_vec(&stored)?)?;
        self.db.flush_async().await?;
        Ok(hex::encode(key))
    }

    async fn recent_visits(&self, limit: usize) -> Result<Vec<AnalyticsRecord>, StorageError> {
        let mut visits = Vec::with_capacity(limit.min(self.analytics.len()));
        for item in self.analytics.iter().rev().take(limit) {
            let (key, value) = item?;
            let mut record: AnalyticsRecord = serde_json::from_slice(&value)?;
            record.id = Some(hex::encode(&key));
            visits.push(record);
        }
        Ok(visits)
    }
}
