//! Document Store
//!
//! Read and write interfaces for the image and analytics collections. The read
//! side exposes exactly one query primitive ([`PageQuery`]) in two shapes: an
//! ordered scan by descending `id`, and an unordered any-of tag scan. Both page
//! with a "start after this record" [`DocumentCursor`].

pub mod memory;
pub mod persistence;

pub use memory::{MemoryDocumentStore, QueryGate};
pub use persistence::SledDocumentStore;

use crate::analytics::AnalyticsRecord;
use crate::error::StorageError;
use crate::types::{Image, ImageId, TagSet};
use async_trait::async_trait;

/// Native handle of a stored record, used to continue a scan after it.
///
/// Callers above the store treat it as opaque; [`DocumentCursor::encode`]
/// produces the token handed to HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentCursor {
    key: String,
    id: ImageId,
}

impl DocumentCursor {
    pub(crate) fn new(key: impl Into<String>, id: ImageId) -> Self {
        Self {
            key: key.into(),
            id,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn id(&self) -> ImageId {
        self.id
    }

    /// Encode as an opaque URL-safe token.
    pub fn encode(&self) -> String {
        hex::encode(format!("{}:{}", self.id, self.key))
    }

    /// Decode a token produced by [`DocumentCursor::encode`].
    pub fn decode(token: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::InvalidCursor(token.to_string());
        let bytes = hex::decode(token).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (id, key) = raw.split_once(':').ok_or_else(invalid)?;
        let id = id.parse::<ImageId>().map_err(|_| invalid())?;
        if key.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(key, id))
    }
}

/// One executable page request against the image collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageQuery {
    /// Up to `limit` records ordered by `id` descending, strictly after `start_after`.
    Ordered {
        limit: usize,
        start_after: Option<DocumentCursor>,
    },
    /// Up to `limit` records whose tags intersect `tags`, in store order
    /// (no ordering guarantee), strictly after `start_after`.
    AnyOf {
        tags: TagSet,
        limit: usize,
        start_after: Option<DocumentCursor>,
    },
}

impl PageQuery {
    pub fn limit(&self) -> usize {
        match self {
            PageQuery::Ordered { limit, .. } | PageQuery::AnyOf { limit, .. } => *limit,
        }
    }

    pub fn start_after(&self) -> Option<&DocumentCursor> {
        match self {
            PageQuery::Ordered { start_after, .. } | PageQuery::AnyOf { start_after, .. } => {
                start_after.as_ref()
            }
        }
    }
}

/// A record returned by a query together with its native handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub cursor: DocumentCursor,
    pub image: Image,
}

/// Read interface consumed by the feed
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn query(&self, query: &PageQuery) -> Result<Vec<StoredImage>, StorageError>;
}

/// Append-only write interface consumed by the upload flow
#[async_trait]
pub trait ImageWriter: Send + Sync {
    async fn append_image(&self, image: &Image) -> Result<DocumentCursor, StorageError>;
}

/// Append + recent-first scan over visit records
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Store one visit; returns the generated document key.
    async fn append_visit(&self, record: &AnalyticsRecord) -> Result<String, StorageError>;

    /// Most recent visits first, at most `limit`.
    async fn recent_visits(&self, limit: usize) -> Result<Vec<AnalyticsRecord>, StorageError>;
}

/// Document key for an image: a content digest, so store order is unrelated to
/// `id` order (as with auto-generated keys in hosted document stores).
pub(crate) fn image_document_key(id: ImageId, title: &str, url: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&id.to_be_bytes());
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    hasher.finalize().to_hex()[..20].to_string()
}
