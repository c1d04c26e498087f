//! Query builder: filter selection + cursor -> one store request -> one page.
//!
//! The store cannot combine an any-of tag predicate with a sort on `id`, so a
//! filtered request is issued unordered and each page is re-sorted locally.
//! That restores order within a page only; across pages, order under a filter
//! follows store order.

use crate::error::StorageError;
use crate::store::{DocumentCursor, ImageStore, PageQuery};
use crate::types::{Image, TagSet};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 12;

/// Immutable parameters of one page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    selected_tags: TagSet,
    page_size: usize,
    cursor: Option<DocumentCursor>,
}

impl Default for FeedRequest {
    fn default() -> Self {
        Self {
            selected_tags: TagSet::new(),
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl FeedRequest {
    pub fn new(selected_tags: TagSet, page_size: usize, cursor: Option<DocumentCursor>) -> Self {
        Self {
            selected_tags,
            page_size: page_size.max(1),
            cursor,
        }
    }

    pub fn with_tags(mut self, selected_tags: TagSet) -> Self {
        self.selected_tags = selected_tags;
        self
    }

    /// Page size; values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<DocumentCursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn selected_tags(&self) -> &TagSet {
        &self.selected_tags
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cursor(&self) -> Option<&DocumentCursor> {
        self.cursor.as_ref()
    }

    pub fn is_filtered(&self) -> bool {
        !self.selected_tags.is_empty()
    }
}

/// One page of the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub images: Vec<Image>,
    /// Handle of the last retained record when more remain, else `None`.
    pub cursor: Option<DocumentCursor>,
    pub has_more: bool,
}

/// Build the store request: one record beyond the page size is requested so
/// the presence of a further page is known without another round trip.
pub fn build_query(request: &FeedRequest) -> PageQuery {
    let limit = request.page_size + 1;
    let start_after = request.cursor.clone();
    if request.is_filtered() {
        PageQuery::AnyOf {
            tags: request.selected_tags.clone(),
            limit,
            start_after,
        }
    } else {
        PageQuery::Ordered { limit, start_after }
    }
}

/// Execute one page request against the store.
pub async fn fetch_page(
    store: &dyn ImageStore,
    request: &FeedRequest,
) -> Result<FeedPage, StorageError> {
    let query = build_query(request);
    let mut records = store.query(&query).await?;

    let has_more = records.len() > request.page_size;
    records.truncate(request.page_size);
    // Cursor is taken in store order, before any local re-sort.
    let cursor = if has_more {
        records.last().map(|r| r.cursor.clone())
    } else {
        None
    };

    let mut images: Vec<Image> = records.into_iter().map(|r| r.image).collect();
    if request.is_filtered() {
        images.sort_by(|a, b| b.id.cmp(&a.id));
    }

    debug!(
        filtered = request.is_filtered(),
        returned = images.len(),
        has_more,
        "Fetched feed page"
    );
    Ok(FeedPage {
        images,
        cursor,
        has_more,
    })
}
