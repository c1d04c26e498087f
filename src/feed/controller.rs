//! Feed controller: owns the accumulated feed for the current tag filter.
//!
//! State machine over {Idle, Fetching}:
//! - Idle -> Fetching on [`FeedController::mount`] (reset), on a filter change
//!   (reset, after a synchronous clear), or on [`FeedController::request_next_page`]
//!   while `has_more && !is_fetching`.
//! - Fetching -> Idle when the fetch settles, whatever the outcome, or when
//!   the load future is dropped first. A cancelled load keeps the cursor, so
//!   the next request fetches the same page again.
//!
//! At most one fetch is in flight per session. A filter change starts a new
//! session; a fetch issued by an older session still completes but its result
//! is discarded on settle instead of being applied.
//!
//! Every transition republishes a [`FeedSnapshot`] to subscribers.

use crate::feed::query::{fetch_page, FeedRequest, DEFAULT_PAGE_SIZE};
use crate::store::{DocumentCursor, ImageStore};
use crate::types::{toggle_tag, Image, ImageId, Tag, TagSet};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Published, read-only view of feed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub images: Vec<Image>,
    pub selected_tags: TagSet,
    pub has_more: bool,
    pub is_fetching: bool,
    /// First page of the current session has not settled yet.
    pub is_initial_load: bool,
    /// Session number; bumped on every filter change.
    pub session: u64,
}

/// Why a load request did not issue a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A fetch for this session is already in flight.
    InFlight,
    /// The session reached the end of the feed.
    Exhausted,
    /// The requested filter equals the active one.
    Unchanged,
}

/// Result of a load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was merged into the feed.
    Applied { received: usize, has_more: bool },
    /// No fetch was issued.
    Skipped(SkipReason),
    /// The fetch settled after a newer session started; its result was dropped.
    Discarded,
    /// The fetch failed; auto-loading is stopped for this session.
    Failed { error: String },
}

struct FeedState {
    accumulated: Vec<Image>,
    seen: HashSet<ImageId>,
    cursor: Option<DocumentCursor>,
    selected_tags: TagSet,
    has_more: bool,
    is_fetching: bool,
    is_initial_load: bool,
    session: u64,
}

impl FeedState {
    fn new() -> Self {
        Self {
            accumulated: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
            selected_tags: TagSet::new(),
            has_more: true,
            is_fetching: false,
            is_initial_load: true,
            session: 0,
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            images: self.accumulated.clone(),
            selected_tags: self.selected_tags.clone(),
            has_more: self.has_more,
            is_fetching: self.is_fetching,
            is_initial_load: self.is_initial_load,
            session: self.session,
        }
    }

    /// Empty the feed for a new filter selection.
    fn begin_session(&mut self, selected_tags: TagSet) {
        self.session += 1;
        self.selected_tags = selected_tags;
        self.accumulated.clear();
        self.seen.clear();
        self.cursor = None;
        self.has_more = true;
        self.is_fetching = false;
        self.is_initial_load = true;
    }
}

/// Drives incremental loading of the image feed under a changeable tag filter.
pub struct FeedController {
    store: Arc<dyn ImageStore>,
    page_size: usize,
    state: Mutex<FeedState>,
    publisher: watch::Sender<FeedSnapshot>,
}

impl FeedController {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self::with_page_size(store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(store: Arc<dyn ImageStore>, page_size: usize) -> Self {
        let state = FeedState::new();
        let (publisher, _) = watch::channel(state.snapshot());
        Self {
            store,
            page_size: page_size.max(1),
            state: Mutex::new(state),
            publisher,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current state.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.publisher.borrow().clone()
    }

    /// Receive a snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.publisher.subscribe()
    }

    /// Initial load when the gallery is first shown.
    pub async fn mount(&self) -> LoadOutcome {
        self.load(true).await
    }

    /// Near-end-of-list signal from whatever detects it (scroll sentinel,
    /// keyboard paging, a CLI loop).
    pub async fn request_next_page(&self) -> LoadOutcome {
        {
            let state = self.state.lock();
            if state.is_fetching {
                return LoadOutcome::Skipped(SkipReason::InFlight);
            }
            if !state.has_more {
                return LoadOutcome::Skipped(SkipReason::Exhausted);
            }
        }
        self.load(false).await
    }

    /// Replace the tag filter: clear the feed synchronously, then load the
    /// first page of the new session. A fetch still in flight for the old
    /// selection is left to finish and then dropped.
    pub async fn set_selected_tags(&self, selected_tags: TagSet) -> LoadOutcome {
        {
            let mut state = self.state.lock();
            if state.selected_tags == selected_tags {
                return LoadOutcome::Skipped(SkipReason::Unchanged);
            }
            state.begin_session(selected_tags);
            debug!(
                session = state.session,
                tags = ?state.selected_tags,
                "Filter changed; feed cleared"
            );
            self.publish(&state);
        }
        self.load(true).await
    }

    /// Add `tag` to the filter if absent, remove it if present.
    pub async fn toggle_tag(&self, tag: Tag) -> LoadOutcome {
        let next = toggle_tag(&self.state.lock().selected_tags, tag);
        self.set_selected_tags(next).await
    }

    pub async fn clear_tags(&self) -> LoadOutcome {
        self.set_selected_tags(TagSet::new()).await
    }

    /// Fetch one page.
    ///
    /// `reset` starts over from the beginning of the current filter's feed and
    /// replaces the accumulated list on success; otherwise the next page is
    /// appended. A no-op while a fetch for this session is in flight, and for
    /// `reset == false` once the session is exhausted. Failures never escape:
    /// they stop auto-loading (`has_more = false`) and leave the list as it was.
    pub async fn load(&self, reset: bool) -> LoadOutcome {
        let (request, session) = {
            let mut state = self.state.lock();
            if state.is_fetching {
                debug!(session = state.session, reset, "Load ignored: fetch in flight");
                return LoadOutcome::Skipped(SkipReason::InFlight);
            }
            if !reset && !state.has_more {
                return LoadOutcome::Skipped(SkipReason::Exhausted);
            }
            state.is_fetching = true;
            let cursor = if reset { None } else { state.cursor.clone() };
            let request = FeedRequest::new(state.selected_tags.clone(), self.page_size, cursor);
            self.publish(&state);
            (request, state.session)
        };

        debug!(session, reset, filtered = request.is_filtered(), "Fetching feed page");
        let mut in_flight = InFlight {
            controller: self,
            session,
            settled: false,
        };
        let result = fetch_page(self.store.as_ref(), &request).await;
        in_flight.settled = true;

        let mut state = self.state.lock();
        if state.session != session {
            debug!(
                stale_session = session,
                current_session = state.session,
                "Discarding settle from a previous filter session"
            );
            return LoadOutcome::Discarded;
        }

        state.is_fetching = false;
        state.is_initial_load = false;
        let outcome = match result {
            Ok(page) => {
                if reset {
                    state.accumulated.clear();
                    state.seen.clear();
                }
                let received = page.images.len();
                for image in page.images {
                    if state.seen.insert(image.id) {
                        state.accumulated.push(image);
                    } else {
                        warn!(image_id = image.id, session, "Dropping duplicate image from page");
                    }
                }
                state.cursor = page.cursor;
                state.has_more = page.has_more;
                debug!(
                    session,
                    received,
                    total = state.accumulated.len(),
                    has_more = state.has_more,
                    "Feed page applied"
                );
                LoadOutcome::Applied {
                    received,
                    has_more: page.has_more,
                }
            }
            Err(e) => {
                warn!(session, error = %e, "Feed fetch failed; stopping auto-load");
                state.has_more = false;
                LoadOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.publish(&state);
        outcome
    }

    fn publish(&self, state: &FeedState) {
        self.publisher.send_replace(state.snapshot());
    }
}

/// Returns the session to Idle if a load is dropped before its fetch settles.
struct InFlight<'a> {
    controller: &'a FeedController,
    session: u64,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.controller.state.lock();
        if state.session == self.session && state.is_fetching {
            state.is_fetching = false;
            debug!(session = self.session, "Load cancelled before settle");
            self.controller.publish(&state);
        }
    }
}
