//! What the gallery shows for a feed snapshot and a search query.

use crate::feed::controller::FeedSnapshot;
use crate::feed::search::filter_by_title;
use crate::types::{Image, Tag};
use std::fmt;

/// Status line rendered below the image grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFooter {
    /// First page of the session is loading (placeholder grid).
    InitialLoading,
    /// A later page is loading.
    LoadingMore,
    /// More pages exist; the near-end signal will load the next one.
    MoreAvailable,
    /// Everything has been loaded.
    EndOfFeed,
    /// Nothing to show once loading settled.
    Empty { query: Option<String> },
    /// Nothing to render (search active, feed exhausted).
    Hidden,
}

impl fmt::Display for FeedFooter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedFooter::InitialLoading => f.write_str("Loading images..."),
            FeedFooter::LoadingMore => f.write_str("Loading more..."),
            FeedFooter::MoreAvailable => f.write_str("Scroll for more"),
            FeedFooter::EndOfFeed => f.write_str("No more images to load"),
            FeedFooter::Empty { query: Some(q) } => write!(f, "No images found for \"{}\"", q),
            FeedFooter::Empty { query: None } => f.write_str("No images found"),
            FeedFooter::Hidden => Ok(()),
        }
    }
}

/// Derived gallery state: a pure function of `(snapshot, query)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryView {
    pub items: Vec<Image>,
    pub footer: FeedFooter,
    /// `Found N image(s)` while a query is active and matches something.
    pub summary: Option<String>,
    /// Filter chips, selected first.
    pub chips: Vec<(Tag, bool)>,
}

impl GalleryView {
    pub fn derive(snapshot: &FeedSnapshot, query: &str) -> Self {
        let query = query.trim();
        let items: Vec<Image> = filter_by_title(&snapshot.images, query)
            .into_iter()
            .cloned()
            .collect();

        let footer = if snapshot.is_initial_load {
            FeedFooter::InitialLoading
        } else if snapshot.is_fetching {
            FeedFooter::LoadingMore
        } else if items.is_empty() {
            FeedFooter::Empty {
                query: (!query.is_empty()).then(|| query.to_string()),
            }
        } else if snapshot.has_more {
            FeedFooter::MoreAvailable
        } else if query.is_empty() {
            FeedFooter::EndOfFeed
        } else {
            FeedFooter::Hidden
        };

        let summary = (!query.is_empty() && !items.is_empty()).then(|| {
            let n = items.len();
            format!("Found {} image{}", n, if n == 1 { "" } else { "s" })
        });

        let chips = Tag::display_order(&snapshot.selected_tags)
            .into_iter()
            .map(|t| (t, snapshot.selected_tags.contains(&t)))
            .collect();

        Self {
            items,
            footer,
            summary,
            chips,
        }
    }
}
