//! Gallery feed: incremental, tag-filtered loading of published images.
//!
//! [`query`] turns a filter selection and continuation cursor into one store
//! request and a trimmed page. [`controller`] owns the accumulated feed for one
//! filter session and guards against overlapping or stale fetches. [`search`]
//! and [`view`] derive what is shown from an already-loaded snapshot.

pub mod controller;
pub mod query;
pub mod search;
pub mod view;

pub use controller::{FeedController, FeedSnapshot, LoadOutcome, SkipReason};
pub use query::{build_query, fetch_page, FeedPage, FeedRequest, DEFAULT_PAGE_SIZE};
pub use search::filter_by_title;
pub use view::{FeedFooter, GalleryView};
