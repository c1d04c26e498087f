//! CLI presentation: text and json formatters per command family.

mod analytics;
mod gallery;
mod shared;

pub use analytics::{
    format_analytics_report_json, format_analytics_report_text, format_visits_json,
    format_visits_text,
};
pub use gallery::{format_gallery_json, format_gallery_text, format_tags_text};
pub use shared::{format_auth_state, format_upload_report, format_uploaded_image};
