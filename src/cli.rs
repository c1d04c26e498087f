//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, requires_admin};
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_analytics_report_json, format_analytics_report_text, format_auth_state,
    format_gallery_json, format_gallery_text, format_tags_text, format_upload_report,
    format_uploaded_image, format_visits_json, format_visits_text,
};
pub use route::RunContext;
