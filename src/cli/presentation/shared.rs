//! Shared presentation: session state and upload results.

use crate::auth::AuthState;
use crate::types::Image;
use crate::upload::UploadReport;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

pub fn format_auth_state(state: &AuthState) -> String {
    match state {
        AuthState::SignedIn(principal) => {
            format!("Signed in as {} (uid {})", principal.email, principal.uid)
        }
        AuthState::SignedOut => "Not signed in.".to_string(),
        AuthState::Unknown => "Session not restored.".to_string(),
    }
}

pub fn format_uploaded_image(image: &Image) -> String {
    format!("Uploaded {} ({})\n  {}", image.title, image.id, image.url)
}

pub fn format_upload_report(report: &UploadReport) -> String {
    let mut out = String::new();
    if !report.uploaded.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Id", "Title", "URL"]);
        for image in &report.uploaded {
            table.add_row(vec![image.id.to_string(), image.title.clone(), image.url.clone()]);
        }
        out.push_str(&table.to_string());
        out.push_str("\n\n");
    }
    out.push_str(&format!("Uploaded: {}", report.uploaded.len()));
    if !report.failed.is_empty() {
        out.push_str(&format!("\nFailed ({}):", report.failed.len()));
        for (path, error) in &report.failed {
            out.push_str(&format!("\n  - {}: {}", path.display(), error));
        }
    }
    out
}
