//! Gallery presentation: feed view as table or json, tag chips.

use crate::error::{ApiError, StorageError};
use crate::feed::GalleryView;
use crate::types::{Tag, TagSet};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

fn tag_list(tags: &[Tag]) -> String {
    tags.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
}

pub fn format_gallery_text(view: &GalleryView) -> String {
    let mut out = String::new();

    let chips: Vec<String> = view
        .chips
        .iter()
        .filter(|(_, selected)| *selected)
        .map(|(tag, _)| format!("{}", tag.as_str().bold()))
        .collect();
    if !chips.is_empty() {
        out.push_str(&format!("Filter: {}\n", chips.join(" ")));
    }
    if let Some(summary) = &view.summary {
        out.push_str(summary);
        out.push('\n');
    }

    if !view.items.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Id", "Title", "Tags", "URL"]);
        for image in &view.items {
            table.add_row(vec![
                image.id.to_string(),
                image.title.clone(),
                tag_list(&image.tags),
                image.url.clone(),
            ]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }

    let footer = view.footer.to_string();
    if !footer.is_empty() {
        out.push_str(&format!("{}", footer.dimmed()));
    }
    out.trim_end().to_string()
}

pub fn format_gallery_json(view: &GalleryView) -> Result<String, ApiError> {
    let selected: Vec<&str> = view
        .chips
        .iter()
        .filter(|(_, selected)| *selected)
        .map(|(tag, _)| tag.as_str())
        .collect();
    let out = json!({
        "selected_tags": selected,
        "images": view.items,
        "summary": view.summary,
        "status": view.footer.to_string(),
    });
    serde_json::to_string_pretty(&out)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e.to_string())))
}

/// Filter chips in display order, selected ones marked.
pub fn format_tags_text(selected: &TagSet) -> String {
    Tag::display_order(selected)
        .into_iter()
        .map(|tag| {
            if selected.contains(&tag) {
                format!("[x] {}", tag.as_str().green())
            } else {
                format!("[ ] {}", tag.as_str())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
