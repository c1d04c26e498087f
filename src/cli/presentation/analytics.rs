//! Analytics presentation: report summary and visit listings.

use crate::analytics::report::CountEntry;
use crate::analytics::{AnalyticsRecord, AnalyticsReport};
use crate::error::{ApiError, StorageError};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e.to_string())))
}

fn count_table(title: &str, entries: &[CountEntry]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![title, "Visits"]);
    for entry in entries {
        table.add_row(vec![entry.label.clone(), entry.count.to_string()]);
    }
    table.to_string()
}

pub fn format_analytics_report_text(report: &AnalyticsReport) -> String {
    if report.total_visits == 0 {
        return "No visits recorded yet.".to_string();
    }
    let mut out = format!(
        "{}\n  Total visits:    {}\n  Browsers:        {}\n  Operating systems: {}\n  Cities:          {}\n",
        "Visit analytics".bold().underline(),
        report.total_visits,
        report.unique_browsers,
        report.unique_os,
        report.unique_cities,
    );
    out.push('\n');
    out.push_str(&count_table("Browser", &report.top_browsers));
    out.push_str("\n\n");
    out.push_str(&count_table("OS", &report.top_os));
    if !report.top_cities.is_empty() {
        out.push_str("\n\n");
        out.push_str(&count_table("City", &report.top_cities));
    }
    out
}

pub fn format_analytics_report_json(report: &AnalyticsReport) -> Result<String, ApiError> {
    to_json(report)
}

pub fn format_visits_text(visits: &[AnalyticsRecord]) -> String {
    if visits.is_empty() {
        return "No visits recorded yet.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Time", "Path", "Browser", "OS", "Location", "Referrer"]);
    for visit in visits {
        let location = match (&visit.city, &visit.country) {
            (Some(city), Some(country)) => format!("{}, {}", city, country),
            (Some(city), None) => city.clone(),
            (None, Some(country)) => country.clone(),
            (None, None) => "-".to_string(),
        };
        table.add_row(vec![
            visit.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            visit.path.clone(),
            visit.browser.clone(),
            visit.os.clone(),
            location,
            visit.referrer.clone(),
        ]);
    }
    format!("{}\n\nTotal: {} visit(s)", table, visits.len())
}

pub fn format_visits_json(visits: &[AnalyticsRecord]) -> Result<String, ApiError> {
    to_json(&visits)
}
