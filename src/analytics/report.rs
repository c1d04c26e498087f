//! Aggregates over recent visits for the admin report.

use crate::analytics::{AnalyticsRecord, UNKNOWN};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Rows kept in each "top" table
pub const TOP_ENTRIES: usize = 5;

/// Default scan size for the admin report
pub const REPORT_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsReport {
    pub total_visits: usize,
    pub unique_browsers: usize,
    pub unique_os: usize,
    pub unique_cities: usize,
    pub top_browsers: Vec<CountEntry>,
    pub top_os: Vec<CountEntry>,
    /// Keyed `"<city>, <country>"`; visits without a city are excluded.
    pub top_cities: Vec<CountEntry>,
}

impl AnalyticsReport {
    pub fn from_records(records: &[AnalyticsRecord]) -> Self {
        let unique = |f: fn(&AnalyticsRecord) -> Option<&str>| {
            records.iter().filter_map(f).collect::<HashSet<_>>().len()
        };

        Self {
            total_visits: records.len(),
            unique_browsers: unique(|r| Some(r.browser.as_str())),
            unique_os: unique(|r| Some(r.os.as_str())),
            unique_cities: unique(|r| r.city.as_deref()),
            top_browsers: top_counts(records.iter().map(|r| r.browser.clone())),
            top_os: top_counts(records.iter().map(|r| r.os.clone())),
            top_cities: top_counts(records.iter().filter_map(|r| {
                r.city.as_ref().map(|city| {
                    format!("{}, {}", city, r.country.as_deref().unwrap_or(UNKNOWN))
                })
            })),
        }
    }
}

/// Highest counts first; ties broken by label so output is stable.
fn top_counts(labels: impl Iterator<Item = String>) -> Vec<CountEntry> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(label, count)| CountEntry { label, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries.truncate(TOP_ENTRIES);
    entries
}
