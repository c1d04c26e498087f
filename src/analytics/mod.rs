//! Visit analytics: one record per page view, enriched with browser, OS, and
//! best-effort IP geolocation.

pub mod geo;
pub mod report;

pub use geo::{locate_bounded, Geolocator, IpApiGeolocator, Location, NoopGeolocator};
pub use report::AnalyticsReport;

use crate::error::ApiError;
use crate::store::AnalyticsStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_REFERRER: &str = "Direct";
pub const DEFAULT_PATH: &str = "/";
pub const UNKNOWN: &str = "Unknown";

/// Default number of records returned by a recent-visits scan
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Body of a page-view report from a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// One stored visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub browser: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub referrer: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Browser family from a user-agent string. Order matters: Chrome UAs contain
/// "Safari", and Edge UAs contain "Chrome".
pub fn detect_browser(user_agent: &str) -> &'static str {
    if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Chrome") && !user_agent.contains("Edg") {
        "Chrome"
    } else if user_agent.contains("Safari") && !user_agent.contains("Chrome") {
        "Safari"
    } else if user_agent.contains("Edg") {
        "Edge"
    } else if user_agent.contains("Opera") || user_agent.contains("OPR") {
        "Opera"
    } else {
        UNKNOWN
    }
}

/// Operating system family from a user-agent string.
pub fn detect_os(user_agent: &str) -> &'static str {
    if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else if user_agent.contains("Android") {
        "Android"
    } else if ["iOS", "iPhone", "iPad"].iter().any(|m| user_agent.contains(m)) {
        "iOS"
    } else {
        UNKNOWN
    }
}

/// Client address: first hop of `x-forwarded-for`, else `x-real-ip`.
pub fn client_ip(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_string)
}

/// Whether an address is worth a geolocation lookup (not loopback or unknown).
pub fn is_locatable(ip: &str) -> bool {
    !(ip.is_empty()
        || ip == "unknown"
        || ip.starts_with("127.")
        || ip.starts_with("::1")
        || ip.contains("localhost"))
}

/// Geolocation settings applied while recording a visit
#[derive(Clone, Copy, Debug)]
pub struct VisitPolicy {
    pub geolocation_timeout: Duration,
}

impl Default for VisitPolicy {
    fn default() -> Self {
        Self {
            geolocation_timeout: geo::DEFAULT_GEOLOCATION_TIMEOUT,
        }
    }
}

/// Build and store one visit record.
///
/// Geolocation never blocks the write: lookup failures and timeouts leave
/// `city`/`country` unset. Store failures propagate.
pub async fn record_visit(
    store: &dyn AnalyticsStore,
    geolocator: &dyn Geolocator,
    policy: VisitPolicy,
    request: VisitRequest,
    ip: Option<String>,
) -> Result<AnalyticsRecord, ApiError> {
    let user_agent = request
        .user_agent
        .filter(|ua| !ua.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Missing userAgent".to_string()))?;

    let ip = ip.filter(|ip| ip != "unknown" && !ip.is_empty());
    let location = match ip.as_deref() {
        Some(addr) if is_locatable(addr) => {
            locate_bounded(geolocator, addr, policy.geolocation_timeout).await
        }
        _ => Location::default(),
    };

    let mut record = AnalyticsRecord {
        id: None,
        timestamp: Utc::now(),
        browser: detect_browser(&user_agent).to_string(),
        os: detect_os(&user_agent).to_string(),
        user_agent,
        city: location.city,
        country: location.country,
        referrer: request
            .referrer
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REFERRER.to_string()),
        path: request
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string()),
        ip,
    };

    let key = store.append_visit(&record).await.map_err(|e| {
        warn!(error = %e, "Failed to save analytics record");
        ApiError::StorageError(e)
    })?;
    info!(
        visit = %key,
        path = %record.path,
        browser = %record.browser,
        located = record.city.is_some(),
        "Recorded visit"
    );
    record.id = Some(key);
    Ok(record)
}
