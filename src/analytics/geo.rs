//! IP geolocation: trait seam plus the ip-api.com client.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Upper bound on how long a visit write waits for geolocation
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_GEOLOCATION_ENDPOINT: &str = "http://ip-api.com/json";

const GEOLOCATION_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self, ip: &str) -> Result<Location, ApiError>;
}

/// Look up `ip`, giving up after `timeout`. Errors and timeouts yield an empty location.
pub async fn locate_bounded(geolocator: &dyn Geolocator, ip: &str, timeout: Duration) -> Location {
    match tokio::time::timeout(timeout, geolocator.locate(ip)).await {
        Ok(Ok(location)) => location,
        Ok(Err(e)) => {
            debug!(ip = %ip, error = %e, "Geolocation failed");
            Location::default()
        }
        Err(_) => {
            debug!(ip = %ip, timeout_ms = timeout.as_millis() as u64, "Geolocation timed out");
            Location::default()
        }
    }
}

/// Client for the free ip-api.com JSON endpoint
pub struct IpApiGeolocator {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct IpApiResponse {
    city: Option<String>,
    country: Option<String>,
}

impl IpApiGeolocator {
    pub fn new(endpoint: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(GEOLOCATION_HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ApiError::GeolocationFailed(format!("Failed to create HTTP client: {}", e))
            })?;
        let endpoint = endpoint
            .unwrap_or_else(|| DEFAULT_GEOLOCATION_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Geolocator for IpApiGeolocator {
    async fn locate(&self, ip: &str) -> Result<Location, ApiError> {
        let url = format!("{}/{}", self.endpoint, ip);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "city,country")])
            .send()
            .await
            .map_err(|e| ApiError::GeolocationFailed(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Geolocation endpoint returned an error status");
            return Ok(Location::default());
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| ApiError::GeolocationFailed(format!("Failed to parse response: {}", e)))?;

        Ok(Location {
            city: body.city.filter(|c| !c.is_empty()),
            country: body.country.filter(|c| !c.is_empty()),
        })
    }
}

/// Geolocator that never finds anything (geolocation disabled)
pub struct NoopGeolocator;

#[async_trait]
impl Geolocator for NoopGeolocator {
    async fn locate(&self, _ip: &str) -> Result<Location, ApiError> {
        Ok(Location::default())
    }
}
