//! Merge rules: defaults and override order.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("gallery.page_size", crate::feed::DEFAULT_PAGE_SIZE as i64)?
        .set_default("storage.store_path", ".folio/store")?
        .set_default("storage.blob_path", ".folio/blobs")?
        .set_default("storage.public_base_url", "http://localhost:8080/blobs")?
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("analytics.geolocation_timeout_ms", 2000_i64)
}
