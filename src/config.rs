//! Configuration System
//!
//! Layered configuration: built-in defaults, the global file, workspace files,
//! then `FOLIO_*` environment variables (`__` separates nested keys, e.g.
//! `FOLIO_GALLERY__PAGE_SIZE=24`).

use crate::analytics::geo::DEFAULT_GEOLOCATION_ENDPOINT;
use crate::error::ApiError;
use crate::feed::DEFAULT_PAGE_SIZE;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge {
    pub mod merge_policy;
}

mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolioConfig {
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Storage paths (relative paths resolve against the workspace root)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Document store (sled) directory
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Blob directory
    #[serde(default = "default_blob_path")]
    pub blob_path: PathBuf,
    /// Prefix of public blob URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".folio/store")
}

fn default_blob_path() -> PathBuf {
    PathBuf::from(".folio/blobs")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/blobs".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            blob_path: default_blob_path(),
            public_base_url: default_public_base_url(),
        }
    }
}

impl StorageConfig {
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.store_path)
    }

    pub fn resolve_blob_path(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.blob_path)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.bind
            .parse()
            .map_err(|e| ApiError::ConfigError(format!("Invalid server.bind '{}': {}", self.bind, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Set to false to skip IP geolocation entirely
    #[serde(default = "default_true")]
    pub geolocation: bool,
    #[serde(default = "default_geolocation_endpoint")]
    pub geolocation_endpoint: String,
    #[serde(default = "default_geolocation_timeout_ms")]
    pub geolocation_timeout_ms: u64,
    /// Visits scanned for the admin report
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

fn default_true() -> bool {
    true
}

fn default_geolocation_endpoint() -> String {
    DEFAULT_GEOLOCATION_ENDPOINT.to_string()
}

fn default_geolocation_timeout_ms() -> u64 {
    2000
}

fn default_report_limit() -> usize {
    crate::analytics::report::REPORT_LIMIT
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            geolocation: default_true(),
            geolocation_endpoint: default_geolocation_endpoint(),
            geolocation_timeout_ms: default_geolocation_timeout_ms(),
            report_limit: default_report_limit(),
        }
    }
}

impl AnalyticsConfig {
    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}

/// The single admin account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub email: Option<String>,
    /// Hex blake3 digest of the password (`folio hash-password`)
    #[serde(default)]
    pub password_digest: Option<String>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Gallery(String),
    Storage(String),
    Server(String),
    Analytics(String),
    Admin(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Gallery(msg) => write!(f, "gallery: {}", msg),
            ValidationError::Storage(msg) => write!(f, "storage: {}", msg),
            ValidationError::Server(msg) => write!(f, "server: {}", msg),
            ValidationError::Analytics(msg) => write!(f, "analytics: {}", msg),
            ValidationError::Admin(msg) => write!(f, "admin: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FolioConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.gallery.page_size == 0 {
            errors.push(ValidationError::Gallery("page_size must be at least 1".to_string()));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("store_path cannot be empty".to_string()));
        }
        if self.storage.blob_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("blob_path cannot be empty".to_string()));
        }
        if !is_http_url(&self.storage.public_base_url) {
            errors.push(ValidationError::Storage(format!(
                "public_base_url must be an http(s) URL, got '{}'",
                self.storage.public_base_url
            )));
        }
        if let Err(e) = self.server.socket_addr() {
            errors.push(ValidationError::Server(e.to_string()));
        }
        if self.analytics.geolocation && !is_http_url(&self.analytics.geolocation_endpoint) {
            errors.push(ValidationError::Analytics(format!(
                "geolocation_endpoint must be an http(s) URL, got '{}'",
                self.analytics.geolocation_endpoint
            )));
        }
        if self.analytics.geolocation_timeout_ms == 0 {
            errors.push(ValidationError::Analytics(
                "geolocation_timeout_ms must be positive".to_string(),
            ));
        }
        match (&self.admin.email, &self.admin.password_digest) {
            (Some(_), None) | (None, Some(_)) => errors.push(ValidationError::Admin(
                "email and password_digest must be set together".to_string(),
            )),
            (_, Some(digest)) if blake3::Hash::from_hex(digest.trim()).is_err() => errors.push(
                ValidationError::Admin("password_digest is not a blake3 hex digest".to_string()),
            ),
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one `ApiError::ConfigError`.
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Loads [`FolioConfig`] from its sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest): defaults, global file, `config/config.toml`,
    /// `config/{FOLIO_ENV}.toml`, `FOLIO_*` environment.
    pub fn load(workspace_root: &Path) -> Result<FolioConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let config = builder
            .add_source(
                Environment::with_prefix("FOLIO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load a single file; missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<FolioConfig, ApiError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
