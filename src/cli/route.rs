//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::analytics::geo::{IpApiGeolocator, NoopGeolocator};
use crate::analytics::{AnalyticsReport, Geolocator, VisitPolicy, DEFAULT_RECENT_LIMIT};
use crate::auth::{digest_password, AuthSession, LocalIdentityProvider};
use crate::cli::help::{command_name, requires_admin};
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_analytics_report_json, format_analytics_report_text, format_auth_state,
    format_gallery_json, format_gallery_text, format_tags_text, format_upload_report,
    format_uploaded_image, format_visits_json, format_visits_text,
};
use crate::config::{ConfigLoader, FolioConfig};
use crate::error::{ApiError, StorageError};
use crate::feed::{FeedController, GalleryView, LoadOutcome};
use crate::server::{self, AppState};
use crate::store::{AnalyticsStore, SledDocumentStore};
use crate::types::{Tag, TagSet};
use crate::upload::{FsBlobStore, Uploader, DEFAULT_UPLOAD_CONCURRENCY};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runtime context for CLI execution: workspace, configuration, and opened stores.
pub struct RunContext {
    workspace_root: PathBuf,
    config: FolioConfig,
    store: Arc<SledDocumentStore>,
    auth: AuthSession,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        }
        .validated()?;
        Self::with_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: FolioConfig) -> Result<Self, ApiError> {
        let store_path = config.storage.resolve_store_path(&workspace_root);
        std::fs::create_dir_all(&store_path).map_err(StorageError::IoError)?;
        let store = Arc::new(SledDocumentStore::new(&store_path)?);

        let provider = LocalIdentityProvider::new(
            store.db(),
            config.admin.email.clone(),
            config.admin.password_digest.as_deref(),
        )?;
        let auth = AuthSession::new(Arc::new(provider));
        debug!(store = %store_path.display(), "Run context ready");

        Ok(Self {
            workspace_root,
            config,
            store,
            auth,
        })
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<SledDocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let name = command_name(command);
        let span = info_span!("command", name);
        async {
            let started = Instant::now();
            self.auth.restore_on_startup().await;
            if requires_admin(command) {
                self.auth.require_admin()?;
            }
            let result = self.execute_inner(command).await;
            info!(
                ok = result.is_ok(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve { bind } => self.handle_serve(bind.as_deref()).await,
            Commands::Gallery {
                tags,
                search,
                pages,
                page_size,
                format,
            } => {
                self.handle_gallery(tags, search.as_deref(), *pages, *page_size, format)
                    .await
            }
            Commands::Tags { selected } => Ok(format_tags_text(&parse_tags(selected)?)),
            Commands::Upload { path, title, tags } => {
                self.handle_upload(path, title.as_deref(), tags).await
            }
            Commands::Analytics {
                limit,
                visits,
                format,
            } => self.handle_analytics(*limit, *visits, format).await,
            Commands::Login { email } => self.handle_login(email.as_deref()).await,
            Commands::Logout => {
                self.auth.sign_out().await?;
                Ok("Signed out.".to_string())
            }
            Commands::Whoami => Ok(format_auth_state(&self.auth.state())),
            Commands::HashPassword => {
                let password = dialoguer::Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Repeat password", "Passwords do not match")
                    .interact()
                    .map_err(|e| ApiError::InvalidInput(format!("Failed to read password: {}", e)))?;
                Ok(digest_password(&password))
            }
            Commands::Config { format } => self.handle_config(format),
        }
    }

    /// Geolocator per configuration; disabled geolocation never looks anything up.
    fn geolocator(&self) -> Result<Arc<dyn Geolocator>, ApiError> {
        if self.config.analytics.geolocation {
            Ok(Arc::new(IpApiGeolocator::new(Some(
                self.config.analytics.geolocation_endpoint.clone(),
            ))?))
        } else {
            Ok(Arc::new(NoopGeolocator))
        }
    }

    async fn handle_serve(&self, bind: Option<&str>) -> Result<String, ApiError> {
        let bind = match bind {
            Some(addr) => addr
                .parse()
                .map_err(|e| ApiError::InvalidInput(format!("Invalid --bind '{}': {}", addr, e)))?,
            None => self.config.server.socket_addr()?,
        };
        let blob_root = self.config.storage.resolve_blob_path(&self.workspace_root);
        std::fs::create_dir_all(&blob_root).map_err(StorageError::IoError)?;

        let state = AppState {
            images: self.store.clone(),
            analytics: self.store.clone(),
            geolocator: self.geolocator()?,
            policy: VisitPolicy {
                geolocation_timeout: self.config.analytics.geolocation_timeout(),
            },
            default_page_size: self.config.gallery.page_size,
        };
        server::serve(server::router(state, Some(blob_root)), bind).await?;
        self.store.flush()?;
        Ok("Server stopped.".to_string())
    }

    async fn handle_gallery(
        &self,
        tags: &[String],
        search: Option<&str>,
        pages: usize,
        page_size: Option<usize>,
        format: &str,
    ) -> Result<String, ApiError> {
        let selected = parse_tags(tags)?;
        let controller = FeedController::with_page_size(
            self.store.clone(),
            page_size.unwrap_or(self.config.gallery.page_size),
        );

        let first = if selected.is_empty() {
            controller.mount().await
        } else {
            controller.set_selected_tags(selected).await
        };
        report_failure(&first);
        for _ in 1..pages.max(1) {
            match controller.request_next_page().await {
                LoadOutcome::Applied { .. } => {}
                other => {
                    report_failure(&other);
                    break;
                }
            }
        }

        let view = GalleryView::derive(&controller.snapshot(), search.unwrap_or(""));
        match format {
            "json" => format_gallery_json(&view),
            _ => Ok(format_gallery_text(&view)),
        }
    }

    async fn handle_upload(
        &self,
        path: &Path,
        title: Option<&str>,
        tags: &[String],
    ) -> Result<String, ApiError> {
        let tags = parse_tags(tags)?;
        let blobs = Arc::new(FsBlobStore::new(
            self.config.storage.resolve_blob_path(&self.workspace_root),
            self.config.storage.public_base_url.clone(),
        ));
        let uploader = Uploader::new(blobs, self.store.clone());

        if path.is_dir() {
            if title.is_some() {
                return Err(ApiError::InvalidInput(
                    "--title applies to single files only".to_string(),
                ));
            }
            let report = uploader
                .upload_dir(path, &tags, DEFAULT_UPLOAD_CONCURRENCY)
                .await?;
            Ok(format_upload_report(&report))
        } else {
            let image = uploader.upload_file(path, title, &tags).await?;
            Ok(format_uploaded_image(&image))
        }
    }

    async fn handle_analytics(
        &self,
        limit: Option<usize>,
        visits: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        let limit = limit.unwrap_or(if visits {
            DEFAULT_RECENT_LIMIT
        } else {
            self.config.analytics.report_limit
        });
        let records = self.store.recent_visits(limit).await?;
        match (visits, format) {
            (true, "json") => format_visits_json(&records),
            (true, _) => Ok(format_visits_text(&records)),
            (false, "json") => format_analytics_report_json(&AnalyticsReport::from_records(&records)),
            (false, _) => Ok(format_analytics_report_text(&AnalyticsReport::from_records(
                &records,
            ))),
        }
    }

    async fn handle_login(&self, email: Option<&str>) -> Result<String, ApiError> {
        use dialoguer::{Input, Password};

        let email = match email {
            Some(email) => email.to_string(),
            None => Input::<String>::new()
                .with_prompt("Email")
                .interact_text()
                .map_err(|e| ApiError::InvalidInput(format!("Failed to get user input: {}", e)))?,
        };
        let password = Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(|e| ApiError::InvalidInput(format!("Failed to read password: {}", e)))?;
        let principal = self.auth.sign_in(&email, &password).await?;
        Ok(format!("Signed in as {}", principal.email))
    }

    fn handle_config(&self, format: &str) -> Result<String, ApiError> {
        let mut shown = self.config.clone();
        if shown.admin.password_digest.is_some() {
            shown.admin.password_digest = Some("<redacted>".to_string());
        }
        match format {
            "json" => serde_json::to_string_pretty(&shown)
                .map_err(|e| ApiError::ConfigError(e.to_string())),
            _ => toml::to_string_pretty(&shown).map_err(|e| ApiError::ConfigError(e.to_string())),
        }
    }
}

fn parse_tags(raw: &[String]) -> Result<TagSet, ApiError> {
    raw.iter().map(|t| Tag::from_str(t)).collect()
}

fn report_failure(outcome: &LoadOutcome) {
    if let LoadOutcome::Failed { error } = outcome {
        warn!(error = %error, "Feed stopped early");
    }
}
