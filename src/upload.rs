//! Upload flow: store the blob, then append the image document.
//!
//! Failures are not handled here; they propagate to the caller.

use crate::error::{ApiError, StorageError};
use crate::store::ImageWriter;
use crate::types::{Image, ImageId, TagSet};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions picked up by directory uploads
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif", "heic", "tif", "tiff"];

/// Files uploaded concurrently by [`Uploader::upload_dir`]
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Object storage: keep a blob under a key and hand back its public URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError>;
}

/// Blobs as files under `root`; URLs are `public_base_url/key`.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: dunce::simplified(&root).to_path_buf(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the root. Keys may only contain normal
    /// path segments.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        debug!(key = %key, size, path = %path.display(), "Stored blob");
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// Source of image ids
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Outcome of a directory upload
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<Image>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct Uploader {
    blobs: Arc<dyn BlobStore>,
    images: Arc<dyn ImageWriter>,
    clock: Arc<dyn Clock>,
    last_id: AtomicU64,
}

impl Uploader {
    pub fn new(blobs: Arc<dyn BlobStore>, images: Arc<dyn ImageWriter>) -> Self {
        Self::with_clock(blobs, images, Arc::new(SystemClock))
    }

    pub fn with_clock(
        blobs: Arc<dyn BlobStore>,
        images: Arc<dyn ImageWriter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            blobs,
            images,
            clock,
            last_id: AtomicU64::new(0),
        }
    }

    /// Creation time in millis, bumped past the previous id when two uploads
    /// land in the same millisecond.
    fn next_id(&self) -> ImageId {
        let now = self.clock.now_millis();
        let mut last = self.last_id.load(Ordering::SeqCst);
        loop {
            let id = now.max(last + 1);
            match self
                .last_id
                .compare_exchange(last, id, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return id,
                Err(current) => last = current,
            }
        }
    }

    /// Store `bytes` as `images/{id}-{file_name}` and append the image record.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        title: &str,
        tags: &TagSet,
    ) -> Result<Image, ApiError> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(ApiError::InvalidInput(format!(
                "invalid file name: {:?}",
                file_name
            )));
        }

        let id = self.next_id();
        let key = format!("images/{}-{}", id, file_name);
        let url = self.blobs.put(&key, bytes).await?;
        let image = Image {
            id,
            title: title.to_string(),
            url,
            tags: tags.iter().copied().collect(),
        };
        self.images.append_image(&image).await?;
        info!(image_id = id, key = %key, tags = image.tags.len(), "Uploaded image");
        Ok(image)
    }

    /// Read a file from disk and upload it; the title defaults to the file stem.
    pub async fn upload_file(
        &self,
        path: &Path,
        title: Option<&str>,
        tags: &TagSet,
    ) -> Result<Image, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidInput(format!("not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::UploadFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        let stem = title_from_path(path);
        self.upload(file_name, bytes, title.unwrap_or(&stem), tags)
            .await
    }

    /// Upload every image file under `dir`, titled by file stem, all with `tags`.
    ///
    /// Individual failures are collected; the walk continues.
    pub async fn upload_dir(
        &self,
        dir: &Path,
        tags: &TagSet,
        concurrency: usize,
    ) -> Result<UploadReport, ApiError> {
        if !dir.is_dir() {
            return Err(ApiError::InvalidInput(format!(
                "not a directory: {}",
                dir.display()
            )));
        }
        let files = image_files(dir);
        info!(dir = %dir.display(), files = files.len(), "Uploading directory");

        let results: Vec<(PathBuf, Result<Image, ApiError>)> = stream::iter(files)
            .map(|path| async move {
                let result = self.upload_file(&path, None, tags).await;
                (path, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = UploadReport::default();
        for (path, result) in results {
            match result {
                Ok(image) => report.uploaded.push(image),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Upload failed");
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        report.uploaded.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(report)
    }
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.replace(['_', '-'], " "))
        .unwrap_or_default()
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files under `dir`, sorted by path. Hidden entries are skipped.
pub fn image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false)
        })
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
        .map(|e| dunce::simplified(e.path()).to_path_buf())
        .collect();
    files.sort();
    files
}
