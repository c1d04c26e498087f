//! Shared test utilities for integration tests
//!
//! Seeded stores, image fixtures, and isolation of the XDG/`FOLIO_*`
//! environment for configuration tests.

#![allow(dead_code)]

use folio::store::{MemoryDocumentStore, SledDocumentStore};
use folio::types::{Image, ImageId, Tag};
use std::sync::Mutex;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub fn image(id: ImageId, tags: Vec<Tag>) -> Image {
    Image {
        id,
        title: format!("Frame {}", id),
        url: format!("https://cdn.example/images/{}.jpg", id),
        tags,
    }
}

/// Images `1..=count`, tagged by `tags_for(id)`.
pub fn images(count: u64, tags_for: impl Fn(ImageId) -> Vec<Tag>) -> Vec<Image> {
    (1..=count).map(|id| image(id, tags_for(id))).collect()
}

pub fn memory_store(images: Vec<Image>) -> MemoryDocumentStore {
    MemoryDocumentStore::with_images(images).unwrap()
}

/// Sled store in a fresh temp directory. Keep the `TempDir` alive for the test.
pub fn sled_store(images: Vec<Image>) -> (TempDir, SledDocumentStore) {
    let dir = TempDir::new().unwrap();
    let store = SledDocumentStore::new(dir.path().join("store")).unwrap();
    for image in images {
        store
            .put_document(&folio::types::ImageDocument::from(&image))
            .unwrap();
    }
    (dir, store)
}

pub fn ids(images: &[Image]) -> Vec<ImageId> {
    images.iter().map(|i| i.id).collect()
}

const ISOLATED_VARS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "FOLIO_ENV",
    "FOLIO_GALLERY__PAGE_SIZE",
    "FOLIO_SERVER__BIND",
];

/// Environment variable state to restore after test
struct EnvState(Vec<(&'static str, Option<String>)>);

impl EnvState {
    fn capture() -> Self {
        Self(
            ISOLATED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        )
    }

    fn restore(self) {
        for (name, value) in self.0 {
            match value {
                Some(v) => std::env::set_var(name, v),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir` and the
/// `FOLIO_*` overrides cleared; the original environment is restored after.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    let test_config_home = test_dir.path().join("xdg");
    std::fs::create_dir_all(&test_home).unwrap();
    std::fs::create_dir_all(&test_config_home).unwrap();

    for name in ISOLATED_VARS {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);

    let result = f();

    env_state.restore();
    result
}
