//! Folio: Photography Portfolio Backend
//!
//! A tag-filtered, incrementally loaded image gallery with an admin surface for
//! uploads and visit analytics. Persistence, identity, and blob storage sit behind
//! traits so hosted backends and the bundled local implementations are
//! interchangeable.

pub mod analytics;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod server;
pub mod store;
pub mod types;
pub mod upload;
