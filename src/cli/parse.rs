//! CLI parse: clap types for Folio. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Folio CLI - photography portfolio backend
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Tag-filtered photo gallery with uploads and visit analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, default_value = "false", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (analytics endpoint, feed pages, blobs)
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Show the gallery feed
    Gallery {
        /// Only images with any of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Title search over the loaded images
        #[arg(long)]
        search: Option<String>,
        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: usize,
        /// Images per page (overrides gallery.page_size)
        #[arg(long)]
        page_size: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the tag vocabulary
    Tags {
        /// Tags to mark as selected (repeatable)
        #[arg(long = "tag")]
        selected: Vec<String>,
    },
    /// Upload an image file, or every image under a directory (admin)
    Upload {
        /// Image file or directory
        path: PathBuf,
        /// Title (single file only; defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Tags to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Visit analytics report (admin)
    Analytics {
        /// Number of recent visits to scan (overrides analytics.report_limit)
        #[arg(long)]
        limit: Option<usize>,
        /// List the individual visits instead of the summary
        #[arg(long)]
        visits: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Sign in as the admin account
    Login {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the current session
    Whoami,
    /// Print the digest to put in admin.password_digest
    HashPassword,
    /// Show the effective configuration
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}
