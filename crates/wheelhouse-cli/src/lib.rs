//! wheelhouse - fetch Python wheels for offline installation
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Resolves a package (and, by default, its transitive dependencies)
//! against a PyPI-compatible index for a chosen (python, platform)
//! target, picks the best wheel per package, and downloads the lot
//! into a directory suitable for `pip install --no-index`.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.wheelhouse/
//! └── config.toml   # Optional user configuration
//! ```

pub mod cmd;
pub mod config;
pub mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wheelhouse_schema::PackageRequest;

/// Parse a package spec of the form `name` or `name==version`.
///
/// # Example
///
/// ```
/// use wheelhouse_cli::parse_package_spec;
/// use wheelhouse_schema::VersionSpec;
///
/// assert_eq!(parse_package_spec("requests").spec, VersionSpec::Latest);
/// assert!(matches!(parse_package_spec("requests==2.31.0").spec, VersionSpec::Exact(_)));
/// ```
pub fn parse_package_spec(spec: &str) -> PackageRequest {
    match spec.split_once("==") {
        Some((name, version)) if !version.trim().is_empty() => {
            PackageRequest::exact(name.trim(), version.trim())
        }
        _ => PackageRequest::latest(spec.trim()),
    }
}

#[derive(Debug, Parser)]
#[command(name = "wheelhouse")]
#[command(author, version, about = "wheelhouse - fetch Python wheels for offline installation")]
pub struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download a package and its dependencies as wheels
    Fetch {
        /// Package spec: name or name==version
        package: String,
        /// Target Python version, e.g. 3.11
        #[arg(long)]
        python: Option<String>,
        /// Target platform tag, e.g. win_amd64 or manylinux2014_x86_64 (or `any`)
        #[arg(long)]
        platform: Option<String>,
        /// Directory to place wheels in
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum simultaneous downloads
        #[arg(long)]
        concurrency: Option<usize>,
        /// Download only the named package, not its dependencies
        #[arg(long)]
        no_deps: bool,
        /// Index base URL
        #[arg(long, env = "WHEELHOUSE_INDEX_URL")]
        index_url: Option<String>,
    },
    /// Show published versions and wheels for a package
    Info {
        /// Package name
        package: String,
        /// Index base URL
        #[arg(long, env = "WHEELHOUSE_INDEX_URL")]
        index_url: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
