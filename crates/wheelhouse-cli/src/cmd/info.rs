//! Info command

use std::time::Duration;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use wheelhouse_core::{IndexError, MetadataSource, PypiClient};
use wheelhouse_schema::PackageName;

use crate::config::Config;
use crate::ui::format_size;

/// How many recent versions the listing shows.
const SHOWN_VERSIONS: usize = 8;

/// Show published versions and latest-version wheels for a package.
pub async fn info(package_str: &str, index_url: Option<String>) -> Result<()> {
    let config = Config::load();
    let package = PackageName::new(package_str);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.network.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let index = PypiClient::new(
        client,
        index_url.unwrap_or_else(|| config.network.index_url.clone()),
    );

    let versions = match index.list_versions(&package).await {
        Ok(versions) => versions,
        Err(IndexError::NotFound(_)) => bail!("Package '{package}' not found"),
        Err(e) => return Err(e).context("Failed to query index"),
    };
    let Some(latest) = versions.first().cloned() else {
        bail!("Package '{package}' has no published versions");
    };
    let meta = index
        .version_metadata(&package, &latest)
        .await
        .context("Failed to fetch version metadata")?;

    let lw = 12;

    println!();
    println!(
        "  {} {}",
        package.as_str().white().bold(),
        latest.as_str().dark_grey()
    );
    println!();

    let shown: Vec<&str> = versions
        .iter()
        .take(SHOWN_VERSIONS)
        .map(wheelhouse_schema::Version::as_str)
        .collect();
    let suffix = if versions.len() > SHOWN_VERSIONS {
        format!(", ... ({} total)", versions.len())
    } else {
        String::new()
    };
    println!("  {:<lw$}{}{suffix}", "versions", shown.join(", "));

    if !meta.requires.is_empty() {
        let deps: Vec<&str> = meta.requires.iter().map(|r| r.name.as_str()).collect();
        println!("  {:<lw$}{}", "requires", deps.join(", "));
    }

    if meta.artifacts.is_empty() {
        println!("  {:<lw$}{}", "wheels", "none (source-only release)".dark_grey());
    } else {
        println!("  wheels");
        for artifact in &meta.artifacts {
            println!(
                "    {} {}",
                artifact.filename,
                format_size(artifact.size_bytes).dark_grey()
            );
        }
    }

    Ok(())
}
