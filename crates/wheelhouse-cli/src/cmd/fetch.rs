//! Fetch command

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio_stream::StreamExt;
use wheelhouse_core::{FetchRequest, PypiClient, Session};
use wheelhouse_schema::RuntimeTarget;

use crate::config::Config;
use crate::ui::{EventRenderer, Output};

/// Command-line overrides for one fetch; anything left `None` falls
/// back to the config file, then to built-in defaults.
#[derive(Debug, Default)]
pub struct FetchParams {
    pub python: Option<String>,
    pub platform: Option<String>,
    pub output: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub no_deps: bool,
    pub index_url: Option<String>,
}

/// Resolve `spec` and download the selected wheels.
pub async fn fetch(spec: &str, params: FetchParams, quiet: bool) -> Result<()> {
    let config = Config::load();
    let output = Output::new(quiet);

    let package = crate::parse_package_spec(spec);
    if package.name.is_empty() {
        bail!("Empty package name");
    }

    let target = RuntimeTarget::new(
        params.python.as_deref().unwrap_or(&config.download.python_version),
        params.platform.as_deref().unwrap_or(&config.download.platform),
    );
    let output_dir = params
        .output
        .or(config.download.default_path)
        .unwrap_or_else(|| PathBuf::from("wheels"));
    let index_url = params
        .index_url
        .unwrap_or_else(|| config.network.index_url.clone());

    let timeout = Duration::from_secs(config.network.timeout_secs);
    let index_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    // A large wheel legitimately takes longer than any whole-request
    // budget, so the download client bounds the connection and per-read
    // stall instead of the full transfer.
    let download_client = reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let session = Arc::new(Session::new(
        PypiClient::new(index_client, index_url),
        download_client,
    ));

    output.info(&format!("Target: {target} -> {}", output_dir.display()));

    let mut request = FetchRequest::new(package, target, output_dir);
    request.concurrency = params.concurrency.unwrap_or(config.network.max_concurrent);
    request.follow_dependencies = !params.no_deps && config.download.include_dependencies;
    let (run_id, mut stream) = session.submit(request);

    // Ctrl-C cancels the run; the stream then drains to its summary.
    {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.cancel(run_id);
            }
        });
    }

    let mut renderer = EventRenderer::new(output);
    while let Some(event) = stream.next().await {
        renderer.handle(&event);
    }

    match renderer.summary {
        Some((_, failed, _)) if failed > 0 => bail!("{failed} download(s) failed"),
        Some((0, 0, canceled)) if canceled > 0 => bail!("Fetch canceled"),
        Some((succeeded, ..)) if succeeded == 0 && renderer.unresolved > 0 => {
            bail!("Nothing could be resolved for this target")
        }
        Some(_) => Ok(()),
        None => bail!("Run ended without a summary"),
    }
}
