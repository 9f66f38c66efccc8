//! Metadata client: the package index I/O boundary.
//!
//! [`MetadataSource`] is the seam the resolver works against; the only
//! production implementation is [`PypiClient`], which speaks the
//! PyPI-shaped JSON API (`{base}/pypi/{name}/json` and
//! `{base}/pypi/{name}/{version}/json`). No state is retained between
//! calls.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use wheelhouse_schema::{ArtifactDescriptor, PackageName, Requirement, Version};

/// Default index base URL.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

/// Errors from the metadata client.
///
/// `NotFound` and `Malformed` are permanent for the package/version in
/// question; `Transient` may be retried by the caller.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The package or version does not exist upstream.
    #[error("Not found upstream: {0}")]
    NotFound(String),

    /// The index was unreachable, timed out, or returned a server error.
    #[error("Index unreachable: {0}")]
    Transient(String),

    /// The response could not be parsed into the expected shape.
    #[error("Malformed metadata: {0}")]
    Malformed(String),
}

impl IndexError {
    /// Whether the caller may retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Everything the index publishes for one (package, version).
#[derive(Debug, Clone)]
pub struct VersionMetadata {
    /// Wheel artifacts published for this version (sdists excluded).
    pub artifacts: Vec<ArtifactDescriptor>,
    /// Declared runtime dependencies.
    pub requires: Vec<Requirement>,
}

/// Read-only view of a package index.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Published versions of a package, newest first.
    ///
    /// # Errors
    ///
    /// [`IndexError::NotFound`] when the package does not exist,
    /// [`IndexError::Transient`] on network trouble,
    /// [`IndexError::Malformed`] on an undecodable response.
    async fn list_versions(&self, name: &PackageName) -> Result<Vec<Version>, IndexError>;

    /// Artifacts and dependency declarations for one version.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`MetadataSource::list_versions`].
    async fn version_metadata(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> Result<VersionMetadata, IndexError>;
}

/// HTTP client for a PyPI-shaped JSON index.
#[derive(Debug, Clone)]
pub struct PypiClient {
    client: reqwest::Client,
    base_url: String,
}

/// Wire shape of one file entry in a release list.
#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    url: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    digests: HashMap<String, String>,
    #[serde(default)]
    packagetype: String,
    #[serde(default)]
    yanked: bool,
}

/// Wire shape of the project document (`/pypi/{name}/json`).
#[derive(Debug, Deserialize)]
struct ProjectDocument {
    #[serde(default)]
    releases: HashMap<String, Vec<FileEntry>>,
}

/// Wire shape of the version document (`/pypi/{name}/{version}/json`).
#[derive(Debug, Deserialize)]
struct VersionDocument {
    info: VersionInfo,
    #[serde(default)]
    urls: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

impl PypiClient {
    /// Create a client against the given index base URL.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, IndexError> {
        tracing::debug!(url, "fetching index metadata");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound(url.to_string()));
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(IndexError::Transient(format!("{url}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(IndexError::Malformed(format!(
                "{url}: unexpected HTTP {status}"
            )));
        }

        let body = response.bytes().await.map_err(map_request_error)?;
        serde_json::from_slice(&body).map_err(|e| IndexError::Malformed(e.to_string()))
    }
}

fn map_request_error(err: reqwest::Error) -> IndexError {
    if err.is_decode() || err.is_body() {
        IndexError::Malformed(err.to_string())
    } else {
        IndexError::Transient(err.to_string())
    }
}

/// Turn index file entries into artifact descriptors, keeping only
/// non-yanked wheels. Entries that fail to parse are skipped with a
/// warning rather than failing the whole version.
fn collect_artifacts(files: &[FileEntry]) -> Vec<ArtifactDescriptor> {
    files
        .iter()
        .filter(|f| !f.yanked)
        .filter(|f| f.packagetype.is_empty() || f.packagetype == "bdist_wheel")
        .filter(|f| f.filename.ends_with(".whl"))
        .filter_map(|f| {
            let sha256 = f.digests.get("sha256").map_or("", String::as_str);
            match ArtifactDescriptor::from_file_entry(&f.filename, &f.url, f.size, sha256) {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    tracing::warn!(filename = %f.filename, error = %e, "skipping artifact");
                    None
                }
            }
        })
        .collect()
}

fn collect_requirements(requires_dist: Option<&Vec<String>>) -> Vec<Requirement> {
    requires_dist
        .into_iter()
        .flatten()
        .filter_map(|raw| match Requirement::parse(raw) {
            Ok(req) => Some(req),
            Err(e) => {
                tracing::warn!(requirement = raw, error = %e, "skipping unparseable dependency");
                None
            }
        })
        .collect()
}

#[async_trait]
impl MetadataSource for PypiClient {
    async fn list_versions(&self, name: &PackageName) -> Result<Vec<Version>, IndexError> {
        let url = format!("{}/pypi/{}/json", self.base_url, name);
        let doc: ProjectDocument = self.get_json(&url).await?;

        // Versions whose every file is yanked are not offered.
        let mut versions: Vec<Version> = doc
            .releases
            .iter()
            .filter(|(_, files)| files.is_empty() || files.iter().any(|f| !f.yanked))
            .map(|(v, _)| Version::new(v))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    async fn version_metadata(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> Result<VersionMetadata, IndexError> {
        let url = format!("{}/pypi/{}/{}/json", self.base_url, name, version);
        let doc: VersionDocument = self.get_json(&url).await?;

        Ok(VersionMetadata {
            artifacts: collect_artifacts(&doc.urls),
            requires: collect_requirements(doc.info.requires_dist.as_ref()),
        })
    }
}
