//! Downloadable wheel artifacts as published by the index.

use crate::tags::{WheelTag, parse_wheel_tags};
use serde::{Deserialize, Serialize};

/// A single downloadable wheel for one (package, version).
///
/// Built from one file entry of the index metadata document; immutable
/// after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Published filename, preserved verbatim (install tooling matches on it).
    pub filename: String,

    /// Download URL.
    pub url: String,

    /// Expected size in bytes (0 when the index omits it).
    pub size_bytes: u64,

    /// SHA-256 content hash, lowercase hex.
    pub sha256: String,

    /// Compatibility tags expanded from the filename.
    pub tags: Vec<WheelTag>,
}

/// Errors that can occur when validating an [`ArtifactDescriptor`].
#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    /// The filename does not parse as a wheel.
    #[error("Not a wheel filename: {0}")]
    NotAWheel(String),

    /// A required field (filename or URL) is empty.
    #[error("Empty field: {0}")]
    EmptyField(String),

    /// The download URL is malformed or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The SHA-256 hash string is not exactly 64 characters long.
    #[error("Invalid SHA256 length: expected 64 chars, got {0}")]
    InvalidSha256Length(usize),
}

impl ArtifactDescriptor {
    /// Build a descriptor from an index file entry, parsing the tags
    /// out of the filename.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::NotAWheel`] when the filename does not
    /// have the wheel shape.
    pub fn from_file_entry(
        filename: &str,
        url: &str,
        size_bytes: u64,
        sha256: &str,
    ) -> Result<Self, ArtifactError> {
        let tags = parse_wheel_tags(filename)
            .ok_or_else(|| ArtifactError::NotAWheel(filename.to_string()))?;
        Ok(Self {
            filename: filename.to_string(),
            url: url.to_string(),
            size_bytes,
            sha256: sha256.to_lowercase(),
            tags,
        })
    }

    /// Whether this wheel is pure: compatible with any platform.
    pub fn is_pure_runtime(&self) -> bool {
        self.tags.iter().any(WheelTag::is_any_platform)
    }

    /// Validates the descriptor's integrity by checking all required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::EmptyField`] if `filename` or `url` is empty,
    /// [`ArtifactError::InvalidUrl`] if the URL does not start with `http`,
    /// or [`ArtifactError::InvalidSha256Length`] if a hash is present but
    /// not 64 characters.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.filename.is_empty() {
            return Err(ArtifactError::EmptyField("filename".to_string()));
        }
        if self.url.is_empty() {
            return Err(ArtifactError::EmptyField("url".to_string()));
        }
        if !self.url.starts_with("http") {
            return Err(ArtifactError::InvalidUrl(
                "Must start with http(s)".to_string(),
            ));
        }
        if !self.sha256.is_empty() && self.sha256.len() != 64 {
            return Err(ArtifactError::InvalidSha256Length(self.sha256.len()));
        }
        Ok(())
    }
}
