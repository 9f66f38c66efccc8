//! User configuration, loaded from `~/.wheelhouse/config.toml`.
//!
//! Every field has a default, so a missing file, a partial file, and no
//! file at all are all valid. An unreadable file is reported and then
//! ignored rather than blocking the command.

use std::path::PathBuf;

use serde::Deserialize;
use wheelhouse_core::index::DEFAULT_INDEX_URL;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Index and transfer settings.
    pub network: NetworkConfig,
    /// Default download target.
    pub download: DownloadConfig,
}

/// `[network]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Index base URL.
    pub index_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum simultaneous downloads.
    pub max_concurrent: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            timeout_secs: 30,
            max_concurrent: wheelhouse_core::fetch::DEFAULT_CONCURRENCY,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Python version wheels must suit.
    pub python_version: String,
    /// Platform tag wheels must suit (`any` for pure-only).
    pub platform: String,
    /// Where wheels land when `--output` is not given.
    pub default_path: Option<PathBuf>,
    /// Whether `fetch` walks the dependency closure by default.
    pub include_dependencies: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            python_version: "3.11".to_string(),
            platform: "any".to_string(),
            default_path: None,
            include_dependencies: true,
        }
    }
}

impl Config {
    /// Path of the config file, `~/.wheelhouse/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".wheelhouse").join("config.toml"))
    }

    /// Load the config, falling back to defaults when the file is
    /// absent or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_round_trips() {
        let cfg = Config::parse(
            r#"
            [network]
            index_url = "https://mirror.example.org"
            timeout_secs = 10
            max_concurrent = 8

            [download]
            python_version = "3.12"
            platform = "manylinux2014_x86_64"
            default_path = "/tmp/wheels"
            include_dependencies = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.network.index_url, "https://mirror.example.org");
        assert_eq!(cfg.network.max_concurrent, 8);
        assert_eq!(cfg.download.python_version, "3.12");
        assert!(!cfg.download.include_dependencies);
        assert_eq!(cfg.download.default_path, Some(PathBuf::from("/tmp/wheels")));
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let cfg = Config::parse("[download]\npython_version = \"3.9\"\n").unwrap();
        assert_eq!(cfg.download.python_version, "3.9");
        assert_eq!(cfg.download.platform, "any");
        assert_eq!(cfg.network.index_url, DEFAULT_INDEX_URL);
        assert_eq!(cfg.network.timeout_secs, 30);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("[network]\nproxy = \"nope\"\n").is_err());
    }

    #[test]
    fn empty_file_is_the_default() {
        let cfg = Config::parse("").unwrap();
        assert!(cfg.download.include_dependencies);
        assert_eq!(cfg.network.max_concurrent, 4);
    }
}
