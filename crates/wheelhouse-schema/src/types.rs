//! Core newtypes: package names, versions, requests, and the runtime target.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A normalized package name.
///
/// Normalization follows PEP 503: lowercase, with any run of `-`, `_`,
/// or `.` collapsed to a single `-`. `Pillow`, `pillow` and
/// `charset_normalizer` / `charset-normalizer` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, normalizing the input.
    pub fn new(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut last_sep = false;
        for c in name.trim().chars() {
            if c == '-' || c == '_' || c == '.' {
                if !last_sep && !out.is_empty() {
                    out.push('-');
                }
                last_sep = true;
            } else {
                out.extend(c.to_lowercase());
                last_sep = false;
            }
        }
        // Trailing separator runs normalize away entirely
        if out.ends_with('-') {
            out.pop();
        }
        Self(out)
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        *self == Self::new(other)
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        *self == Self::new(other)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// A published version string, kept verbatim.
///
/// Ordering tries semver first; for the many PyPI versions that are not
/// valid semver (`1.26`, `2017.4.17`, `2.0.0rc1`) it falls back to a
/// numeric dotted-segment comparison where a segment with a trailing
/// suffix (`0rc1`) sorts before the bare segment (`0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Version {
    /// Create a new version from the given string (stored as-is).
    pub fn new(v: &str) -> Self {
        Self(v.trim().to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (
            semver::Version::parse(&self.0),
            semver::Version::parse(&other.0),
        ) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => compare_segments(&self.0, &other.0),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Segment-wise version comparison for non-semver version strings.
fn compare_segments(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let split = |s: &str| -> Vec<(u64, String)> {
        s.split('.')
            .map(|seg| {
                let digits: String = seg.chars().take_while(char::is_ascii_digit).collect();
                let rest = seg[digits.len()..].to_string();
                (digits.parse().unwrap_or(0), rest)
            })
            .collect()
    };

    let (sa, sb) = (split(a), split(b));
    let len = sa.len().max(sb.len());
    let blank = (0u64, String::new());

    for i in 0..len {
        let (na, ra) = sa.get(i).unwrap_or(&blank);
        let (nb, rb) = sb.get(i).unwrap_or(&blank);
        match na.cmp(nb) {
            Ordering::Equal => {}
            ord => return ord,
        }
        // `2.0.0` is newer than `2.0.0rc1`: an empty suffix wins
        match (ra.is_empty(), rb.is_empty()) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => match ra.cmp(rb) {
                Ordering::Equal => {}
                ord => return ord,
            },
        }
    }
    Ordering::Equal
}

/// Which version of a package a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSpec {
    /// No pin: the newest version with a compatible artifact.
    #[default]
    Latest,
    /// An exact pin (`name==1.2.3`).
    Exact(Version),
}

impl VersionSpec {
    /// Whether `version` satisfies this spec.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Latest => true,
            Self::Exact(v) => v == version,
        }
    }
}

/// A request for one package, as entered by the user or declared by a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    /// Normalized package name.
    pub name: PackageName,
    /// Requested version, or latest-compatible.
    pub spec: VersionSpec,
}

impl PackageRequest {
    /// Build a request for the latest compatible version.
    pub fn latest(name: impl Into<PackageName>) -> Self {
        Self {
            name: name.into(),
            spec: VersionSpec::Latest,
        }
    }

    /// Build a request pinned to an exact version.
    pub fn exact(name: impl Into<PackageName>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            spec: VersionSpec::Exact(version.into()),
        }
    }
}

/// The platform half of a runtime target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformTag {
    /// Wildcard: accept any platform (pure wheels only match this way).
    Any,
    /// A concrete tag such as `win_amd64` or `manylinux2014_x86_64`.
    Named(String),
}

impl PlatformTag {
    /// Parse a user-supplied platform string; `any` and `*` mean wildcard.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "any" | "*" | "" => Self::Any,
            other => Self::Named(other.to_string()),
        }
    }

    /// The concrete tag name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Named(n) => Some(n),
        }
    }
}

impl std::fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Named(n) => write!(f, "{n}"),
        }
    }
}

/// The (python version, platform) pair a whole resolve run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    /// Target interpreter version, e.g. `3.10`.
    pub python_version: String,
    /// Target platform tag.
    pub platform: PlatformTag,
}

impl RuntimeTarget {
    /// Build a target from user-supplied strings.
    pub fn new(python_version: &str, platform: &str) -> Self {
        Self {
            python_version: python_version.trim().to_string(),
            platform: PlatformTag::parse(platform),
        }
    }

    /// The interpreter version with the dot removed (`3.10` -> `310`),
    /// as it appears inside wheel tags.
    pub fn python_tag_digits(&self) -> String {
        self.python_version.replace('.', "")
    }

    /// Environment used to evaluate dependency markers for this target.
    ///
    /// `extra` is deliberately absent so optional dependency groups are
    /// never pulled in.
    pub fn marker_environment(&self) -> Vec<(&'static str, String)> {
        let (sys_platform, os_name) = match self.platform.name() {
            Some(p) if p.starts_with("win") => ("win32", "nt"),
            Some(p) if p.starts_with("macosx") => ("darwin", "posix"),
            _ => ("linux", "posix"),
        };
        vec![
            ("python_version", self.python_version.clone()),
            ("python_full_version", self.python_version.clone()),
            ("sys_platform", sys_platform.to_string()),
            ("os_name", os_name.to_string()),
            ("platform_system", platform_system(sys_platform).to_string()),
        ]
    }
}

impl std::fmt::Display for RuntimeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "python {} on {}", self.python_version, self.platform)
    }
}

fn platform_system(sys_platform: &str) -> &'static str {
    match sys_platform {
        "win32" => "Windows",
        "darwin" => "Darwin",
        _ => "Linux",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_normalization_collapses_separators() {
        assert_eq!(PackageName::new("Charset_Normalizer").as_str(), "charset-normalizer");
        assert_eq!(PackageName::new("zope.interface").as_str(), "zope-interface");
        assert_eq!(PackageName::new("a--b__c").as_str(), "a-b-c");
        assert_eq!(PackageName::new("Pillow"), PackageName::new("pillow"));
    }

    #[test]
    fn version_ordering_semver_and_fallback() {
        assert!(Version::new("2.31.0") > Version::new("2.4.1"));
        assert!(Version::new("1.26.18") > Version::new("1.26.2"));
        assert!(Version::new("2017.4.17") < Version::new("2023.7.22"));
        assert!(Version::new("2.0.0") > Version::new("2.0.0rc1"));
        assert!(Version::new("1.2") < Version::new("1.2.1"));
        assert_eq!(
            Version::new("1.2").cmp(&Version::new("1.2.0")),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn version_spec_matching() {
        let spec = VersionSpec::Exact(Version::new("2.0.0"));
        assert!(spec.matches(&Version::new("2.0.0")));
        assert!(!spec.matches(&Version::new("2.0.1")));
        assert!(VersionSpec::Latest.matches(&Version::new("0.0.1")));
    }

    #[test]
    fn marker_environment_for_windows_target() {
        let target = RuntimeTarget::new("3.10", "win_amd64");
        let env = target.marker_environment();
        let get = |k: &str| env.iter().find(|(n, _)| *n == k).map(|(_, v)| v.as_str());
        assert_eq!(get("sys_platform"), Some("win32"));
        assert_eq!(get("os_name"), Some("nt"));
        assert_eq!(get("python_version"), Some("3.10"));
    }

    #[test]
    fn platform_tag_wildcards() {
        assert_eq!(PlatformTag::parse("any"), PlatformTag::Any);
        assert_eq!(PlatformTag::parse("*"), PlatformTag::Any);
        assert_eq!(
            PlatformTag::parse("win_amd64").name(),
            Some("win_amd64")
        );
    }
}
