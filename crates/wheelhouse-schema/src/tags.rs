//! Wheel filename tag parsing and the platform compatibility policy.
//!
//! A wheel filename encodes the environments it supports:
//! `{dist}-{version}(-{build})?-{python}-{abi}-{platform}.whl`, where
//! each of the last three components may be a `.`-joined set
//! (`py2.py3-none-any` expands to two tags).

use serde::{Deserialize, Serialize};

/// One (python, abi, platform) compatibility triple from a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelTag {
    /// Interpreter tag: `cp310`, `py3`, `pp39`, ...
    pub python: String,
    /// ABI tag: `cp310`, `abi3`, `none`, ...
    pub abi: String,
    /// Platform tag: `win_amd64`, `manylinux2014_x86_64`, `any`, ...
    pub platform: String,
}

impl WheelTag {
    /// Whether this tag works on any platform.
    pub fn is_any_platform(&self) -> bool {
        self.platform == "any"
    }
}

impl std::fmt::Display for WheelTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

/// Parse the expanded tag set out of a wheel filename.
///
/// Returns `None` when the filename does not have the wheel shape
/// (missing `.whl` suffix or fewer than five `-` separated fields).
pub fn parse_wheel_tags(filename: &str) -> Option<Vec<WheelTag>> {
    let stem = filename.strip_suffix(".whl")?;
    let parts: Vec<&str> = stem.split('-').collect();
    // dist-version-python-abi-platform, optionally with a build tag
    if parts.len() < 5 {
        return None;
    }
    let platform = parts[parts.len() - 1];
    let abi = parts[parts.len() - 2];
    let python = parts[parts.len() - 3];

    let mut tags = Vec::new();
    for py in python.split('.') {
        for ab in abi.split('.') {
            for plat in platform.split('.') {
                tags.push(WheelTag {
                    python: py.to_string(),
                    abi: ab.to_string(),
                    platform: plat.to_string(),
                });
            }
        }
    }
    Some(tags)
}

/// One platform family: a target tag and the artifact tags it accepts,
/// ordered from most to least preferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformFamily {
    /// Target platform tag this family applies to.
    pub target: String,
    /// Acceptable artifact platform tags, best first.
    pub accepts: Vec<String>,
}

/// The platform-tag compatibility table.
///
/// Matching is data-driven: a target tag accepts exactly itself unless a
/// family row widens it (manylinux legacy aliases, PEP 600
/// `manylinux_X_Y` spellings, plain `linux_*`). New tag families are
/// added by extending the table, not the matching code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPolicy {
    families: Vec<PlatformFamily>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        let linux = |arch: &str| -> PlatformFamily {
            PlatformFamily {
                target: format!("manylinux2014_{arch}"),
                accepts: vec![
                    format!("manylinux2014_{arch}"),
                    format!("manylinux_2_17_{arch}"),
                    format!("manylinux2010_{arch}"),
                    format!("manylinux_2_12_{arch}"),
                    format!("manylinux1_{arch}"),
                    format!("manylinux_2_5_{arch}"),
                    format!("linux_{arch}"),
                ],
            }
        };
        Self {
            families: vec![
                linux("x86_64"),
                linux("aarch64"),
                linux("i686"),
                PlatformFamily {
                    target: "linux_x86_64".to_string(),
                    accepts: vec!["linux_x86_64".to_string()],
                },
                PlatformFamily {
                    target: "win_amd64".to_string(),
                    accepts: vec!["win_amd64".to_string()],
                },
                PlatformFamily {
                    target: "win32".to_string(),
                    accepts: vec!["win32".to_string()],
                },
                PlatformFamily {
                    target: "macosx_11_0_arm64".to_string(),
                    accepts: vec![
                        "macosx_11_0_arm64".to_string(),
                        "macosx_10_9_universal2".to_string(),
                        "macosx_11_0_universal2".to_string(),
                    ],
                },
                PlatformFamily {
                    target: "macosx_10_9_x86_64".to_string(),
                    accepts: vec![
                        "macosx_10_9_x86_64".to_string(),
                        "macosx_10_9_intel".to_string(),
                        "macosx_10_9_universal2".to_string(),
                    ],
                },
            ],
        }
    }
}

impl TagPolicy {
    /// Build a policy from an explicit family table.
    pub fn new(families: Vec<PlatformFamily>) -> Self {
        Self { families }
    }

    /// Rank of `artifact_platform` for `target`: `Some(0)` is the best
    /// match, larger is worse, `None` is incompatible.
    ///
    /// A target without a family row accepts only an exact tag match.
    pub fn rank(&self, target: &str, artifact_platform: &str) -> Option<usize> {
        if let Some(family) = self.families.iter().find(|f| f.target == target) {
            return family
                .accepts
                .iter()
                .position(|t| t == artifact_platform);
        }
        (target == artifact_platform).then_some(0)
    }

    /// Whether `artifact_platform` is acceptable for `target` at all.
    pub fn compatible(&self, target: &str, artifact_platform: &str) -> bool {
        self.rank(target, artifact_platform).is_some()
    }
}

/// Whether an interpreter tag is compatible with the target Python
/// version, given the artifact's ABI tag.
///
/// `digits` is the dotless target version (`310` for Python 3.10).
pub fn python_compatible(python_tag: &str, abi_tag: &str, digits: &str) -> bool {
    let major = digits.chars().next().unwrap_or('3');
    let generic = format!("py{major}");

    if python_tag == generic || python_tag == format!("py{digits}") {
        return true;
    }
    if python_tag == format!("cp{digits}") {
        return true;
    }
    // abi3 wheels built for an older CPython run on newer ones
    if abi_tag == "abi3" {
        if let Some(built) = python_tag.strip_prefix("cp") {
            return tag_digits_le(built, digits);
        }
    }
    false
}

/// Interpreter specificity for ranking: exact `cpXY` beats `pyXY`,
/// which beats `abi3`, which beats generic `py3`.
pub fn python_specificity(python_tag: &str, abi_tag: &str, digits: &str) -> u32 {
    if python_tag == format!("cp{digits}") {
        4
    } else if python_tag == format!("py{digits}") {
        3
    } else if abi_tag == "abi3" {
        2
    } else {
        1
    }
}

/// Compare dotless version digits: is `a` <= `b`?
///
/// Tags encode the minor version without a separator, so `cp39` has
/// digits `39` and Python 3.10 has `310`; compare (major, minor).
fn tag_digits_le(a: &str, b: &str) -> bool {
    let parse = |s: &str| -> Option<(u32, u32)> {
        let mut chars = s.chars();
        let major = chars.next()?.to_digit(10)?;
        let minor: u32 = chars.as_str().parse().ok()?;
        Some((major, minor))
    };
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x <= y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_wheel_filename() {
        let tags = parse_wheel_tags("idna-3.4-py3-none-any.whl").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].python, "py3");
        assert_eq!(tags[0].abi, "none");
        assert!(tags[0].is_any_platform());
    }

    #[test]
    fn expands_compressed_tag_sets() {
        let tags = parse_wheel_tags("chardet-4.0.0-py2.py3-none-any.whl").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].python, "py2");
        assert_eq!(tags[1].python, "py3");
    }

    #[test]
    fn handles_build_tag() {
        let tags = parse_wheel_tags("pkg-1.0-1-cp310-cp310-win_amd64.whl").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].python, "cp310");
        assert_eq!(tags[0].platform, "win_amd64");
    }

    #[test]
    fn rejects_non_wheel_filenames() {
        assert!(parse_wheel_tags("somepkg-2.0.0.tar.gz").is_none());
        assert!(parse_wheel_tags("short-1.0.whl").is_none());
    }

    #[test]
    fn manylinux_family_ranking() {
        let policy = TagPolicy::default();
        let exact = policy.rank("manylinux2014_x86_64", "manylinux2014_x86_64");
        let legacy = policy.rank("manylinux2014_x86_64", "manylinux1_x86_64");
        assert_eq!(exact, Some(0));
        assert!(legacy.unwrap() > 0);
        assert!(!policy.compatible("manylinux2014_x86_64", "win_amd64"));
    }

    #[test]
    fn unknown_target_accepts_only_exact() {
        let policy = TagPolicy::default();
        assert!(policy.compatible("musllinux_1_1_x86_64", "musllinux_1_1_x86_64"));
        assert!(!policy.compatible("musllinux_1_1_x86_64", "linux_x86_64"));
    }

    #[test]
    fn python_tag_compatibility() {
        assert!(python_compatible("py3", "none", "310"));
        assert!(python_compatible("cp310", "cp310", "310"));
        assert!(!python_compatible("cp39", "cp39", "310"));
        assert!(python_compatible("cp38", "abi3", "310"));
        assert!(!python_compatible("cp311", "abi3", "310"));
        assert!(!python_compatible("py2", "none", "310"));
    }

    #[test]
    fn specificity_ordering() {
        let d = "310";
        assert!(python_specificity("cp310", "cp310", d) > python_specificity("py310", "none", d));
        assert!(python_specificity("py310", "none", d) > python_specificity("cp38", "abi3", d));
        assert!(python_specificity("cp38", "abi3", d) > python_specificity("py3", "none", d));
    }
}
