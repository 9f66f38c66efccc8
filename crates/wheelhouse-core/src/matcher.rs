//! Best-wheel selection under platform and interpreter constraints.
//!
//! Pure functions, no I/O. Returning `None` is a normal outcome (the
//! package ships no wheel for this target), not a fault.

use wheelhouse_schema::{ArtifactDescriptor, PlatformTag, RuntimeTarget, TagPolicy, tags};

/// Platform rank assigned to pure wheels when the target names a
/// concrete platform: any family match beats pure.
const PURE_RANK: usize = 100;

/// Select the single best artifact for the target, or `None`.
///
/// Candidates must carry a tag whose platform is acceptable for the
/// target (exact, a [`TagPolicy`] family member, or `any`) and whose
/// interpreter tag is compatible with the target Python version.
/// Survivors are ranked by platform specificity, then interpreter
/// specificity, then smallest size, then filename, so the choice is
/// deterministic and reproducible.
pub fn select_best<'a>(
    artifacts: &'a [ArtifactDescriptor],
    target: &RuntimeTarget,
    policy: &TagPolicy,
) -> Option<&'a ArtifactDescriptor> {
    let digits = target.python_tag_digits();

    artifacts
        .iter()
        .filter_map(|artifact| {
            score(artifact, target, policy, &digits)
                .map(|(platform_rank, python_spec)| {
                    (
                        platform_rank,
                        std::cmp::Reverse(python_spec),
                        artifact.size_bytes,
                        artifact.filename.as_str(),
                        artifact,
                    )
                })
        })
        .min_by(|a, b| (a.0, a.1, a.2, a.3).cmp(&(b.0, b.1, b.2, b.3)))
        .map(|(_, _, _, _, artifact)| artifact)
}

/// Best (platform rank, interpreter specificity) over an artifact's
/// tags, or `None` when no tag is compatible. Lower platform rank is
/// better; higher interpreter specificity is better.
fn score(
    artifact: &ArtifactDescriptor,
    target: &RuntimeTarget,
    policy: &TagPolicy,
    digits: &str,
) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;

    for tag in &artifact.tags {
        let platform_rank = match &target.platform {
            // Wildcard target: everything is acceptable, pure first.
            PlatformTag::Any => usize::from(!tag.is_any_platform()),
            PlatformTag::Named(name) => {
                if tag.is_any_platform() {
                    PURE_RANK
                } else {
                    match policy.rank(name, &tag.platform) {
                        Some(rank) => rank,
                        None => continue,
                    }
                }
            }
        };

        if !tags::python_compatible(&tag.python, &tag.abi, digits) {
            continue;
        }
        let python_spec = tags::python_specificity(&tag.python, &tag.abi, digits);

        let candidate = (platform_rank, python_spec);
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if (candidate.0, std::cmp::Reverse(candidate.1))
                    < (current.0, std::cmp::Reverse(current.1))
                {
                    candidate
                } else {
                    current
                }
            }
        });
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel(filename: &str, size: u64) -> ArtifactDescriptor {
        ArtifactDescriptor::from_file_entry(
            filename,
            "https://files.example.org/w.whl",
            size,
            &"cd".repeat(32),
        )
        .unwrap()
    }

    fn win310() -> RuntimeTarget {
        RuntimeTarget::new("3.10", "win_amd64")
    }

    #[test]
    fn prefers_exact_platform_over_pure() {
        let artifacts = vec![
            wheel("pkg-1.0-py3-none-any.whl", 10),
            wheel("pkg-1.0-cp310-cp310-win_amd64.whl", 9000),
        ];
        let best = select_best(&artifacts, &win310(), &TagPolicy::default()).unwrap();
        assert_eq!(best.filename, "pkg-1.0-cp310-cp310-win_amd64.whl");
    }

    #[test]
    fn falls_back_to_pure_wheel() {
        let artifacts = vec![
            wheel("pkg-1.0-py3-none-any.whl", 10),
            wheel("pkg-1.0-cp310-cp310-manylinux2014_x86_64.whl", 20),
        ];
        let best = select_best(&artifacts, &win310(), &TagPolicy::default()).unwrap();
        assert_eq!(best.filename, "pkg-1.0-py3-none-any.whl");
    }

    #[test]
    fn rejects_incompatible_python() {
        let artifacts = vec![
            wheel("pkg-1.0-cp39-cp39-win_amd64.whl", 10),
            wheel("pkg-1.0-cp311-cp311-win_amd64.whl", 10),
        ];
        assert!(select_best(&artifacts, &win310(), &TagPolicy::default()).is_none());
    }

    #[test]
    fn abi3_wheel_from_older_cpython_is_acceptable() {
        let artifacts = vec![wheel("pkg-1.0-cp38-abi3-win_amd64.whl", 10)];
        let best = select_best(&artifacts, &win310(), &TagPolicy::default()).unwrap();
        assert_eq!(best.filename, "pkg-1.0-cp38-abi3-win_amd64.whl");
    }

    #[test]
    fn manylinux_family_prefers_newer_convention() {
        let target = RuntimeTarget::new("3.10", "manylinux2014_x86_64");
        let artifacts = vec![
            wheel("pkg-1.0-cp310-cp310-manylinux1_x86_64.whl", 10),
            wheel("pkg-1.0-cp310-cp310-manylinux2014_x86_64.whl", 9000),
        ];
        let best = select_best(&artifacts, &target, &TagPolicy::default()).unwrap();
        assert_eq!(best.filename, "pkg-1.0-cp310-cp310-manylinux2014_x86_64.whl");
    }

    #[test]
    fn size_breaks_remaining_ties() {
        let artifacts = vec![
            wheel("pkgb-1.0-py3-none-any.whl", 200),
            wheel("pkga-1.0-py3-none-any.whl", 100),
        ];
        let best = select_best(&artifacts, &win310(), &TagPolicy::default()).unwrap();
        assert_eq!(best.filename, "pkga-1.0-py3-none-any.whl");
    }

    #[test]
    fn selection_is_deterministic() {
        let artifacts = vec![
            wheel("pkg-1.0-cp310-cp310-win_amd64.whl", 50),
            wheel("pkg-1.0-py310-none-win_amd64.whl", 50),
            wheel("pkg-1.0-py3-none-any.whl", 50),
        ];
        let target = win310();
        let policy = TagPolicy::default();
        let first = select_best(&artifacts, &target, &policy).unwrap().filename.clone();
        for _ in 0..10 {
            let again = select_best(&artifacts, &target, &policy).unwrap();
            assert_eq!(again.filename, first);
        }
        assert_eq!(first, "pkg-1.0-cp310-cp310-win_amd64.whl");
    }

    #[test]
    fn wildcard_target_prefers_pure() {
        let target = RuntimeTarget::new("3.10", "any");
        let artifacts = vec![
            wheel("pkg-1.0-cp310-cp310-win_amd64.whl", 10),
            wheel("pkg-1.0-py3-none-any.whl", 9000),
        ];
        let best = select_best(&artifacts, &target, &TagPolicy::default()).unwrap();
        assert_eq!(best.filename, "pkg-1.0-py3-none-any.whl");
    }

    #[test]
    fn empty_set_is_a_normal_outcome() {
        assert!(select_best(&[], &win310(), &TagPolicy::default()).is_none());
    }
}
