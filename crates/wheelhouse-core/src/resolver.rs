//! Breadth-first dependency closure discovery.
//!
//! The resolver walks a worklist of package requests, resolving each
//! normalized name at most once (first-seen-wins), probing versions
//! newest-first for one with a target-compatible wheel, and recording
//! per-package failures without aborting the run. Traversal depth is
//! bounded so malformed index metadata that declares a false cycle can
//! never loop the resolver.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tokio::sync::mpsc;
use wheelhouse_schema::{
    ArtifactDescriptor, PackageName, PackageRequest, Requirement, RuntimeTarget, TagPolicy,
    Version, VersionSpec,
};

use crate::events::ProgressEvent;
use crate::index::{IndexError, MetadataSource, VersionMetadata};
use crate::matcher;

/// Maximum traversal depth before a request is rejected as a cycle/depth
/// safety-valve violation.
pub const MAX_DEPTH: usize = 50;

/// How many versions (newest first) an unpinned request probes for a
/// compatible wheel before giving up with `NoCompatibleArtifact`.
const VERSION_PROBE_LIMIT: usize = 8;

/// Extra attempt made after a transient index error.
const TRANSIENT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(250);

/// Why a package ended up unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The package or pinned version does not exist upstream.
    NotFound,
    /// No published version ships a wheel compatible with the target.
    NoCompatibleArtifact,
    /// The index response could not be parsed; never retried.
    MalformedMetadata(String),
    /// The index stayed unreachable through the bounded retry.
    Transient(String),
    /// The depth bound tripped; treated as a declared cycle.
    CycleOrDepthExceeded,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found upstream"),
            Self::NoCompatibleArtifact => write!(f, "no compatible artifact for target"),
            Self::MalformedMetadata(e) => write!(f, "malformed metadata: {e}"),
            Self::Transient(e) => write!(f, "index unreachable: {e}"),
            Self::CycleOrDepthExceeded => write!(f, "dependency cycle or depth limit exceeded"),
        }
    }
}

/// One package that could not be resolved.
#[derive(Debug, Clone)]
pub struct Unresolvable {
    /// Normalized package name.
    pub name: PackageName,
    /// Why it is unresolved.
    pub reason: UnresolvedReason,
}

/// A later, differently-pinned request for an already-resolved package.
/// The first-seen version wins; this is diagnostics, not a failure.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    /// Package name.
    pub name: PackageName,
    /// Version kept (first seen).
    pub kept: Version,
    /// Version the later request asked for.
    pub requested: Version,
}

/// One resolved package with its selected wheel.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    /// Normalized package name, unique within a run.
    pub name: PackageName,
    /// Chosen version.
    pub version: Version,
    /// The wheel selected for the target.
    pub artifact: ArtifactDescriptor,
    /// Packages that declared a dependency on this one.
    pub required_by: BTreeSet<PackageName>,
}

/// Outcome of a resolve run: best-effort, never a hard failure.
#[derive(Debug, Default)]
pub struct ResolutionResult {
    /// Resolved closure, in discovery order.
    pub resolved: Vec<ResolvedDependency>,
    /// Packages that could not be resolved, with reasons.
    pub unresolved: Vec<Unresolvable>,
    /// First-seen-wins conflicts observed during traversal.
    pub conflicts: Vec<VersionConflict>,
}

/// The dependency resolver for one runtime target.
#[derive(Debug)]
pub struct Resolver<'a, S> {
    source: &'a S,
    target: &'a RuntimeTarget,
    policy: TagPolicy,
    follow_dependencies: bool,
}

impl<'a, S: MetadataSource> Resolver<'a, S> {
    /// Create a resolver with the default tag policy.
    pub fn new(source: &'a S, target: &'a RuntimeTarget) -> Self {
        Self {
            source,
            target,
            policy: TagPolicy::default(),
            follow_dependencies: true,
        }
    }

    /// Replace the platform compatibility policy.
    pub fn with_policy(mut self, policy: TagPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve only the root request, without walking its dependencies.
    pub fn follow_dependencies(mut self, follow: bool) -> Self {
        self.follow_dependencies = follow;
        self
    }

    /// Resolve the closure of `root`, emitting resolution events on
    /// `events` as packages settle. Always terminates with a
    /// best-effort [`ResolutionResult`].
    pub async fn resolve(
        &self,
        root: PackageRequest,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> ResolutionResult {
        let mut result = ResolutionResult::default();
        let mut index_of: HashMap<PackageName, usize> = HashMap::new();
        let mut failed: HashSet<PackageName> = HashSet::new();
        let marker_env = self.target.marker_environment();

        events
            .send(ProgressEvent::ResolutionStarted {
                root: root.name.clone(),
            })
            .await
            .ok();

        let mut worklist: VecDeque<(PackageRequest, usize, Option<PackageName>)> =
            VecDeque::from([(root, 0, None)]);

        while let Some((request, depth, parent)) = worklist.pop_front() {
            // Already settled: merge the parent edge, flag pin conflicts.
            if let Some(&idx) = index_of.get(&request.name) {
                let dep = &mut result.resolved[idx];
                if let VersionSpec::Exact(requested) = &request.spec {
                    if *requested != dep.version {
                        tracing::warn!(
                            package = %dep.name,
                            kept = %dep.version,
                            requested = %requested,
                            "version conflict, first-seen version wins"
                        );
                        result.conflicts.push(VersionConflict {
                            name: dep.name.clone(),
                            kept: dep.version.clone(),
                            requested: requested.clone(),
                        });
                    }
                }
                if let Some(parent) = parent {
                    dep.required_by.insert(parent);
                }
                continue;
            }
            if failed.contains(&request.name) {
                continue;
            }

            if depth >= MAX_DEPTH {
                record_failure(
                    &mut result,
                    &mut failed,
                    events,
                    request.name,
                    UnresolvedReason::CycleOrDepthExceeded,
                )
                .await;
                continue;
            }

            match self.resolve_one(&request).await {
                Ok((version, artifact, requires)) => {
                    events
                        .send(ProgressEvent::PackageResolved {
                            name: request.name.clone(),
                            version: version.clone(),
                        })
                        .await
                        .ok();

                    let mut required_by = BTreeSet::new();
                    if let Some(parent) = parent {
                        required_by.insert(parent);
                    }
                    index_of.insert(request.name.clone(), result.resolved.len());
                    result.resolved.push(ResolvedDependency {
                        name: request.name.clone(),
                        version,
                        artifact,
                        required_by,
                    });

                    if self.follow_dependencies {
                        for req in requires {
                            if !req.applies_to(&marker_env) {
                                tracing::debug!(
                                    dependency = %req.name,
                                    "marker does not apply to target, skipping"
                                );
                                continue;
                            }
                            worklist.push_back((
                                PackageRequest {
                                    name: req.name,
                                    spec: req.spec,
                                },
                                depth + 1,
                                Some(request.name.clone()),
                            ));
                        }
                    }
                }
                Err(reason) => {
                    record_failure(&mut result, &mut failed, events, request.name, reason).await;
                }
            }
        }

        events
            .send(ProgressEvent::ResolutionCompleted {
                count: result.resolved.len(),
            })
            .await
            .ok();
        result
    }

    /// Resolve one request to (version, artifact, dependencies).
    ///
    /// Pinned requests consider only the pinned version. Unpinned
    /// requests probe newest-first and stop at the first version with a
    /// compatible wheel, since not every version ships a binary for
    /// every platform.
    async fn resolve_one(
        &self,
        request: &PackageRequest,
    ) -> Result<(Version, ArtifactDescriptor, Vec<Requirement>), UnresolvedReason> {
        let versions = self
            .list_versions_with_retry(&request.name)
            .await
            .map_err(index_error_to_reason)?;

        let candidates: Vec<Version> = match &request.spec {
            VersionSpec::Exact(pinned) => {
                if versions.contains(pinned) {
                    vec![pinned.clone()]
                } else {
                    return Err(UnresolvedReason::NotFound);
                }
            }
            VersionSpec::Latest => versions.into_iter().take(VERSION_PROBE_LIMIT).collect(),
        };
        if candidates.is_empty() {
            return Err(UnresolvedReason::NotFound);
        }

        for version in candidates {
            let meta = match self.metadata_with_retry(&request.name, &version).await {
                Ok(meta) => meta,
                // A version document can be missing even when the
                // release list mentions it; probe the next one.
                Err(IndexError::NotFound(_)) => continue,
                Err(e) => return Err(index_error_to_reason(e)),
            };

            if let Some(artifact) = matcher::select_best(&meta.artifacts, self.target, &self.policy)
            {
                return Ok((version, artifact.clone(), meta.requires));
            }
        }

        Err(UnresolvedReason::NoCompatibleArtifact)
    }

    async fn list_versions_with_retry(
        &self,
        name: &PackageName,
    ) -> Result<Vec<Version>, IndexError> {
        match self.source.list_versions(name).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(package = %name, error = %e, "transient index error, retrying");
                tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                self.source.list_versions(name).await
            }
            other => other,
        }
    }

    async fn metadata_with_retry(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> Result<VersionMetadata, IndexError> {
        match self.source.version_metadata(name, version).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(package = %name, error = %e, "transient index error, retrying");
                tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                self.source.version_metadata(name, version).await
            }
            other => other,
        }
    }
}

async fn record_failure(
    result: &mut ResolutionResult,
    failed: &mut HashSet<PackageName>,
    events: &mpsc::Sender<ProgressEvent>,
    name: PackageName,
    reason: UnresolvedReason,
) {
    tracing::warn!(package = %name, reason = %reason, "package unresolved");
    events
        .send(ProgressEvent::PackageUnresolvable {
            name: name.clone(),
            reason: reason.to_string(),
        })
        .await
        .ok();
    failed.insert(name.clone());
    result.unresolved.push(Unresolvable { name, reason });
}

fn index_error_to_reason(err: IndexError) -> UnresolvedReason {
    match err {
        IndexError::NotFound(_) => UnresolvedReason::NotFound,
        IndexError::Transient(e) => UnresolvedReason::Transient(e),
        IndexError::Malformed(e) => UnresolvedReason::MalformedMetadata(e),
    }
}
