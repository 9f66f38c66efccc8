//! wheelhouse-core - the resolution-and-retrieval engine.
//!
//! Given a root package request and a runtime target, this crate
//! computes the transitive dependency closure against a PyPI-shaped
//! index, selects the best-matching wheel per package, and drives a
//! bounded-concurrency, cancelable download pipeline that streams
//! progress events to the consumer.
//!
//! The pieces compose leaf-first:
//!
//! - [`matcher`] - pure best-wheel selection under (python, platform)
//!   constraints.
//! - [`index`] - the metadata client boundary ([`index::MetadataSource`])
//!   and its HTTP implementation, [`index::PypiClient`].
//! - [`resolver`] - breadth-first closure discovery with
//!   first-seen-wins version conflicts.
//! - [`fetch`] - the download orchestrator: worker pool, streaming
//!   SHA-256 verification, atomic rename, failure isolation.
//! - [`session`] - one-run-at-a-time state, supersede-on-submit, and
//!   the [`events::ProgressEvent`] stream consumers subscribe to.

pub mod events;
pub mod fetch;
pub mod index;
pub mod matcher;
pub mod resolver;
pub mod session;

pub use events::{DownloadStatus, ItemId, ProgressEvent};
pub use fetch::{DownloadItem, FetchError, FetchOptions, RunSummary};
pub use index::{IndexError, MetadataSource, PypiClient, VersionMetadata};
pub use resolver::{ResolutionResult, ResolvedDependency, Resolver, UnresolvedReason};
pub use session::{FetchRequest, RunId, Session};

/// User agent sent with every index and artifact request.
pub const USER_AGENT: &str = concat!("wheelhouse/", env!("CARGO_PKG_VERSION"));
