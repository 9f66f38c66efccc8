//! Progress events streamed to the consumer of a run.
//!
//! One run produces one ordered stream: resolution-phase events first,
//! then per-item download events, closed by [`ProgressEvent::RunCompleted`].
//! Events for a given item are monotonic: `bytes_downloaded` never
//! decreases and status transitions never reverse.

use serde::Serialize;
use wheelhouse_schema::{PackageName, Version};

/// Identifier of one download item within a run.
pub type ItemId = usize;

/// Lifecycle state of a download item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DownloadStatus {
    /// Waiting for a worker.
    Queued,
    /// A worker is transferring it.
    Active,
    /// Verified and renamed into place.
    Completed,
    /// Gave up after retries, or integrity check failed.
    Failed,
    /// Canceled before or during transfer.
    Canceled,
}

impl DownloadStatus {
    /// Whether the item can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// One event on a run's progress stream.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Dependency resolution has begun for the root request.
    ResolutionStarted {
        /// Normalized root package name.
        root: PackageName,
    },
    /// A package was resolved to a concrete version with a compatible wheel.
    PackageResolved {
        /// Resolved package name.
        name: PackageName,
        /// Chosen version.
        version: Version,
    },
    /// A package could not be resolved; the run continues without it.
    PackageUnresolvable {
        /// Package name as requested.
        name: PackageName,
        /// Human-readable reason.
        reason: String,
    },
    /// Resolution finished; downloads start next.
    ResolutionCompleted {
        /// Number of resolved packages.
        count: usize,
    },
    /// A download item entered the queue.
    ItemQueued {
        /// Item identifier, stable for the run.
        item: ItemId,
        /// Package name.
        name: PackageName,
        /// Package version.
        version: Version,
        /// Wheel filename as it will appear in the output directory.
        filename: String,
        /// Expected size in bytes (0 if unknown).
        total_bytes: u64,
    },
    /// A worker started transferring the item.
    ItemStarted {
        /// Item identifier.
        item: ItemId,
    },
    /// Throttled transfer progress for an active item.
    ItemProgress {
        /// Item identifier.
        item: ItemId,
        /// Bytes received so far (monotonic).
        bytes_downloaded: u64,
        /// Expected total (0 if unknown).
        total_bytes: u64,
    },
    /// The item was verified and renamed into place.
    ItemCompleted {
        /// Item identifier.
        item: ItemId,
        /// Final size on disk.
        bytes_downloaded: u64,
    },
    /// The item failed permanently (retries exhausted or integrity error).
    ItemFailed {
        /// Item identifier.
        item: ItemId,
        /// Human-readable failure reason.
        reason: String,
    },
    /// The item was canceled before completing.
    ItemCanceled {
        /// Item identifier.
        item: ItemId,
    },
    /// Every item is terminal; the run is over.
    RunCompleted {
        /// Items that completed.
        succeeded: usize,
        /// Items that failed.
        failed: usize,
        /// Items that were canceled.
        canceled: usize,
    },
}
