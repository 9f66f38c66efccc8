//! Download orchestrator: bounded worker pool, streaming SHA-256
//! verification, atomic placement.
//!
//! Every wheel is written to a hidden `.{filename}.{run}.partial`
//! sibling and only renamed to its final name after the size and digest
//! checks pass, so the output directory never contains a torn or
//! unverified file. The partial name carries a per-run sequence number:
//! a superseded run cleaning up after itself must never touch the
//! partial its successor is writing into the same directory.
//! Failures are isolated per item: one bad wheel never aborts the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use wheelhouse_schema::{PackageName, Version};

use crate::events::{DownloadStatus, ItemId, ProgressEvent};
use crate::resolver::ResolvedDependency;

/// Worker pool size when the caller does not override it.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Minimum interval between `ItemProgress` events per item.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Attempts made after the first failure, for retryable errors only.
const EXTRA_ATTEMPTS: u32 = 2;

/// Pause before each retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Process-wide sequence distinguishing concurrent runs' partial files.
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden scratch path a wheel streams into before verification.
fn partial_path(output_dir: &Path, run: u64, filename: &str) -> PathBuf {
    output_dir.join(format!(".{filename}.{run}.partial"))
}

/// Errors from a single download attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or non-success HTTP status.
    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem failure while writing or renaming the wheel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Computed digest differs from the index's declared digest.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Declared SHA-256 hex digest.
        expected: String,
        /// Computed SHA-256 hex digest.
        actual: String,
    },

    /// Byte count differs from the index's declared size.
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared size in bytes.
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },
}

impl FetchError {
    /// Integrity failures are permanent: the bytes upstream are wrong,
    /// so retrying the same URL cannot help.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::HashMismatch { .. } | Self::SizeMismatch { .. })
    }
}

/// Tunables for one download run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory wheels are placed into; created if absent.
    pub output_dir: PathBuf,
    /// Maximum simultaneous transfers.
    pub concurrency: usize,
}

impl FetchOptions {
    /// Options for `output_dir` with [`DEFAULT_CONCURRENCY`] workers.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Observable state of one download item, as exposed by snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadItem {
    /// Item identifier, stable for the run.
    pub id: ItemId,
    /// Package name.
    pub name: PackageName,
    /// Package version.
    pub version: Version,
    /// Wheel filename in the output directory.
    pub filename: String,
    /// Current lifecycle state.
    pub status: DownloadStatus,
    /// Bytes received so far.
    pub bytes_downloaded: u64,
    /// Expected size (0 if the index did not declare one).
    pub total_bytes: u64,
}

/// Terminal counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items verified and placed.
    pub succeeded: usize,
    /// Items that failed permanently.
    pub failed: usize,
    /// Items canceled before completion.
    pub canceled: usize,
}

/// Result of one transfer attempt that did not error.
enum Outcome {
    /// Fully received and verified; carries the byte count.
    Done(u64),
    /// Cancellation observed mid-transfer.
    Canceled,
}

/// Download every resolved wheel into `opts.output_dir`.
///
/// Items are seeded into `items` (and announced with `ItemQueued`)
/// before any transfer starts, then drained by `opts.concurrency`
/// workers. The call returns once every item is terminal, after
/// emitting [`ProgressEvent::RunCompleted`].
///
/// # Errors
///
/// Only setup failures (creating the output directory) abort the run;
/// per-item errors are reported through events and the summary.
pub async fn fetch_all(
    client: &reqwest::Client,
    deps: &[ResolvedDependency],
    opts: &FetchOptions,
    items: &Arc<Mutex<Vec<DownloadItem>>>,
    events: &mpsc::Sender<ProgressEvent>,
    cancel: &CancellationToken,
) -> Result<RunSummary, FetchError> {
    tokio::fs::create_dir_all(&opts.output_dir).await?;

    for (id, dep) in deps.iter().enumerate() {
        let item = DownloadItem {
            id,
            name: dep.name.clone(),
            version: dep.version.clone(),
            filename: dep.artifact.filename.clone(),
            status: DownloadStatus::Queued,
            bytes_downloaded: 0,
            total_bytes: dep.artifact.size_bytes,
        };
        events
            .send(ProgressEvent::ItemQueued {
                item: id,
                name: item.name.clone(),
                version: item.version.clone(),
                filename: item.filename.clone(),
                total_bytes: item.total_bytes,
            })
            .await
            .ok();
        items.lock().unwrap_or_else(PoisonError::into_inner).push(item);
    }

    let run = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut workers = JoinSet::new();

    for (id, dep) in deps.iter().enumerate() {
        let client = client.clone();
        let url = dep.artifact.url.clone();
        let filename = dep.artifact.filename.clone();
        let expected_size = dep.artifact.size_bytes;
        let expected_sha = dep.artifact.sha256.clone();
        let output_dir = opts.output_dir.clone();
        let items = Arc::clone(items);
        let events = events.clone();
        let cancel = cancel.clone();
        let semaphore = Arc::clone(&semaphore);

        workers.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                settle(&items, &events, id, DownloadStatus::Canceled, None).await;
                return DownloadStatus::Canceled;
            };
            run_item(
                &client,
                id,
                run,
                &url,
                &filename,
                expected_size,
                &expected_sha,
                &output_dir,
                &items,
                &events,
                &cancel,
            )
            .await
        });
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(DownloadStatus::Completed) => summary.succeeded += 1,
            Ok(DownloadStatus::Canceled) => summary.canceled += 1,
            Ok(_) => summary.failed += 1,
            Err(e) => {
                tracing::error!(error = %e, "download worker panicked");
                summary.failed += 1;
            }
        }
    }

    events
        .send(ProgressEvent::RunCompleted {
            succeeded: summary.succeeded,
            failed: summary.failed,
            canceled: summary.canceled,
        })
        .await
        .ok();
    Ok(summary)
}

/// Drive one item to a terminal state. Returns that state.
#[allow(clippy::too_many_arguments)]
async fn run_item(
    client: &reqwest::Client,
    id: ItemId,
    run: u64,
    url: &str,
    filename: &str,
    expected_size: u64,
    expected_sha: &str,
    output_dir: &Path,
    items: &Arc<Mutex<Vec<DownloadItem>>>,
    events: &mpsc::Sender<ProgressEvent>,
    cancel: &CancellationToken,
) -> DownloadStatus {
    if cancel.is_cancelled() {
        settle(items, events, id, DownloadStatus::Canceled, None).await;
        return DownloadStatus::Canceled;
    }

    let final_path = output_dir.join(filename);
    let part_path = partial_path(output_dir, run, filename);

    // A file that already exists is assumed to be a prior verified
    // download; do not transfer it again.
    if let Ok(meta) = tokio::fs::metadata(&final_path).await {
        tracing::info!(filename, "already present, skipping download");
        set_bytes(items, id, meta.len());
        settle(items, events, id, DownloadStatus::Completed, None).await;
        return DownloadStatus::Completed;
    }

    set_status(items, id, DownloadStatus::Active);
    events.send(ProgressEvent::ItemStarted { item: id }).await.ok();

    let mut attempt = 0;
    loop {
        let result = download_once(
            client,
            id,
            url,
            &part_path,
            expected_size,
            expected_sha,
            items,
            events,
            cancel,
        )
        .await;

        match result {
            Ok(Outcome::Done(bytes)) => {
                if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
                    tracing::error!(filename, error = %e, "failed to place verified wheel");
                    let _ = tokio::fs::remove_file(&part_path).await;
                    settle(items, events, id, DownloadStatus::Failed, Some(e.to_string())).await;
                    return DownloadStatus::Failed;
                }
                set_bytes(items, id, bytes);
                settle(items, events, id, DownloadStatus::Completed, None).await;
                return DownloadStatus::Completed;
            }
            Ok(Outcome::Canceled) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                settle(items, events, id, DownloadStatus::Canceled, None).await;
                return DownloadStatus::Canceled;
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                if e.is_integrity() || attempt >= EXTRA_ATTEMPTS {
                    tracing::error!(filename, error = %e, "download failed permanently");
                    settle(items, events, id, DownloadStatus::Failed, Some(e.to_string())).await;
                    return DownloadStatus::Failed;
                }
                attempt += 1;
                tracing::warn!(
                    filename,
                    attempt,
                    error = %e,
                    "download failed, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// One streaming transfer into the partial file, hashing as bytes
/// arrive. The partial file is left in place for the caller to rename
/// or remove.
#[allow(clippy::too_many_arguments)]
async fn download_once(
    client: &reqwest::Client,
    id: ItemId,
    url: &str,
    part_path: &Path,
    expected_size: u64,
    expected_sha: &str,
    items: &Arc<Mutex<Vec<DownloadItem>>>,
    events: &mpsc::Sender<ProgressEvent>,
    cancel: &CancellationToken,
) -> Result<Outcome, FetchError> {
    let request = async {
        client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()
    };
    let response = tokio::select! {
        () = cancel.cancelled() => return Ok(Outcome::Canceled),
        response = request => response?,
    };

    let mut file = tokio::fs::File::create(part_path).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;
    let mut last_emit = Instant::now();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => {
                drop(file);
                return Ok(Outcome::Canceled);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;

        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;

        // Events report the item's monotonic counter, not the raw
        // per-attempt count, which restarts from zero on retry.
        let reported = set_bytes(items, id, received);
        if last_emit.elapsed() >= PROGRESS_INTERVAL {
            last_emit = Instant::now();
            events
                .send(ProgressEvent::ItemProgress {
                    item: id,
                    bytes_downloaded: reported,
                    total_bytes: expected_size,
                })
                .await
                .ok();
        }
    }
    file.flush().await?;
    drop(file);

    if expected_size > 0 && received != expected_size {
        return Err(FetchError::SizeMismatch {
            expected: expected_size,
            actual: received,
        });
    }
    if !expected_sha.is_empty() {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected_sha) {
            return Err(FetchError::HashMismatch {
                expected: expected_sha.to_string(),
                actual,
            });
        }
    }

    Ok(Outcome::Done(received))
}

fn set_status(items: &Arc<Mutex<Vec<DownloadItem>>>, id: ItemId, status: DownloadStatus) {
    let mut items = items.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(item) = items.get_mut(id) {
        if !item.status.is_terminal() {
            item.status = status;
        }
    }
}

/// Fold `bytes` into the item's monotonic counter and return the
/// resulting value.
fn set_bytes(items: &Arc<Mutex<Vec<DownloadItem>>>, id: ItemId, bytes: u64) -> u64 {
    let mut items = items.lock().unwrap_or_else(PoisonError::into_inner);
    match items.get_mut(id) {
        Some(item) => {
            item.bytes_downloaded = item.bytes_downloaded.max(bytes);
            item.bytes_downloaded
        }
        None => bytes,
    }
}

/// Record a terminal status and emit the matching event.
async fn settle(
    items: &Arc<Mutex<Vec<DownloadItem>>>,
    events: &mpsc::Sender<ProgressEvent>,
    id: ItemId,
    status: DownloadStatus,
    reason: Option<String>,
) {
    let bytes = {
        let mut items = items.lock().unwrap_or_else(PoisonError::into_inner);
        match items.get_mut(id) {
            Some(item) => {
                item.status = status;
                item.bytes_downloaded
            }
            None => 0,
        }
    };
    let event = match status {
        DownloadStatus::Completed => ProgressEvent::ItemCompleted {
            item: id,
            bytes_downloaded: bytes,
        },
        DownloadStatus::Canceled => ProgressEvent::ItemCanceled { item: id },
        _ => ProgressEvent::ItemFailed {
            item: id,
            reason: reason.unwrap_or_else(|| "download failed".to_string()),
        },
    };
    events.send(event).await.ok();
}
