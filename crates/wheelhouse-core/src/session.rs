//! Run lifecycle: one active run at a time, supersede on submit.
//!
//! A [`Session`] owns the metadata source and HTTP client and hands
//! each submitted request to a background task that resolves the
//! closure and then downloads it. Submitting while a run is in flight
//! cancels the old run first, so the session never downloads for two
//! targets at once. Consumers observe a run through its event stream
//! and through [`Session::snapshot`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use wheelhouse_schema::{PackageRequest, RuntimeTarget};

use crate::events::ProgressEvent;
use crate::fetch::{self, DownloadItem, FetchOptions};
use crate::index::MetadataSource;
use crate::resolver::Resolver;

/// Event channel depth per run.
const EVENT_BUFFER: usize = 256;

/// Identifier of one submitted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Everything one run needs: what to resolve, for which target, and
/// where to put the wheels.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Root package to resolve.
    pub package: PackageRequest,
    /// Interpreter/platform pair the wheels must suit.
    pub target: RuntimeTarget,
    /// Directory wheels are placed into.
    pub output_dir: PathBuf,
    /// Maximum simultaneous transfers.
    pub concurrency: usize,
    /// Whether to walk the dependency closure or stop at the root.
    pub follow_dependencies: bool,
}

impl FetchRequest {
    /// A request with default concurrency that follows dependencies.
    pub fn new(package: PackageRequest, target: RuntimeTarget, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            package,
            target,
            output_dir: output_dir.into(),
            concurrency: fetch::DEFAULT_CONCURRENCY,
            follow_dependencies: true,
        }
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

struct ActiveRun {
    id: RunId,
    cancel: CancellationToken,
    items: Arc<Mutex<Vec<DownloadItem>>>,
}

/// Long-lived owner of runs against one metadata source.
pub struct Session<S> {
    source: Arc<S>,
    client: reqwest::Client,
    active: Mutex<Option<ActiveRun>>,
    next_id: AtomicU64,
}

impl<S: MetadataSource + 'static> Session<S> {
    /// Create a session over `source`, using `client` for artifact
    /// transfers.
    pub fn new(source: S, client: reqwest::Client) -> Self {
        Self {
            source: Arc::new(source),
            client,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start a run. Any in-flight run is canceled first; its stream
    /// terminates with its own `RunCompleted`.
    ///
    /// The returned stream carries every event of the new run and ends
    /// after `RunCompleted`.
    pub fn submit(self: &Arc<Self>, request: FetchRequest) -> (RunId, ReceiverStream<ProgressEvent>) {
        let id = RunId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let items = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(old) = active.replace(ActiveRun {
                id,
                cancel: cancel.clone(),
                items: Arc::clone(&items),
            }) {
                tracing::info!(superseded = %old.id, by = %id, "canceling in-flight run");
                old.cancel.cancel();
            }
        }

        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.run(id, request, items, tx, cancel).await;
            let mut active = session.active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.as_ref().is_some_and(|run| run.id == id) {
                *active = None;
            }
        });

        (id, ReceiverStream::new(rx))
    }

    /// Cancel a run by id. Returns `false` when the id is not the
    /// active run (already finished or superseded).
    pub fn cancel(&self, id: RunId) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(run) if run.id == id => {
                tracing::info!(run = %id, "cancellation requested");
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of the active run's download items. Empty
    /// when no run is active.
    pub fn snapshot(&self) -> Vec<DownloadItem> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.as_ref().map_or_else(Vec::new, |run| {
            run.items.lock().unwrap_or_else(PoisonError::into_inner).clone()
        })
    }

    async fn run(
        &self,
        id: RunId,
        request: FetchRequest,
        items: Arc<Mutex<Vec<DownloadItem>>>,
        events: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            run = %id,
            package = %request.package.name,
            target = %request.target,
            "run started"
        );

        let resolver = Resolver::new(self.source.as_ref(), &request.target)
            .follow_dependencies(request.follow_dependencies);

        let resolution = tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(run = %id, "canceled during resolution");
                events
                    .send(ProgressEvent::RunCompleted { succeeded: 0, failed: 0, canceled: 0 })
                    .await
                    .ok();
                return;
            }
            resolution = resolver.resolve(request.package, &events) => resolution,
        };

        let opts = FetchOptions {
            output_dir: request.output_dir,
            concurrency: request.concurrency,
        };
        match fetch::fetch_all(&self.client, &resolution.resolved, &opts, &items, &events, &cancel)
            .await
        {
            Ok(summary) => {
                tracing::info!(
                    run = %id,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    canceled = summary.canceled,
                    unresolved = resolution.unresolved.len(),
                    "run finished"
                );
            }
            Err(e) => {
                tracing::error!(run = %id, error = %e, "run setup failed");
                events
                    .send(ProgressEvent::RunCompleted { succeeded: 0, failed: 0, canceled: 0 })
                    .await
                    .ok();
            }
        }
    }
}
