//! Terminal output: status lines per download, a summary at the end.
//!
//! Rendering is line-based. Throttled byte-progress events exist on the
//! stream but are not drawn; each item gets one line when it settles,
//! which keeps output readable when piped or captured in CI.

use std::collections::HashMap;

use crossterm::style::Stylize;
use wheelhouse_core::{ItemId, ProgressEvent};

/// Format a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= GB {
        format!("{:.1} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.1} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Stdout writer that honors `--quiet`.
#[derive(Debug, Clone)]
pub struct Output {
    quiet: bool,
}

impl Output {
    /// Create an output sink.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Informational line, suppressed by `--quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }
}

/// Warning line on stderr, never suppressed.
pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "warning:".yellow().bold());
}

/// Error line on stderr, never suppressed.
pub fn error(msg: &str) {
    eprintln!("{} {msg}", "error:".red().bold());
}

/// Turns a run's event stream into status lines.
///
/// Remembers filenames from `ItemQueued` so terminal events can be
/// printed by name, and keeps the run's tallies for the caller.
#[derive(Debug)]
pub struct EventRenderer {
    output: Output,
    filenames: HashMap<ItemId, String>,
    /// Packages that could not be resolved.
    pub unresolved: usize,
    /// Final (succeeded, failed, canceled) counts, set by `RunCompleted`.
    pub summary: Option<(usize, usize, usize)>,
}

impl EventRenderer {
    /// Create a renderer writing through `output`.
    pub fn new(output: Output) -> Self {
        Self {
            output,
            filenames: HashMap::new(),
            unresolved: 0,
            summary: None,
        }
    }

    fn filename(&self, item: ItemId) -> &str {
        self.filenames.get(&item).map_or("<unknown>", String::as_str)
    }

    /// Render one event.
    pub fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ResolutionStarted { root } => {
                self.output.info(&format!("Resolving {}...", root.as_str().bold()));
            }
            ProgressEvent::PackageResolved { name, version } => {
                self.output.info(&format!(
                    "  {} {} {}",
                    "+".green(),
                    name.as_str(),
                    version.as_str().dark_grey()
                ));
            }
            ProgressEvent::PackageUnresolvable { name, reason } => {
                self.unresolved += 1;
                warn(&format!("skipping {name}: {reason}"));
            }
            ProgressEvent::ResolutionCompleted { count } => {
                self.output.info(&format!("Fetching {count} package(s)..."));
            }
            ProgressEvent::ItemQueued { item, filename, .. } => {
                self.filenames.insert(*item, filename.clone());
            }
            ProgressEvent::ItemStarted { .. } | ProgressEvent::ItemProgress { .. } => {}
            ProgressEvent::ItemCompleted { item, bytes_downloaded } => {
                self.output.info(&format!(
                    "  {} {} {}",
                    "✓".green(),
                    self.filename(*item),
                    format_size(*bytes_downloaded).dark_grey()
                ));
            }
            ProgressEvent::ItemFailed { item, reason } => {
                error(&format!("{}: {reason}", self.filename(*item)));
            }
            ProgressEvent::ItemCanceled { item } => {
                self.output
                    .info(&format!("  {} {}", "-".dark_grey(), self.filename(*item)));
            }
            ProgressEvent::RunCompleted { succeeded, failed, canceled } => {
                self.summary = Some((*succeeded, *failed, *canceled));
                let mut parts = vec![format!("{succeeded} fetched")];
                if *failed > 0 {
                    parts.push(format!("{failed} failed"));
                }
                if *canceled > 0 {
                    parts.push(format!("{canceled} canceled"));
                }
                if self.unresolved > 0 {
                    parts.push(format!("{} unresolved", self.unresolved));
                }
                self.output.info(&format!("Done: {}", parts.join(", ")));
            }
        }
    }
}
