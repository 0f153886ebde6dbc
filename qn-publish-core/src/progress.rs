//! Progress reporting for a publish run.
//!
//! Tasks tick a shared atomic counter as they settle; every tick produces a
//! [`ProgressSnapshot`] that is handed to a single [`ProgressSink`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, info};

/// Lifecycle of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Selecting,
    Running,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolving => "resolving",
            Phase::Selecting => "selecting",
            Phase::Running => "running",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Settled-task count at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub uploaded: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Rounded percentage; an empty run counts as complete.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        (self.uploaded * 100 + self.total / 2) / self.total
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Uploading to Qiniu CDN: {}% {}/{} files uploaded",
            self.percent(),
            self.uploaded,
            self.total
        )
    }
}

/// Receives progress and phase changes. Called from the coordinator's task only.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);

    fn on_phase(&self, _phase: Phase) {}
}

/// Renders progress as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        info!(
            uploaded = snapshot.uploaded,
            total = snapshot.total,
            percent = snapshot.percent(),
            "{snapshot}"
        );
    }

    fn on_phase(&self, phase: Phase) {
        match phase {
            Phase::Failed => error!(%phase, "Publish failed"),
            p if p.is_terminal() => info!(%phase, "Publish succeeded"),
            _ => info!(%phase, "Publish phase"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _snapshot: ProgressSnapshot) {}
}

/// Monotonic settled-task counter for one run.
pub struct Progress<'a> {
    total: usize,
    settled: AtomicUsize,
    sink: &'a dyn ProgressSink,
}

impl<'a> Progress<'a> {
    pub fn new(total: usize, sink: &'a dyn ProgressSink) -> Self {
        Self {
            total,
            settled: AtomicUsize::new(0),
            sink,
        }
    }

    /// Publish the initial `0/total` snapshot.
    pub fn start(&self) {
        self.sink.on_progress(self.snapshot());
    }

    /// Record one settled task and report the new count.
    pub fn settle(&self) -> ProgressSnapshot {
        let uploaded = self.settled.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = ProgressSnapshot {
            uploaded,
            total: self.total,
        };
        self.sink.on_progress(snapshot);
        snapshot
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            uploaded: self.settled.load(Ordering::SeqCst),
            total: self.total,
        }
    }

    pub fn phase(&self, phase: Phase) {
        self.sink.on_phase(phase);
    }
}
