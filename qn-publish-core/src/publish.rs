//! High-level pipeline: resolve → select → upload for one build's output.
//!
//! This module provides the top-level orchestration for publishing a build's
//! emitted files into a bucket. A run:
//!   - Expands the key-prefix template once against the build hash
//!   - Selects the candidates to upload (emitted, not excluded, included)
//!   - Launches one [`UploadTask`] per selected file, all concurrently
//!   - Aggregates the outcomes into a single [`PublishReport`] or the first failure
//!
//! # Responsibilities
//! - Fail-fast orchestration: the first failed upload ends the run. Remaining
//!   transfers are cancelled and drained before [`publish`] returns, so no
//!   work outlives the call.
//! - Progress: every settled transfer ticks a shared counter which is reported
//!   through a [`ProgressSink`].
//! - No partial-success result: callers see either every outcome or one error.
//!
//! # Error Handling
//! Template failures abort before any uploader call. Upload failures are
//! returned as [`PublishError::Upload`] carrying the provider error.

use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::PublishOptions;
use crate::contract::{CandidateFile, Uploader};
use crate::error::{PublishError, Result};
use crate::progress::{Phase, Progress, ProgressSink};
use crate::select::select_assets;
use crate::task::{UploadOutcome, UploadTask};
use crate::template::resolve_template;

/// Successful run: every selected file was stored.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    /// Key prefix after template expansion.
    pub prefix: String,
    /// One entry per uploaded file, in completion order.
    pub outcomes: Vec<UploadOutcome>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl PublishReport {
    pub fn uploaded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcome(&self, name: &str) -> Option<&UploadOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Compute the prefix and the files a run would upload, without uploading.
pub fn plan(
    options: &PublishOptions,
    assets: &[CandidateFile],
    build_hash: Option<&str>,
) -> Result<(String, Vec<CandidateFile>)> {
    let prefix = resolve_template(&options.path, build_hash, options.allow_empty_hash)?;
    let selected = select_assets(assets, &options.filter);
    Ok((prefix, selected))
}

/// Upload the selected subset of `assets` to `options.bucket`.
pub async fn publish<U>(
    uploader: &U,
    options: &PublishOptions,
    assets: &[CandidateFile],
    build_hash: Option<&str>,
    sink: &dyn ProgressSink,
) -> Result<PublishReport>
where
    U: Uploader + ?Sized,
{
    let span = info_span!("publish", bucket = %options.bucket);
    run(uploader, options, assets, build_hash, sink)
        .instrument(span)
        .await
}

async fn run<U>(
    uploader: &U,
    options: &PublishOptions,
    assets: &[CandidateFile],
    build_hash: Option<&str>,
    sink: &dyn ProgressSink,
) -> Result<PublishReport>
where
    U: Uploader + ?Sized,
{
    let started = Instant::now();

    sink.on_phase(Phase::Resolving);
    let prefix = match resolve_template(&options.path, build_hash, options.allow_empty_hash) {
        Ok(prefix) => prefix,
        Err(e) => {
            error!(error = %e, "Failed to resolve upload path");
            sink.on_phase(Phase::Failed);
            return Err(e);
        }
    };
    debug!(template = %options.path, prefix = %prefix, "Resolved upload path");

    sink.on_phase(Phase::Selecting);
    let selected = select_assets(assets, &options.filter);
    let progress = Progress::new(selected.len(), sink);
    progress.start();

    if selected.is_empty() {
        info!(candidates = assets.len(), "No files selected for upload");
        sink.on_phase(Phase::Succeeded);
        return Ok(PublishReport {
            prefix,
            outcomes: Vec::new(),
            elapsed: started.elapsed(),
        });
    }

    sink.on_phase(Phase::Running);
    info!(total = selected.len(), prefix = %prefix, "Starting uploads");

    let cancel = CancellationToken::new();
    let mut in_flight: FuturesUnordered<_> = selected
        .iter()
        .map(|file| {
            let task = UploadTask::new(&prefix, file);
            debug!(name = %file.name, key = task.key(), "Queued upload");
            task.run(
                uploader,
                &options.bucket,
                &options.extra,
                &progress,
                &cancel,
            )
        })
        .collect();

    let mut outcomes = Vec::with_capacity(selected.len());
    while let Some(result) = in_flight.next().await {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                cancel.cancel();
                let mut stragglers = 0usize;
                while let Some(late) = in_flight.next().await {
                    stragglers += 1;
                    debug!(result = ?late.as_ref().map(|o| &o.key), "Discarding result after failure");
                }
                error!(
                    error = %e,
                    uploaded = outcomes.len(),
                    stragglers,
                    total = selected.len(),
                    "Publish failed"
                );
                sink.on_phase(Phase::Failed);
                return Err(e);
            }
        }
    }

    drop(in_flight);

    let elapsed = started.elapsed();
    info!(
        uploaded = outcomes.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Publish complete"
    );
    sink.on_phase(Phase::Succeeded);

    Ok(PublishReport {
        prefix,
        outcomes,
        elapsed,
    })
}

/// Shorthand used by callers that only care whether the run failed on
/// configuration or during transfer.
pub fn is_configuration_error(err: &PublishError) -> bool {
    matches!(
        err,
        PublishError::Configuration { .. } | PublishError::InvalidPattern { .. }
    )
}
