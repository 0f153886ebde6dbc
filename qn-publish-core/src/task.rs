//! A single file transfer.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::contract::{CandidateFile, PutExtra, PutResponse, Uploader};
use crate::error::{PublishError, Result};
use crate::progress::Progress;

/// Join `prefix` and `name` with `/`, normalising `.`, `..` and repeated
/// separators the way a posix path join does.
pub fn remote_key(prefix: &str, name: &str) -> String {
    let joined = match (prefix.is_empty(), name.is_empty()) {
        (true, true) => return ".".to_string(),
        (true, false) => name.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{name}"),
    };

    let absolute = joined.starts_with('/');
    let trailing = joined.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut key = segments.join("/");
    if absolute {
        key.insert(0, '/');
    }
    if key.is_empty() {
        key.push('.');
    }
    if trailing && !key.ends_with('/') {
        key.push('/');
    }
    key
}

/// Result of a successful transfer.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub name: String,
    pub key: String,
    pub response: PutResponse,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl UploadOutcome {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// One pending upload: a candidate file and its remote key.
#[derive(Debug)]
pub struct UploadTask<'a> {
    file: &'a CandidateFile,
    key: String,
}

impl<'a> UploadTask<'a> {
    pub fn new(prefix: &str, file: &'a CandidateFile) -> Self {
        Self {
            file,
            key: remote_key(prefix, &file.name),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Issue a credential for `bucket:key` and transfer the file once.
    ///
    /// `progress` is ticked exactly once when the transfer settles, whether it
    /// succeeded or failed. A transfer dropped through `cancel` does not tick.
    pub async fn run<U>(
        self,
        uploader: &U,
        bucket: &str,
        extra: &PutExtra,
        progress: &Progress<'_>,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome>
    where
        U: Uploader + ?Sized,
    {
        let UploadTask { file, key } = self;
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled { key });
        }
        let scope = format!("{bucket}:{key}");

        let token = match uploader.upload_token(&scope) {
            Ok(token) => token,
            Err(source) => {
                error!(key = %key, error = %source, "Failed to issue upload token");
                progress.settle();
                return Err(PublishError::Upload { key, source });
            }
        };

        debug!(key = %key, source_path = %file.source_path.display(), "Starting upload");
        let started = Instant::now();
        let transfer = uploader.put_file(&token, &key, &file.source_path, extra);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key = %key, "Upload cancelled");
                return Err(PublishError::Cancelled { key: key.clone() });
            }
            result = transfer => result,
        };
        let duration = started.elapsed();
        progress.settle();

        match result {
            Ok(response) => {
                info!(
                    key = %key,
                    hash = %response.hash,
                    duration_ms = duration.as_millis() as u64,
                    "Uploaded file"
                );
                Ok(UploadOutcome {
                    name: file.name.clone(),
                    key,
                    response,
                    duration,
                })
            }
            Err(source) => {
                error!(key = %key, error = %source, "Upload failed");
                Err(PublishError::Upload { key, source })
            }
        }
    }
}
