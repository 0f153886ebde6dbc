#![allow(unused)]

//! # contract: the storage provider seen from the publisher
//!
//! This module defines the [`Uploader`] trait and the plain data types that
//! flow across it. The publisher never talks to a network itself; everything
//! provider specific (request signing, zone discovery, HTTP) sits behind this
//! trait.
//!
//! ## Interface & Extensibility
//! - Implement [`Uploader`] to publish into a new storage backend.
//! - `upload_token` is synchronous: issuing a credential is a local signing
//!   step and must not suspend the caller.
//! - `put_file` is async and performs exactly one transfer attempt.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockUploader` is exported when the
//!   `test-export-mocks` feature is enabled (the default).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// A build output eligible for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    /// Relative output name, e.g. `js/app.js`. Used to build the remote key.
    pub name: String,
    /// Whether the build actually wrote this file during the current run.
    #[serde(default = "emitted_default")]
    pub emitted: bool,
    /// Absolute location of the file on disk.
    pub source_path: PathBuf,
}

fn emitted_default() -> bool {
    true
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, emitted: bool, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            emitted,
            source_path: source_path.into(),
        }
    }
}

/// Short-lived credential scoped to a single `bucket:key`.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are bearer secrets; keep them out of debug logs.
impl std::fmt::Debug for UploadToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UploadToken(..)")
    }
}

/// Extra per-upload options forwarded verbatim to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutExtra {
    /// Explicit content type; the provider sniffs one when absent.
    pub mime_type: Option<String>,
    /// Custom variables (sent as `x:<name>` fields to Qiniu).
    pub params: BTreeMap<String, String>,
}

/// Metadata returned by the provider for a stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutResponse {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub key: String,
    /// Any further fields the provider chose to return.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Capability to store local files in a bucket.
///
/// Implemented by the real Qiniu client in the CLI crate and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Issue a credential for `scope`, which is always `bucket:key`.
    fn upload_token(&self, scope: &str) -> Result<UploadToken, UploadError>;

    /// Upload the file at `local_path` under `key`. One attempt, no retry.
    async fn put_file(
        &self,
        token: &UploadToken,
        key: &str,
        local_path: &Path,
        extra: &PutExtra,
    ) -> Result<PutResponse, UploadError>;
}
