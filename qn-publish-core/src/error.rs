//! Error types shared by every stage of a publish run.

use thiserror::Error;

/// Failure reported by the storage provider for a single object.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("credential issuance failed: {0}")]
    Credential(String),

    #[error("provider rejected upload ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

/// Terminal failure of a publish run.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A placeholder token could not be resolved and empty values are not allowed.
    #[error("path variable {token} not implemented in this context: {template}")]
    Configuration { token: String, template: String },

    #[error("invalid {field} pattern `{pattern}`: {reason}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("upload of `{key}` failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: UploadError,
    },

    /// The transfer was abandoned because a sibling upload already failed.
    #[error("upload of `{key}` cancelled")]
    Cancelled { key: String },
}

pub type Result<T> = std::result::Result<T, PublishError>;
