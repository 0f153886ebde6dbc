#![doc = "qn-publish-core: upload orchestration for publishing build output to Qiniu."]

//! This crate holds everything that does not touch the network: path
//! templates, asset selection, the per-file upload task and the concurrent
//! coordinator. The storage provider is reached through the
//! [`contract::Uploader`] trait, implemented by the CLI crate.
//!
//! # Usage
//! Build [`config::PublishOptions`], hand the build's candidate files to
//! [`publish::publish`] together with an uploader and a progress sink.

pub mod config;
pub mod contract;
pub mod error;
pub mod progress;
pub mod publish;
pub mod select;
pub mod task;
pub mod template;

pub use config::{PatternSpec, PublishConfig, PublishOptions};
pub use contract::{CandidateFile, PutExtra, PutResponse, UploadToken, Uploader};
pub use error::{PublishError, UploadError};
pub use progress::{LogProgress, Phase, ProgressSink, ProgressSnapshot};
pub use publish::{plan, publish, PublishReport};
pub use select::{select_assets, AssetMatcher, Predicate, SelectionFilter};
pub use task::{remote_key, UploadOutcome, UploadTask};
pub use template::resolve_template;
