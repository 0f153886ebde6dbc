use std::collections::BTreeMap;

use globset::Glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::PutExtra;
use crate::error::{PublishError, Result};
use crate::select::{AssetMatcher, SelectionFilter};
use crate::template::DEFAULT_PATH_TEMPLATE;

/// Recognised publisher options, as read from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    pub bucket: String,
    /// Key-prefix template, e.g. `static/[hash:8]`.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub exclude: Option<PatternSpec>,
    #[serde(default)]
    pub include: Option<PatternSpec>,
    /// Discover the bucket's upload host instead of using `up_host`.
    #[serde(default = "default_true")]
    pub auto_zone: bool,
    #[serde(default)]
    pub up_host: Option<String>,
    #[serde(default)]
    pub uc_host: Option<String>,
    /// Per-request limit for provider calls, in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Resolve hash tokens to "" when no build hash is available.
    #[serde(default)]
    pub allow_empty_hash: bool,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_path() -> String {
    DEFAULT_PATH_TEMPLATE.to_string()
}

fn default_true() -> bool {
    true
}

impl PublishConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: bucket.into(),
            path: default_path(),
            exclude: None,
            include: None,
            auto_zone: true,
            up_host: None,
            uc_host: None,
            request_timeout_secs: None,
            allow_empty_hash: false,
            mime_type: None,
            params: BTreeMap::new(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            path = %self.path,
            exclude = ?self.exclude,
            include = ?self.include,
            auto_zone = self.auto_zone,
            access_key_set = !self.access_key.is_empty(),
            secret_key_set = !self.secret_key.is_empty(),
            "Loaded PublishConfig"
        );
        debug!(up_host = ?self.up_host, uc_host = ?self.uc_host, request_timeout_secs = ?self.request_timeout_secs, params = ?self.params, "PublishConfig transport settings");
    }
}

/// An include/exclude pattern.
///
/// A bare string is a regular expression; `{ glob: "..." }` is a glob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Regex(String),
    Glob { glob: String },
}

impl PatternSpec {
    pub fn compile(&self, field: &'static str) -> Result<Box<dyn AssetMatcher>> {
        match self {
            PatternSpec::Regex(pattern) => Regex::new(pattern)
                .map(|re| Box::new(re) as Box<dyn AssetMatcher>)
                .map_err(|e| PublishError::InvalidPattern {
                    field,
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }),
            PatternSpec::Glob { glob } => Glob::new(glob)
                .map(|g| Box::new(g.compile_matcher()) as Box<dyn AssetMatcher>)
                .map_err(|e| PublishError::InvalidPattern {
                    field,
                    pattern: glob.clone(),
                    reason: e.to_string(),
                }),
        }
    }
}

/// Everything the coordinator needs for one run, with patterns compiled.
#[derive(Debug)]
pub struct PublishOptions {
    pub bucket: String,
    pub path: String,
    pub allow_empty_hash: bool,
    pub filter: SelectionFilter,
    pub extra: PutExtra,
}

impl PublishOptions {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: default_path(),
            allow_empty_hash: false,
            filter: SelectionFilter::default(),
            extra: PutExtra::default(),
        }
    }

    pub fn from_config(config: &PublishConfig) -> Result<Self> {
        let exclude = config
            .exclude
            .as_ref()
            .map(|p| p.compile("exclude"))
            .transpose()?;
        let include = config
            .include
            .as_ref()
            .map(|p| p.compile("include"))
            .transpose()?;

        Ok(Self {
            bucket: config.bucket.clone(),
            path: config.path.clone(),
            allow_empty_hash: config.allow_empty_hash,
            filter: SelectionFilter::with_boxed(exclude, include),
            extra: PutExtra {
                mime_type: config.mime_type.clone(),
                params: config.params.clone(),
            },
        })
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_filter(mut self, filter: SelectionFilter) -> Self {
        self.filter = filter;
        self
    }
}
