#![doc = "Qiniu uploader: bridges the core `Uploader` trait to Qiniu's form upload API."]
//
//! # Qiniu client (CLI <-> Core)
//!
//! This module provides [`QiniuClient`], the concrete [`Uploader`] used by the
//! CLI. One client is built per run from the loaded [`PublishConfig`] and
//! passed by reference into every upload; nothing is stored process-wide.
//!
//! - Upload tokens are signed locally (HMAC-SHA1 over a url-safe base64 put
//!   policy scoped to `bucket:key`).
//! - With `auto_zone`, the bucket's upload host is discovered once from the
//!   UC query endpoint and cached on the client.
//! - Each `put_file` is a single multipart POST; errors carry the provider's
//!   status and `error` message.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tokio::sync::OnceCell;

pub use qn_publish_core::contract::{PutExtra, PutResponse, UploadToken};
use qn_publish_core::contract::Uploader;
use qn_publish_core::{PublishConfig, UploadError};

pub const DEFAULT_UP_HOST: &str = "https://up.qiniup.com";
pub const DEFAULT_UC_HOST: &str = "https://uc.qbox.me";

/// Lifetime of an upload token, in seconds.
pub const TOKEN_TTL_SECS: i64 = 3600;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for one whole request, body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

type HmacSha1 = Hmac<Sha1>;

/// Access/secret key pair for one Qiniu account.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct PutPolicy<'a> {
    scope: &'a str,
    deadline: i64,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    fn ensure_present(&self) -> Result<(), UploadError> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(UploadError::Credential(
                "access key and secret key are required".into(),
            ));
        }
        Ok(())
    }

    /// url-safe base64 of HMAC-SHA1(secret_key, data).
    pub fn sign(&self, data: &[u8]) -> Result<String, UploadError> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| UploadError::Credential(e.to_string()))?;
        mac.update(data);
        Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    /// Token for uploading exactly `scope` (`bucket:key`) until `deadline`.
    pub fn upload_token(&self, scope: &str, deadline: i64) -> Result<UploadToken, UploadError> {
        self.ensure_present()?;
        let policy = serde_json::to_vec(&PutPolicy { scope, deadline })
            .map_err(|e| UploadError::Credential(e.to_string()))?;
        let encoded = URL_SAFE.encode(policy);
        let signature = self.sign(encoded.as_bytes())?;
        Ok(UploadToken::new(format!(
            "{}:{}:{}",
            self.access_key, signature, encoded
        )))
    }
}

/// Where uploads are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zone {
    /// Ask the UC service which upload host serves the bucket.
    Auto { uc_host: String },
    Fixed { up_host: String },
}

impl Zone {
    pub fn from_config(config: &PublishConfig) -> Self {
        if config.auto_zone {
            Zone::Auto {
                uc_host: config
                    .uc_host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_UC_HOST.to_string()),
            }
        } else {
            Zone::Fixed {
                up_host: config
                    .up_host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_UP_HOST.to_string()),
            }
        }
    }
}

#[derive(Deserialize)]
struct ZoneQuery {
    up: UpDomains,
}

#[derive(Deserialize)]
struct UpDomains {
    #[serde(default)]
    acc: Option<DomainList>,
    #[serde(default)]
    src: Option<DomainList>,
}

#[derive(Deserialize)]
struct DomainList {
    #[serde(default)]
    main: Vec<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    error: String,
}

fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

fn transport(e: reqwest::Error) -> UploadError {
    UploadError::Transport(e.to_string())
}

async fn provider_failure(response: reqwest::Response) -> UploadError {
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return transport(e),
    };
    let message = serde_json::from_str::<ProviderError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    UploadError::Provider { status, message }
}

pub struct QiniuClient {
    http: reqwest::Client,
    credentials: Credentials,
    bucket: String,
    zone: Zone,
    up_host: OnceCell<String>,
}

impl QiniuClient {
    pub fn new(credentials: Credentials, bucket: impl Into<String>, zone: Zone) -> Result<Self, UploadError> {
        Self::with_timeout(credentials, bucket, zone, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`QiniuClient::new`], failing any request that takes longer than `timeout`.
    pub fn with_timeout(
        credentials: Credentials,
        bucket: impl Into<String>,
        zone: Zone,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .user_agent(concat!("qn-publish/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        let bucket = bucket.into();
        tracing::info!(
            bucket = %bucket,
            zone = ?zone,
            timeout_secs = timeout.as_secs(),
            access_key_set = !credentials.access_key().is_empty(),
            "Initialized QiniuClient"
        );
        Ok(Self {
            http,
            credentials,
            bucket,
            zone,
            up_host: OnceCell::new(),
        })
    }

    pub fn from_config(config: &PublishConfig) -> Result<Self, UploadError> {
        Self::with_timeout(
            Credentials::new(&config.access_key, &config.secret_key),
            &config.bucket,
            Zone::from_config(config),
            config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        )
    }

    /// Upload host for this client's bucket, resolved once.
    pub async fn up_host(&self) -> Result<&str, UploadError> {
        let host = self
            .up_host
            .get_or_try_init(|| async {
                match &self.zone {
                    Zone::Fixed { up_host } => Ok(with_scheme(up_host)),
                    Zone::Auto { uc_host } => self.query_up_host(uc_host).await,
                }
            })
            .await?;
        Ok(host.as_str())
    }

    async fn query_up_host(&self, uc_host: &str) -> Result<String, UploadError> {
        let url = format!("{}/v2/query", with_scheme(uc_host));
        tracing::info!(url = %url, bucket = %self.bucket, "Querying upload zone");
        let response = self
            .http
            .get(&url)
            .query(&[
                ("ak", self.credentials.access_key()),
                ("bucket", self.bucket.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let err = provider_failure(response).await;
            tracing::error!(error = %err, bucket = %self.bucket, "Zone query failed");
            return Err(err);
        }

        let query: ZoneQuery = response
            .json()
            .await
            .map_err(|e| UploadError::Decode(e.to_string()))?;
        let host = query
            .up
            .acc
            .and_then(|d| d.main.into_iter().next())
            .or_else(|| query.up.src.and_then(|d| d.main.into_iter().next()))
            .ok_or_else(|| UploadError::Decode("zone query returned no upload host".into()))?;
        let host = with_scheme(&host);
        tracing::info!(up_host = %host, bucket = %self.bucket, "Resolved upload zone");
        Ok(host)
    }
}

#[async_trait]
impl Uploader for QiniuClient {
    fn upload_token(&self, scope: &str) -> Result<UploadToken, UploadError> {
        let deadline = chrono::Utc::now().timestamp() + TOKEN_TTL_SECS;
        self.credentials.upload_token(scope, deadline)
    }

    async fn put_file(
        &self,
        token: &UploadToken,
        key: &str,
        local_path: &Path,
        extra: &PutExtra,
    ) -> Result<PutResponse, UploadError> {
        let host = self.up_host().await?;
        let content = tokio::fs::read(local_path).await.map_err(|e| {
            tracing::error!(error = ?e, path = %local_path.display(), "Failed to read file for upload");
            e
        })?;
        let size = content.len();

        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());
        let mut part = Part::bytes(content).file_name(file_name);
        if let Some(mime) = &extra.mime_type {
            part = part
                .mime_str(mime)
                .map_err(|e| UploadError::Transport(e.to_string()))?;
        }

        let mut form = Form::new()
            .text("token", token.as_str().to_string())
            .text("key", key.to_string());
        for (name, value) in &extra.params {
            form = form.text(format!("x:{name}"), value.clone());
        }
        let form = form.part("file", part);

        tracing::debug!(key, size, up_host = %host, "Posting file");
        let response = self
            .http
            .post(host)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(provider_failure(response).await);
        }

        response
            .json::<PutResponse>()
            .await
            .map_err(|e| UploadError::Decode(e.to_string()))
    }
}
