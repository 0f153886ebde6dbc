/// `load_config` module: Loads a static YAML config and injects secrets from the environment.
///
/// This module is the only place where user-supplied YAML is parsed into the
/// core [`PublishConfig`].
///
/// # Responsibilities
/// - Parse the config file into the strongly-typed core config
/// - Fill `access_key` / `secret_key` from `QINIU_ACCESS_KEY` / `QINIU_SECRET_KEY`
///   when the file leaves them out (a `.env` file is honoured)
/// - Reject configs without a bucket
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{bail, Context, Result};
use qn_publish_core::PublishConfig;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const ACCESS_KEY_VAR: &str = "QINIU_ACCESS_KEY";
pub const SECRET_KEY_VAR: &str = "QINIU_SECRET_KEY";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PublishConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(e).with_context(|| format!("Failed to read config file {:?}", path_ref));
        }
    };

    let mut config: PublishConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    inject_secrets(&mut config);

    if config.bucket.trim().is_empty() {
        error!(config_path = ?path_ref, "Config has an empty bucket");
        bail!("bucket must not be empty");
    }

    config.trace_loaded();
    Ok(config)
}

fn inject_secrets(config: &mut PublishConfig) {
    dotenvy::dotenv().ok();
    if config.access_key.is_empty() {
        if let Ok(key) = std::env::var(ACCESS_KEY_VAR) {
            info!("{ACCESS_KEY_VAR} found in env");
            config.access_key = key;
        }
    }
    if config.secret_key.is_empty() {
        if let Ok(key) = std::env::var(SECRET_KEY_VAR) {
            info!("{SECRET_KEY_VAR} found in env");
            config.secret_key = key;
        }
    }
}

/// Credentials are only needed once something is actually uploaded.
pub fn require_credentials(config: &PublishConfig) -> Result<()> {
    if config.access_key.is_empty() {
        bail!("access key missing: set access_key in the config or {ACCESS_KEY_VAR}");
    }
    if config.secret_key.is_empty() {
        bail!("secret key missing: set secret_key in the config or {SECRET_KEY_VAR}");
    }
    Ok(())
}
