///
/// This module implements the CLI interface for qn-publish: command parsing,
/// candidate discovery and the user-visible summary.
///
/// All upload orchestration lives in [`qn-publish-core`]. This module is glue:
/// it loads config, builds the candidate list, constructs the Qiniu client and
/// hands everything to [`publish`].
///
/// ## How To Use
/// - Command line: `qn-publish publish --config qiniu.yaml --dir dist --hash $BUILD_HASH`
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`qn-publish-core`]: ../../qn-publish-core/
use crate::assets::{load_manifest, scan_output_dir};
use crate::load_config::{load_config, require_credentials};
use crate::progress::SpinnerProgress;
use crate::upload::QiniuClient;
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use qn_publish_core::publish::{is_configuration_error, plan, publish};
use qn_publish_core::{remote_key, CandidateFile, LogProgress, ProgressSink, PublishOptions};
use std::io::IsTerminal;
use std::path::PathBuf;

/// CLI for qn-publish: upload build output to a Qiniu bucket.
#[derive(Parser)]
#[clap(
    name = "qn-publish",
    version,
    about = "Upload emitted build assets to a Qiniu bucket under a hashed key prefix"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the selected build output using the given config file
    #[clap(group(ArgGroup::new("source").required(true).args(["manifest", "dir"])))]
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,

        /// JSON manifest listing the build's output files and hash
        #[clap(long)]
        manifest: Option<PathBuf>,

        /// Output directory; every file below it is treated as emitted
        #[clap(long)]
        dir: Option<PathBuf>,

        /// Build identifier used for `[hash]` tokens (overrides the manifest)
        #[clap(long)]
        hash: Option<String>,

        /// Print the remote keys that would be uploaded and exit
        #[clap(long)]
        dry_run: bool,
    },
}

fn collect_candidates(
    manifest: Option<PathBuf>,
    dir: Option<PathBuf>,
    hash: Option<String>,
) -> Result<(Vec<CandidateFile>, Option<String>)> {
    match (manifest, dir) {
        (Some(path), _) => {
            let manifest = load_manifest(path)?;
            Ok((manifest.assets, hash.or(manifest.hash)))
        }
        (None, Some(dir)) => Ok((scan_output_dir(dir)?, hash)),
        (None, None) => anyhow::bail!("either --manifest or --dir is required"),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Publish {
            config,
            manifest,
            dir,
            hash,
            dry_run,
        } => {
            tracing::info!(command = "publish", config = ?config, dry_run, "publish_requested");
            let config = load_config(config)?;
            let options = PublishOptions::from_config(&config)?;
            let (assets, hash) = collect_candidates(manifest, dir, hash)?;

            if dry_run {
                let (prefix, selected) = plan(&options, &assets, hash.as_deref())?;
                tracing::info!(command = "publish", selected = selected.len(), prefix = %prefix, "Dry run");
                for file in &selected {
                    println!("{} -> {}", file.name, remote_key(&prefix, &file.name));
                }
                println!("{} of {} files selected", selected.len(), assets.len());
                return Ok(());
            }

            require_credentials(&config)?;
            let client = QiniuClient::from_config(&config)
                .context("Failed to construct Qiniu client")?;
            // Plain log lines when stderr is not a terminal (CI logs).
            let sink: Box<dyn ProgressSink> = if std::io::stderr().is_terminal() {
                Box::new(SpinnerProgress::new())
            } else {
                Box::new(LogProgress)
            };

            match publish(&client, &options, &assets, hash.as_deref(), sink.as_ref()).await {
                Ok(report) => {
                    tracing::info!(command = "publish", uploaded = report.uploaded(), "Publish complete");
                    for outcome in &report.outcomes {
                        println!("{} -> {} ({} ms)", outcome.name, outcome.key, outcome.duration_ms());
                    }
                    println!(
                        "Published {} files to {}/{} in {:.2}s",
                        report.uploaded(),
                        config.bucket,
                        report.prefix,
                        report.elapsed.as_secs_f64()
                    );
                    Ok(())
                }
                Err(e) => {
                    let kind = if is_configuration_error(&e) {
                        "configuration"
                    } else {
                        "upload"
                    };
                    tracing::error!(command = "publish", kind, error = %e, "Publish failed");
                    Err(anyhow::Error::new(e).context(format!("Publish failed ({kind} error)")))
                }
            }
        }
    }
}
