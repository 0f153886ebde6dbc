//! Builds the candidate file list a publish run starts from.
//!
//! Two sources are supported: a JSON manifest written by the build tool, or a
//! plain output directory in which every file counts as emitted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use qn_publish_core::CandidateFile;
use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Build output as reported by the build tool.
#[derive(Debug, Deserialize)]
pub struct AssetManifest {
    /// Build identifier used for `[hash]` tokens.
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub assets: Vec<CandidateFile>,
}

/// Reads a manifest. Relative `source_path`s are resolved against the
/// manifest's own directory.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<AssetManifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read asset manifest {}", path.display()))?;
    let mut manifest: AssetManifest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse asset manifest {}", path.display()))?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    for asset in &mut manifest.assets {
        if asset.source_path.is_relative() {
            asset.source_path = base.join(&asset.source_path);
        }
    }

    info!(
        manifest = %path.display(),
        assets = manifest.assets.len(),
        hash_set = manifest.hash.is_some(),
        "Loaded asset manifest"
    );
    Ok(manifest)
}

/// Every regular file below `root`, named by its `/`-separated relative path,
/// in a stable (sorted) order. Symlinks are followed; a link keeps its own name.
pub fn scan_output_dir<P: AsRef<Path>>(root: P) -> Result<Vec<CandidateFile>> {
    let root = root.as_ref();
    let mut assets = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            if !entry.file_type().is_dir() {
                debug!(path = %entry.path().display(), "Skipping non-regular file");
            }
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", entry.path().display(), root.display()))?;
        let name = relative_name(relative);
        debug!(name = %name, "Found output file");
        assets.push(CandidateFile::new(name, true, PathBuf::from(entry.path())));
    }

    info!(root = %root.display(), assets = assets.len(), "Scanned output directory");
    Ok(assets)
}

fn relative_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
