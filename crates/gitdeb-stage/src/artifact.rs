//! Collection of the files the packaging tool leaves in the build root

use std::fs;
use std::path::Path;

use gitdeb_core::error::Result;
use gitdeb_core::{ArtifactKind, BuildArtifact};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

/// Report written next to the artifacts after a successful run
pub const REPORT_FILE_NAME: &str = "gitdeb-report.json";

/// Collect the artifacts for `source` directly inside `build_root`, sorted by name.
///
/// Source artifacts are recognized by their `<source>_` prefix; binary
/// packages are collected whatever their name, since one source package may
/// produce binaries with other names.
pub fn collect_artifacts(build_root: &Path, source: &str) -> Result<Vec<BuildArtifact>> {
    let prefix = format!("{source}_");
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(build_root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some(kind) = ArtifactKind::from_file_name(name) else {
            continue;
        };
        if !kind.is_binary() && !name.starts_with(&prefix) {
            continue;
        }

        let content = fs::read(entry.path())?;
        let sha256 = format!("{:x}", Sha256::digest(&content));
        debug!("Found artifact: {} ({} bytes)", name, content.len());

        artifacts.push(BuildArtifact {
            path: entry.path().to_path_buf(),
            kind,
            size: content.len() as u64,
            sha256,
        });
    }

    Ok(artifacts)
}
