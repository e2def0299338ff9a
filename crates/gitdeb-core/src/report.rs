//! Staging run results

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::PackageMetadata;
use crate::submodule::SubmoduleRecord;

/// Kind of file produced by the packaging tool
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `.dsc` source control file
    SourceControl,

    /// Source tarball (`.orig.tar.*`, `.debian.tar.*`, `.tar.*`)
    SourceArchive,

    /// `.changes` upload description
    Changes,

    /// `.buildinfo` build record
    BuildInfo,

    /// Binary package (`.deb`, `.udeb`)
    Binary,

    /// Debug symbols package (`.ddeb` or `-dbgsym` `.deb`)
    DebugSymbols,
}

impl ArtifactKind {
    /// Classify a file name, returning `None` for files the packaging tool does not produce
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".dsc") {
            Some(Self::SourceControl)
        } else if name.ends_with(".changes") {
            Some(Self::Changes)
        } else if name.ends_with(".buildinfo") {
            Some(Self::BuildInfo)
        } else if name.ends_with(".ddeb") || (name.ends_with(".deb") && name.contains("-dbgsym_")) {
            Some(Self::DebugSymbols)
        } else if name.ends_with(".deb") || name.ends_with(".udeb") {
            Some(Self::Binary)
        } else if [".tar.gz", ".tar.xz", ".tar.bz2", ".tar.lzma", ".tar.zst"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Some(Self::SourceArchive)
        } else {
            None
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary | Self::DebugSymbols)
    }
}

/// A file the packaging tool left in the build root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildArtifact {
    /// Absolute path of the artifact
    pub path: PathBuf,

    /// Artifact classification
    pub kind: ArtifactKind,

    /// File size in bytes
    pub size: u64,

    /// Lowercase hex SHA-256 digest
    pub sha256: String,
}

impl BuildArtifact {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()?.to_str()
    }

    /// Parse `name_version_arch` from a binary package file name
    pub fn binary_fields(&self) -> Option<(&str, &str, &str)> {
        if !self.kind.is_binary() {
            return None;
        }
        let stem = self.file_name()?.rsplit_once('.')?.0;
        let mut parts = stem.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(version), Some(arch)) => Some((name, version, arch)),
            _ => None,
        }
    }
}

/// Summary of a completed staging run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingReport {
    /// Package that was staged
    pub package: PackageMetadata,

    /// Whether binary packages were requested
    pub build_binaries: bool,

    /// Staging directory the packaging tool ran in
    pub package_src_dir: PathBuf,

    /// Nested repositories exported alongside the top-level tree
    pub submodules: Vec<SubmoduleRecord>,

    /// Top-level entries removed by exclusion rules
    pub removed_entries: Vec<String>,

    /// Files produced by the packaging tool
    pub artifacts: Vec<BuildArtifact>,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Run end time
    pub finished_at: DateTime<Utc>,

    /// Duration in seconds
    pub duration_secs: f64,
}

impl StagingReport {
    /// Start a report for `package`; timings are filled in by [`Self::finish`]
    pub fn new(package: PackageMetadata, build_binaries: bool, package_src_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            package,
            build_binaries,
            package_src_dir,
            submodules: Vec::new(),
            removed_entries: Vec::new(),
            artifacts: Vec::new(),
            started_at: now,
            finished_at: now,
            duration_secs: 0.0,
        }
    }

    /// Mark the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
        self.duration_secs =
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Human readable summary
    pub fn summary(&self) -> String {
        let total_size: u64 = self.artifacts.iter().map(|a| a.size).sum();
        let mut summary = format!(
            "Staged {} {} ({} submodule(s), {} excluded entr{}) in {:.1}s\n",
            self.package.source,
            self.package.version,
            self.submodules.len(),
            self.removed_entries.len(),
            if self.removed_entries.len() == 1 { "y" } else { "ies" },
            self.duration_secs
        );
        for artifact in &self.artifacts {
            summary.push_str(&format!(
                "  - {} ({:.2} MB)\n",
                artifact.file_name().unwrap_or("unknown"),
                artifact.size as f64 / 1_048_576.0
            ));
        }
        summary.push_str(&format!(
            "Total: {} artifacts, {:.2} MB",
            self.artifacts.len(),
            total_size as f64 / 1_048_576.0
        ));
        summary
    }
}
