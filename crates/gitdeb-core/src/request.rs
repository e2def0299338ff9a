//! Staging request passed through every pipeline operation

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Everything one staging run needs to know, fixed before the run starts.
///
/// Paths are stored as given; callers resolve them to absolute paths before
/// constructing the request so that no operation depends on the process
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingRequest {
    source_root: PathBuf,
    build_root: PathBuf,
    package_src_dir: PathBuf,
    build_binaries: bool,
    always_yes: bool,
}

impl StagingRequest {
    /// Create a source-only request that stages into `build_root/<package_dir_name>`
    pub fn new(
        source_root: impl Into<PathBuf>,
        build_root: impl Into<PathBuf>,
        package_dir_name: &str,
    ) -> Self {
        let build_root = build_root.into();
        Self {
            source_root: source_root.into(),
            package_src_dir: build_root.join(package_dir_name),
            build_root,
            build_binaries: false,
            always_yes: false,
        }
    }

    /// Also build binary packages
    pub fn with_binaries(mut self, build_binaries: bool) -> Self {
        self.build_binaries = build_binaries;
        self
    }

    /// Skip the confirmation prompt before clearing the build root
    pub fn with_always_yes(mut self, always_yes: bool) -> Self {
        self.always_yes = always_yes;
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Directory the repository is exported into and the packaging tool runs in
    pub fn package_src_dir(&self) -> &Path {
        &self.package_src_dir
    }

    pub fn build_binaries(&self) -> bool {
        self.build_binaries
    }

    pub fn always_yes(&self) -> bool {
        self.always_yes
    }
}
