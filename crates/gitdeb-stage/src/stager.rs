//! The staging pipeline
//!
//! [`PackageStager::run`] performs, strictly in order:
//! 1. clear the build root (asking first unless told not to)
//! 2. export the repository and its initialized submodules
//! 3. apply the rewrite rules
//! 4. apply the exclusion rules
//! 5. run the packaging tool in the staging directory
//! 6. collect the produced artifacts and write a JSON report
//!
//! Any failure stops the run. Nothing is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitdeb_config::Config;
use gitdeb_core::error::{Error, Result};
use gitdeb_core::{
    ExclusionSet, PackageMetadata, RewriteRule, StagingReport, StagingRequest, SubmoduleRecord,
};
use tracing::{debug, info, warn};

use crate::artifact::{collect_artifacts, REPORT_FILE_NAME};
use crate::debian::{packaging_command, read_package_metadata};
use crate::git::{archive_tree, list_submodules};
use crate::progress::{NoOpProgress, Stage, StageProgress};
use crate::prompt::{Confirm, StdinConfirm};
use crate::runner::{SystemRunner, ToolRunner};

/// What to do to the exported tree before packaging it
#[derive(Debug, Clone, Default)]
pub struct StagingPlan {
    /// Moves, applied in order
    pub rewrites: Vec<RewriteRule>,
    /// Top-level entries to delete afterwards
    pub exclusions: ExclusionSet,
}

impl StagingPlan {
    pub fn from_config(config: &Config) -> Result<Self> {
        for rule in &config.rewrites {
            rule.validate()?;
        }
        Ok(Self { rewrites: config.rewrites.clone(), exclusions: config.exclusion_set()? })
    }
}

/// Stages a git repository into a clean directory and packages it
pub struct PackageStager {
    runner: Arc<dyn ToolRunner>,
    confirm: Box<dyn Confirm>,
    progress: Box<dyn StageProgress>,
    packaging_tool: String,
    packaging_args: Vec<String>,
    cleanup_on_failure: bool,
}

impl Default for PackageStager {
    fn default() -> Self {
        Self::new(Arc::new(SystemRunner))
    }
}

impl PackageStager {
    /// Create a stager using `dpkg-buildpackage -us -uc` and an interactive prompt
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        let defaults = Config::default();
        Self {
            runner,
            confirm: Box::new(StdinConfirm),
            progress: Box::new(NoOpProgress),
            packaging_tool: defaults.packaging_tool,
            packaging_args: defaults.packaging_args,
            cleanup_on_failure: defaults.cleanup_on_failure,
        }
    }

    /// Create a stager with the packaging settings of `config`
    pub fn from_config(runner: Arc<dyn ToolRunner>, config: &Config) -> Self {
        Self::new(runner)
            .with_packaging_tool(config.packaging_tool.clone(), config.packaging_args.clone())
            .with_cleanup_on_failure(config.cleanup_on_failure)
    }

    pub fn with_confirm(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn StageProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_packaging_tool(mut self, tool: impl Into<String>, args: Vec<String>) -> Self {
        self.packaging_tool = tool.into();
        self.packaging_args = args;
        self
    }

    /// Remove the build root if a step after clearing it fails
    pub fn with_cleanup_on_failure(mut self, cleanup: bool) -> Self {
        self.cleanup_on_failure = cleanup;
        self
    }

    pub fn runner(&self) -> &dyn ToolRunner {
        self.runner.as_ref()
    }

    /// Read the package name and version from `changelog`
    pub fn read_package_metadata(&self, changelog: &Path) -> Result<PackageMetadata> {
        self.tracked(Stage::Metadata, || read_package_metadata(self.runner(), changelog))
    }

    /// Leave an empty directory at `path`, deleting whatever was there.
    ///
    /// An existing path is only deleted after confirmation unless
    /// `always_yes` is set; a declined prompt leaves it untouched.
    pub fn prepare_clean_directory(&self, path: &Path, always_yes: bool) -> Result<()> {
        if let Ok(metadata) = fs::symlink_metadata(path) {
            if !always_yes {
                let question = format!("{} already exists. Delete it?", path.display());
                if !self.confirm.confirm(&question)? {
                    return Err(Error::AbortedByUser { path: path.to_path_buf() });
                }
            }

            if metadata.is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
            info!("Removed {}", path.display());
        }

        fs::create_dir_all(path)?;
        Ok(())
    }

    /// Export `HEAD` of `source_root` and every initialized submodule into `dest_dir`
    pub fn export_repository(
        &self,
        source_root: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<SubmoduleRecord>> {
        info!("Exporting {} into {}", source_root.display(), dest_dir.display());
        archive_tree(self.runner(), source_root, "HEAD", dest_dir)?;

        let submodules = list_submodules(self.runner(), source_root)?;
        for submodule in &submodules {
            info!("Exporting submodule {}", submodule);
            archive_tree(
                self.runner(),
                &source_root.join(&submodule.path),
                &submodule.commit_id,
                &dest_dir.join(&submodule.path),
            )?;
        }

        Ok(submodules)
    }

    /// Apply each move in order; a missing source or an occupied destination fails
    pub fn apply_rewrites(&self, dest_dir: &Path, rules: &[RewriteRule]) -> Result<()> {
        for rule in rules {
            rule.validate()?;
            let from = dest_dir.join(&rule.from);
            let to = dest_dir.join(&rule.to);

            reject_symlinked_parents(dest_dir, &rule.from)?;
            reject_symlinked_parents(dest_dir, &rule.to)?;

            if fs::symlink_metadata(&from).is_err() {
                return Err(Error::rewrite(&rule.from, "source path does not exist"));
            }
            if fs::symlink_metadata(&to).is_ok() {
                return Err(Error::rewrite(&rule.to, "destination already exists"));
            }

            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&from, &to).map_err(|e| Error::rewrite(&rule.from, e.to_string()))?;
            debug!("Moved {}", rule);
        }
        Ok(())
    }

    /// Delete matching, unprotected top-level entries in name order; returns their names
    pub fn apply_exclusions(&self, dest_dir: &Path, exclusions: &ExclusionSet) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(dest_dir)?
            .map(|entry| entry.map(|e| (e.file_name().to_string_lossy().into_owned(), e.path())))
            .collect::<std::io::Result<Vec<(String, PathBuf)>>>()?;
        entries.sort();

        let mut removed = Vec::new();
        for (name, path) in entries {
            if !exclusions.should_remove(&name) {
                if exclusions.matches(&name) {
                    debug!("Keeping protected entry {}", name);
                }
                continue;
            }

            if fs::symlink_metadata(&path)?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            debug!("Excluded {}", name);
            removed.push(name);
        }

        Ok(removed)
    }

    /// Run the packaging tool in `dest_dir`; source-only unless `build_binaries`
    pub fn invoke_packaging_tool(&self, dest_dir: &Path, build_binaries: bool) -> Result<i32> {
        let command =
            packaging_command(&self.packaging_tool, &self.packaging_args, build_binaries, dest_dir);
        info!("Running {} in {}", command, dest_dir.display());

        match self.runner.status(&command)? {
            0 => Ok(0),
            exit_code => Err(Error::ExternalToolFailure {
                tool: self.packaging_tool.clone(),
                exit_code,
            }),
        }
    }

    /// Run the whole pipeline for `request`
    pub fn run(
        &self,
        request: &StagingRequest,
        package: &PackageMetadata,
        plan: &StagingPlan,
    ) -> Result<StagingReport> {
        let mut report = StagingReport::new(
            package.clone(),
            request.build_binaries(),
            request.package_src_dir().to_path_buf(),
        );

        self.tracked(Stage::Prepare, || {
            self.prepare_clean_directory(request.build_root(), request.always_yes())
        })?;

        if let Err(e) = self.stage_and_package(request, plan, &mut report) {
            self.handle_failure(request.build_root());
            return Err(e);
        }

        report.finish();
        report.write_json(&request.build_root().join(REPORT_FILE_NAME))?;
        info!("Staging of {} {} finished", package.source, package.version);
        Ok(report)
    }

    fn stage_and_package(
        &self,
        request: &StagingRequest,
        plan: &StagingPlan,
        report: &mut StagingReport,
    ) -> Result<()> {
        let dest_dir = request.package_src_dir();

        report.submodules = self.tracked(Stage::Export, || {
            self.export_repository(request.source_root(), dest_dir)
        })?;
        self.tracked(Stage::Rewrite, || self.apply_rewrites(dest_dir, &plan.rewrites))?;
        report.removed_entries =
            self.tracked(Stage::Exclude, || self.apply_exclusions(dest_dir, &plan.exclusions))?;
        self.tracked(Stage::Package, || {
            self.invoke_packaging_tool(dest_dir, request.build_binaries())
        })?;
        let source = report.package.source.clone();
        report.artifacts =
            self.tracked(Stage::Collect, || collect_artifacts(request.build_root(), &source))?;

        Ok(())
    }

    fn handle_failure(&self, build_root: &Path) {
        if !self.cleanup_on_failure {
            warn!("Leaving partially staged build root in place: {}", build_root.display());
            return;
        }

        match fs::remove_dir_all(build_root) {
            Ok(()) => info!("Removed partially staged build root {}", build_root.display()),
            Err(e) => warn!("Failed to remove {}: {}", build_root.display(), e),
        }
    }

    fn tracked<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.progress.stage_started(stage);
        let result = f();
        match &result {
            Ok(_) => self.progress.stage_finished(stage),
            Err(_) => self.progress.stage_failed(stage),
        }
        result
    }
}

/// Fail if a directory above `relative` inside `dest_dir` is a symlink.
///
/// The final component may itself be a link; `rename` moves the link, not its target.
fn reject_symlinked_parents(dest_dir: &Path, relative: &Path) -> Result<()> {
    let Some(parent) = relative.parent() else {
        return Ok(());
    };

    let mut current = dest_dir.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(Error::rewrite(
                    relative,
                    format!("{current:?} is a symlink and may point outside the staging directory"),
                ));
            }
            Ok(_) => {}
            // missing parents are created as plain directories
            Err(_) => break,
        }
    }
    Ok(())
}
