//! Validate command implementation

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use gitdeb_config::Config;
use gitdeb_core::Error;
use gitdeb_stage::{read_package_metadata, SystemRunner, ToolCommand, ToolRunner};
use tracing::{error, info, warn};
use which::which;

use super::CommonOptions;

/// Tools needed for a source-only build
const REQUIRED_TOOLS: &[&str] = &["git", "dpkg-buildpackage", "dpkg-parsechangelog", "dpkg-source"];

/// Tools only needed for `--inspect`
const OPTIONAL_TOOLS: &[&str] = &["dpkg-deb"];

/// Validate command implementation
pub struct ValidateCommand {
    options: CommonOptions,
}

impl ValidateCommand {
    pub fn new(options: CommonOptions) -> Self {
        Self { options }
    }

    pub async fn execute(&self) -> Result<()> {
        info!("Validating configuration and source repository");

        let working_dir = std::env::current_dir().context("Failed to get current directory")?;
        let config = self.options.load_config(&working_dir)?;
        println!("✓ Configuration loaded successfully");

        let mut failures = 0usize;

        info!("Checking external tools");
        for tool in REQUIRED_TOOLS {
            match which(tool) {
                Ok(path) => println!("✓ {} found at {}", tool, path.display()),
                Err(_) => {
                    println!("✗ {} not found", tool);
                    failures += 1;
                }
            }
        }
        for tool in OPTIONAL_TOOLS {
            if which(tool).is_err() {
                warn!("{} not found, --inspect will not work", tool);
            }
        }

        if let Err(e) = config.validate() {
            println!("✗ {}", e);
            failures += 1;
        } else {
            println!("✓ Configuration is valid");
        }

        if Self::is_git_work_tree(&SystemRunner, &config.source_root) {
            println!("✓ Git work tree: {}", config.source_root.display());
        } else {
            println!("✗ Not a git work tree: {}", config.source_root.display());
            failures += 1;
        }

        if let Err(e) = Self::check_changelog(&SystemRunner, &config) {
            println!("✗ {:#}", e);
            failures += 1;
        }

        if failures > 0 {
            error!("Validation found {} problem(s)", failures);
            return Err(color_eyre::eyre::eyre!("Validation failed with {} problem(s)", failures));
        }

        println!("\n✨ Ready to build");
        Ok(())
    }

    fn is_git_work_tree(runner: &dyn ToolRunner, source_root: &Path) -> bool {
        let command = ToolCommand::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(source_root);
        match runner.output(&command) {
            Ok(output) => output.success() && output.stdout_text().trim() == "true",
            Err(_) => false,
        }
    }

    fn check_changelog(runner: &dyn ToolRunner, config: &Config) -> Result<()> {
        let changelog = config.changelog_path();
        if !changelog.is_file() {
            return Err(color_eyre::eyre::eyre!("Changelog not found: {}", changelog.display()));
        }

        match read_package_metadata(runner, &changelog) {
            Ok(package) => {
                println!("✓ Changelog: {} {}", package.source, package.version);
                println!("  Staging directory: {}", config.build_root.join(package.dir_name()).display());
            }
            // dpkg-parsechangelog missing is already reported by the tool check
            Err(e @ Error::ToolNotFound { .. }) => {
                warn!("Could not parse {}: {}", changelog.display(), e)
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Invalid changelog {}", changelog.display()));
            }
        }
        Ok(())
    }
}
