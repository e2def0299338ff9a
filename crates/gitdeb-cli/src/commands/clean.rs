//! Clean command implementation

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use gitdeb_core::Error;
use gitdeb_stage::{Confirm, StdinConfirm};
use tracing::info;

use super::CommonOptions;

/// Clean command implementation
pub struct CleanCommand {
    options: CommonOptions,
}

impl CleanCommand {
    pub fn new(options: CommonOptions) -> Self {
        Self { options }
    }

    pub async fn execute(&self) -> Result<()> {
        let working_dir = std::env::current_dir().context("Failed to get current directory")?;
        let config = self.options.load_config(&working_dir)?;
        config.check_build_root().context("Refusing to clean")?;

        Self::remove_build_root(&config.build_root, config.always_yes, &StdinConfirm)?;
        println!("✓ Cleanup completed");
        Ok(())
    }

    fn remove_build_root(build_root: &Path, always_yes: bool, confirm: &dyn Confirm) -> Result<()> {
        if !build_root.exists() {
            info!("Build root does not exist, nothing to clean: {}", build_root.display());
            return Ok(());
        }

        if !always_yes {
            let question = format!("Delete {}?", build_root.display());
            if !confirm.confirm(&question)? {
                return Err(Error::AbortedByUser { path: build_root.to_path_buf() }.into());
            }
        }

        info!("Removing build root: {}", build_root.display());
        std::fs::remove_dir_all(build_root)
            .with_context(|| format!("Failed to remove {}", build_root.display()))?;
        Ok(())
    }
}
