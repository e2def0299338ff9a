//! CLI command implementations

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Report, Result};
use gitdeb_config::Config;

pub mod build;
pub mod clean;
pub mod init;
pub mod validate;

pub use build::BuildCommand;
pub use clean::CleanCommand;
pub use init::InitCommand;
pub use validate::ValidateCommand;

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    pub config_path: Option<PathBuf>,
    pub source: Option<PathBuf>,
    pub build_root: Option<PathBuf>,
    pub always_yes: bool,
}

impl CommonOptions {
    /// Load the configuration, apply command line overrides and resolve all paths
    pub fn load_config(&self, working_dir: &Path) -> Result<Config> {
        let mut config = Config::load(self.config_path.as_deref(), working_dir)
            .wrap_err("Failed to load configuration")?;

        if let Some(source) = &self.source {
            config.source_root = working_dir.join(source);
        }
        if let Some(build_root) = &self.build_root {
            config.build_root = working_dir.join(build_root);
        }
        config.always_yes |= self.always_yes;

        config.resolve_paths(working_dir);
        Ok(config)
    }
}

/// Exit code for a failed command: the typed error's code when there is one, else 1
pub fn exit_code(report: &Report) -> i32 {
    report
        .chain()
        .find_map(|e| e.downcast_ref::<gitdeb_core::Error>())
        .map(gitdeb_core::Error::exit_code)
        .unwrap_or(1)
}
