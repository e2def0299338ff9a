//! Init command implementation

use std::path::PathBuf;

use color_eyre::eyre::{Context, Result};
use gitdeb_config::{Config, DEFAULT_CONFIG_FILE};
use gitdeb_core::ExclusionRule;
use tracing::info;

/// Init command implementation
pub struct InitCommand {
    output_path: PathBuf,
    force: bool,
}

impl InitCommand {
    pub fn new(output_path: Option<PathBuf>, force: bool) -> Self {
        Self { output_path: output_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)), force }
    }

    pub async fn execute(&self) -> Result<()> {
        info!("Initializing configuration file at {}", self.output_path.display());

        if self.output_path.exists() && !self.force {
            return Err(color_eyre::eyre::eyre!(
                "Configuration file already exists: {}. Use --force to overwrite.",
                self.output_path.display()
            ));
        }

        let config = Self::create_default_config();
        let yaml_content =
            serde_yaml::to_string(&config).with_context(|| "Failed to serialize config to YAML")?;
        std::fs::write(&self.output_path, yaml_content)
            .with_context(|| format!("Failed to write config to {}", self.output_path.display()))?;

        println!("✓ Created configuration file: {}", self.output_path.display());
        println!("\nNext steps:");
        println!("1. Edit the rewrites and exclusions to match your repository");
        println!("2. Run 'gitdeb validate -c {}' to check the setup", self.output_path.display());
        println!("3. Run 'gitdeb -c {}' to build the source package", self.output_path.display());

        Ok(())
    }

    /// Defaults with the usual git bookkeeping files excluded
    fn create_default_config() -> Config {
        Config {
            exclusions: vec![
                ExclusionRule::Name(".gitignore".to_string()),
                ExclusionRule::Name(".gitmodules".to_string()),
            ],
            ..Config::default()
        }
    }
}
