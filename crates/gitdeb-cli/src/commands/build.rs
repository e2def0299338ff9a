//! Build command implementation

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Context, Result};
use gitdeb_core::{StagingReport, StagingRequest};
use gitdeb_stage::{describe_deb, PackageStager, SpinnerProgress, StagingPlan, SystemRunner};
use tracing::{info, warn};

use super::CommonOptions;

/// Build command implementation
pub struct BuildCommand {
    options: CommonOptions,
    build_binaries: bool,
    inspect: bool,
}

impl BuildCommand {
    pub fn new(options: CommonOptions, build_binaries: bool, inspect: bool) -> Self {
        Self { options, build_binaries, inspect }
    }

    pub async fn execute(&self) -> Result<()> {
        info!("Starting package staging");

        let working_dir = std::env::current_dir().context("Failed to get current directory")?;
        let config = self.options.load_config(&working_dir)?;
        config.validate().wrap_err("Invalid configuration")?;
        let plan = StagingPlan::from_config(&config)?;

        info!("Source repository: {}", config.source_root.display());
        info!("Build root: {}", config.build_root.display());

        let build_binaries = self.build_binaries;
        let report = tokio::task::spawn_blocking(move || -> gitdeb_core::Result<StagingReport> {
            let stager = PackageStager::from_config(Arc::new(SystemRunner), &config)
                .with_progress(Box::new(SpinnerProgress::new()));

            let package = stager.read_package_metadata(&config.changelog_path())?;
            let request =
                StagingRequest::new(&config.source_root, &config.build_root, &package.dir_name())
                    .with_binaries(build_binaries)
                    .with_always_yes(config.always_yes);

            stager.run(&request, &package, &plan)
        })
        .await
        .map_err(|e| eyre!("Staging task failed: {e}"))??;

        println!("\n{}", report.summary());

        if self.inspect {
            Self::inspect_binaries(&report);
        }

        println!("\n✨ Package staged in {}", report.package_src_dir.display());
        Ok(())
    }

    fn inspect_binaries(report: &StagingReport) {
        let binaries: Vec<PathBuf> = report
            .artifacts
            .iter()
            .filter(|a| a.kind.is_binary())
            .map(|a| a.path.clone())
            .collect();

        if binaries.is_empty() {
            println!("No binary packages to inspect");
            return;
        }

        for deb in binaries {
            match describe_deb(&SystemRunner, &deb) {
                Ok(fields) => {
                    println!("{}", deb.display());
                    for (key, value) in fields {
                        println!("  {key}: {value}");
                    }
                }
                Err(e) => warn!("Failed to inspect {}: {}", deb.display(), e),
            }
        }
    }
}
