//! Main CLI entry point for gitdeb

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

mod commands;

/// gitdeb - Build a Debian source package from a git repository and its submodules
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Build binary packages too (default: source package only)
    #[arg(short = 'B', long)]
    binaries: bool,

    /// Query each built .deb with dpkg-deb and print its metadata
    #[arg(long)]
    inspect: bool,

    /// Delete an existing build root without asking
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Source repository (overrides the configuration file)
    #[arg(short = 'C', long = "source", global = true, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Build root (overrides the configuration file)
    #[arg(short = 'o', long, global = true, value_name = "DIR")]
    build_root: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Remove the build root
    Clean,

    /// Check external tools and the source repository
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // Printing can only fail if the terminal is gone
            let _ = e.print();
            std::process::exit(code);
        }
    };

    color_eyre::install()?;
    setup_logging(cli.verbose, cli.quiet);

    let options = commands::CommonOptions {
        config_path: cli.config,
        source: cli.source,
        build_root: cli.build_root,
        always_yes: cli.yes,
    };

    let result = match cli.command {
        None => {
            let command = commands::BuildCommand::new(options, cli.binaries, cli.inspect);
            command.execute().await
        }

        Some(Commands::Init { force }) => {
            let command = commands::InitCommand::new(options.config_path, force);
            command.execute().await
        }

        Some(Commands::Clean) => {
            let command = commands::CleanCommand::new(options);
            command.execute().await
        }

        Some(Commands::Validate) => {
            let command = commands::ValidateCommand::new(options);
            command.execute().await
        }
    };

    if let Err(e) = result {
        let code = commands::exit_code(&e);
        tracing::error!("{:#}", e);
        std::process::exit(code);
    }

    Ok(())
}

fn setup_logging(verbose: u8, quiet: u8) {
    let log_level = match (verbose, quiet) {
        (0, 0) => "info",
        (1, 0) => "debug",
        (_, 0) => "trace",
        (0, 1) => "warn",
        (0, 2) => "error",
        (0, _) => "off",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
