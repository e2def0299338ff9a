//! Staging pipeline for gitdeb
//!
//! This crate turns a git work tree into a clean Debian package source
//! directory and runs the packaging tool against it. Every step is a
//! blocking call that finishes before the next one starts; external
//! commands go through the [`ToolRunner`] seam so the pipeline can be
//! exercised without git or dpkg installed.

pub mod artifact;
pub mod debian;
pub mod git;
pub mod progress;
pub mod prompt;
pub mod runner;
pub mod stager;

pub use artifact::{collect_artifacts, REPORT_FILE_NAME};
pub use debian::{describe_deb, packaging_command, read_package_metadata, SOURCE_ONLY_FLAG};
pub use git::{archive_tree, list_submodules};
pub use progress::{NoOpProgress, SpinnerProgress, Stage, StageProgress};
pub use prompt::{Confirm, FixedAnswer, StdinConfirm};
pub use runner::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use stager::{PackageStager, StagingPlan};
