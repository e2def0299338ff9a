//! Core types and error taxonomy for gitdeb
//!
//! This crate provides the data model shared by the configuration loader,
//! the staging pipeline and the command line front end.

pub mod error;
pub mod package;
pub mod report;
pub mod request;
pub mod rules;
pub mod submodule;

pub use error::{Error, Result};
pub use package::PackageMetadata;
pub use report::{ArtifactKind, BuildArtifact, StagingReport};
pub use request::StagingRequest;
pub use rules::{ExclusionRule, ExclusionSet, RewriteRule};
pub use submodule::SubmoduleRecord;
