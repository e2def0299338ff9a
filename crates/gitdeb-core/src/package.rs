//! Source package metadata read from `debian/changelog`

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name and version of the source package being staged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Source package name (`Source:` field)
    pub source: String,

    /// Full Debian version, possibly with epoch and revision
    pub version: String,
}

impl PackageMetadata {
    /// Create metadata, rejecting empty fields
    pub fn new(source: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let source = source.into().trim().to_string();
        let version = version.into().trim().to_string();

        if source.is_empty() {
            return Err(Error::config("changelog has an empty Source field"));
        }
        if source.contains('/') || source.starts_with('.') {
            return Err(Error::config(format!("invalid source package name: {source}")));
        }
        if version.is_empty() {
            return Err(Error::config(format!("changelog for {source} has an empty Version field")));
        }

        Ok(Self { source, version })
    }

    /// Version without epoch and Debian revision
    pub fn upstream_version(&self) -> &str {
        upstream_version(&self.version)
    }

    /// Name of the staging directory dpkg-source expects: `<source>-<upstream>`
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.source, self.upstream_version())
    }
}

/// Strip the epoch (`N:`) and the trailing Debian revision (`-R`) from a version
pub fn upstream_version(version: &str) -> &str {
    let without_epoch = match version.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.chars().all(|c| c.is_ascii_digit()) => {
            rest
        }
        _ => version,
    };

    match without_epoch.rsplit_once('-') {
        Some((upstream, _revision)) if !upstream.is_empty() => upstream,
        _ => without_epoch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_version() {
        assert_eq!(upstream_version("3.16.0-1"), "3.16.0");
        assert_eq!(upstream_version("1:2.0~rc1-3ubuntu1"), "2.0~rc1");
        assert_eq!(upstream_version("2.0-beta-2"), "2.0-beta");
        assert_eq!(upstream_version("1.4"), "1.4");
        assert_eq!(upstream_version("2:1.4"), "1.4");
    }

    #[test]
    fn test_dir_name() {
        let meta = PackageMetadata::new("python3-oq-engine", "3.16.0-1~xenial01").unwrap();
        assert_eq!(meta.dir_name(), "python3-oq-engine-3.16.0");
    }

    #[test]
    fn test_rejects_empty_and_path_like_names() {
        assert!(PackageMetadata::new("", "1.0-1").is_err());
        assert!(PackageMetadata::new("pkg", " ").is_err());
        assert!(PackageMetadata::new("../pkg", "1.0-1").is_err());
    }
}
