//! Configuration management for gitdeb
//!
//! This crate handles YAML configuration parsing, environment variable
//! substitution, path resolution and validation.

use std::path::{Component, Path, PathBuf};

use gitdeb_core::error::{Error, Result};
use gitdeb_core::{ExclusionRule, ExclusionSet, RewriteRule};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default configuration file name looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "gitdeb.yaml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the git repository to package
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Scratch directory the package is staged and built in
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,

    /// Changelog used to name the staging directory, relative to `source_root`
    #[serde(default = "default_changelog")]
    pub changelog: PathBuf,

    /// Moves applied after export, in order
    #[serde(default)]
    pub rewrites: Vec<RewriteRule>,

    /// Top-level entries removed after the rewrites
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,

    /// Top-level names exclusions never remove
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,

    /// Debian package build command
    #[serde(default = "default_packaging_tool")]
    pub packaging_tool: String,

    /// Extra arguments always passed to the packaging tool
    #[serde(default = "default_packaging_args")]
    pub packaging_args: Vec<String>,

    /// Clear an existing build root without asking
    #[serde(default)]
    pub always_yes: bool,

    /// Remove the build root when a step after clearing it fails
    #[serde(default)]
    pub cleanup_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            build_root: default_build_root(),
            changelog: default_changelog(),
            rewrites: Vec::new(),
            exclusions: Vec::new(),
            protected: default_protected(),
            packaging_tool: default_packaging_tool(),
            packaging_args: default_packaging_args(),
            always_yes: false,
            cleanup_on_failure: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// Environment variables are expanded, but relative paths are left as
    /// written; call [`Config::resolve_paths`] before using them.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigError {
            message: format!("Failed to read config file {path:?}: {e}"),
        })?;

        let mut config = Self::from_yaml(&content)?;
        config.expand_env_vars()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError { message: format!("Failed to parse YAML: {e}") })
    }

    /// Load `path` if given, otherwise the default file if present, otherwise defaults.
    ///
    /// An explicitly named file that does not exist is an error.
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(working_dir.join(path)),
            None => {
                let default_path = working_dir.join(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::ConfigError {
            message: format!("Failed to serialize config to YAML: {e}"),
        })
    }

    /// Expand environment variables in paths
    fn expand_env_vars(&mut self) -> Result<()> {
        self.source_root = expand_path(&self.source_root)?;
        self.build_root = expand_path(&self.build_root)?;
        self.changelog = expand_path(&self.changelog)?;
        Ok(())
    }

    /// Make `source_root` absolute against `base` and `build_root` against `source_root`
    pub fn resolve_paths(&mut self, base: &Path) {
        self.source_root = normalize(&base.join(&self.source_root));
        self.build_root = normalize(&self.source_root.join(&self.build_root));
    }

    /// Absolute changelog path; meaningful after [`Config::resolve_paths`]
    pub fn changelog_path(&self) -> PathBuf {
        self.source_root.join(&self.changelog)
    }

    /// Compile the exclusion rules together with the protected names
    pub fn exclusion_set(&self) -> Result<ExclusionSet> {
        ExclusionSet::new(&self.exclusions, self.protected.iter().cloned())
    }

    /// Refuse a build root that is the source repository or one of its parents,
    /// since the build root gets deleted wholesale; expects resolved paths
    pub fn check_build_root(&self) -> Result<()> {
        if self.source_root.starts_with(&self.build_root) {
            return Err(Error::ConfigError {
                message: format!(
                    "build_root {:?} must not be the source repository or one of its parents",
                    self.build_root
                ),
            });
        }
        Ok(())
    }

    /// Validate configuration; expects resolved paths
    pub fn validate(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(Error::ConfigError {
                message: format!("Source repository does not exist: {:?}", self.source_root),
            });
        }

        self.check_build_root()?;

        for rule in &self.rewrites {
            rule.validate()?;
        }

        self.exclusion_set()?;

        if self.packaging_tool.trim().is_empty() {
            return Err(Error::ConfigError {
                message: "packaging_tool cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Expand `$VAR` and `${VAR}` references in a path
fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    let env_var_re = Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .map_err(|e| Error::config(format!("Invalid expansion pattern: {e}")))?;

    let mut result = path_str.to_string();
    for cap in env_var_re.captures_iter(&path_str) {
        let Some(var_name) = cap.get(1).or_else(|| cap.get(2)) else {
            continue;
        };
        let var_value = std::env::var(var_name.as_str()).map_err(|_| Error::ConfigError {
            message: format!("Environment variable not found: {}", var_name.as_str()),
        })?;

        result = result.replace(&cap[0], &var_value);
    }

    Ok(PathBuf::from(result))
}

/// Lexically remove `.` and resolve `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_root() -> PathBuf {
    PathBuf::from("build-deb")
}

fn default_changelog() -> PathBuf {
    PathBuf::from("debian/changelog")
}

fn default_protected() -> Vec<String> {
    vec!["debian".to_string()]
}

fn default_packaging_tool() -> String {
    "dpkg-buildpackage".to_string()
}

fn default_packaging_args() -> Vec<String> {
    vec!["-us".to_string(), "-uc".to_string()]
}
