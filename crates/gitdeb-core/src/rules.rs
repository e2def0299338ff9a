//! Post-export rewrite and exclusion rules

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Move `from` to `to`, both relative to the staging directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl RewriteRule {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self { from: from.into(), to: to.into() }
    }

    /// Both sides must stay inside the staging directory
    pub fn validate(&self) -> Result<()> {
        for path in [&self.from, &self.to] {
            if !is_contained_relative(path) {
                return Err(Error::config(format!(
                    "rewrite paths must be relative and must not leave the staging directory: {path:?}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from.display(), self.to.display())
    }
}

/// Relative, no `..`, and naming at least one entry
fn is_contained_relative(path: &Path) -> bool {
    let mut names = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => names += 1,
            Component::CurDir => {}
            _ => return false,
        }
    }
    names > 0
}

/// Predicate over the name of a top-level staged entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Exact file or directory name
    Name(String),

    /// Shell-style wildcard (`*` and `?`)
    Glob(String),

    /// Regular expression matched against the whole name
    Regex(String),
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "name {name}"),
            Self::Glob(glob) => write!(f, "glob {glob}"),
            Self::Regex(re) => write!(f, "regex {re}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Pattern(re) => re.is_match(name),
        }
    }
}

/// Compiled exclusion rules plus the allow-list of names they never remove
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    matchers: Vec<Matcher>,
    protected: BTreeSet<String>,
}

impl ExclusionSet {
    /// Compile `rules`; fails on an invalid regular expression
    pub fn new<I, S>(rules: &[ExclusionRule], protected: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matchers = rules
            .iter()
            .map(|rule| match rule {
                ExclusionRule::Name(name) => Ok(Matcher::Exact(name.clone())),
                ExclusionRule::Glob(glob) => compile(&glob_to_regex(glob), rule),
                ExclusionRule::Regex(re) => compile(&format!("^(?:{re})$"), rule),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { matchers, protected: protected.into_iter().map(Into::into).collect() })
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }

    /// True if any rule matches, ignoring the allow-list
    pub fn matches(&self, name: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(name))
    }

    /// True if the entry should be deleted from the staging directory
    pub fn should_remove(&self, name: &str) -> bool {
        !self.is_protected(name) && self.matches(name)
    }
}

fn compile(pattern: &str, rule: &ExclusionRule) -> Result<Matcher> {
    Regex::new(pattern)
        .map(Matcher::Pattern)
        .map_err(|e| Error::config(format!("invalid exclusion rule ({rule}): {e}")))
}

fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    pattern
}
