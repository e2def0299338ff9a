//! Nested repository records discovered during export

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An initialized nested repository found under the source root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleRecord {
    /// Submodule name from `.gitmodules`
    pub name: String,

    /// Path relative to the top-level source root
    pub path: PathBuf,

    /// Commit recorded for the submodule in the superproject
    pub commit_id: String,
}

impl SubmoduleRecord {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        commit_id: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), path: path.into(), commit_id: commit_id.into() }
    }

    /// Abbreviated commit id for log output
    pub fn short_id(&self) -> &str {
        let end = self
            .commit_id
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.commit_id.len());
        &self.commit_id[..end]
    }
}

impl fmt::Display for SubmoduleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) @ {}", self.name, self.path.display(), self.short_id())
    }
}
