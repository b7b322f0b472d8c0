//! Script files on disk: metadata, loading and caching, and the approval-gated
//! run pipeline.

pub mod loader;
pub mod metadata;
pub mod runner;

pub use loader::{SCRIPT_EXTENSION, ScriptLoader};
pub use runner::ScriptRunner;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A parsed script file. Immutable once loaded; a reload replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    pub name: String,
    pub path: PathBuf,
    #[serde(skip)]
    pub source: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
}

impl Script {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        let source = source.into();
        let parsed = metadata::parse(&source);
        Self {
            name: name.into(),
            path: path.into(),
            source,
            description: parsed.description,
            metadata: parsed.entries,
        }
    }

    /// File name the approval gate is asked about.
    pub fn file_name(&self) -> String {
        format!("{}.{SCRIPT_EXTENSION}", self.name)
    }

    /// Secret names declared via `@secrets` or `@secret`, comma separated.
    pub fn required_secrets(&self) -> Vec<String> {
        ["secrets", "secret"]
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}
