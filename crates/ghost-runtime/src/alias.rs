//! User-defined command aliases.
//!
//! Aliases live in `<root>/commands.json` as a flat name to template map.
//! A template is a host-shell command line; its expansion is handed to the
//! passthrough step, never back into the registry. A template may contain
//! at most one `{placeholder}` token; on use it is replaced by the
//! invocation arguments joined with spaces. Without a placeholder the
//! arguments are appended instead.
//!
//! Aliases are consulted only after the command registry misses, so a
//! registered command always shadows an alias of the same name.

use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name to expansion map, persisted as JSON.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AliasTable {
    #[serde(skip)]
    path: PathBuf,
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    /// Loads the table from `path`. A missing file yields an empty table.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let path = path.into();
        let mut table = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| RuntimeError::io(&path, e))?;
            serde_json::from_str::<Self>(&raw)?
        } else {
            Self::default()
        };
        table.path = path;
        Ok(table)
    }

    /// Persists the table atomically to its backing file.
    pub fn save(&self) -> Result<(), RuntimeError> {
        let body = serde_json::to_string_pretty(self)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| RuntimeError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| RuntimeError::io(&self.path, e))?;
        Ok(())
    }

    /// Expands `name` with `args`, or `None` when no such alias exists.
    ///
    /// The first `{word}` token in the expansion is substituted with the
    /// arguments joined by spaces. Without one the arguments are appended.
    #[must_use]
    pub fn expand(&self, name: &str, args: &[String]) -> Option<String> {
        let template = self.entries.get(name)?;
        let joined = args.join(" ");

        let expanded = match find_placeholder(template) {
            Some(token) => template.replacen(token, &joined, 1),
            None if joined.is_empty() => template.clone(),
            None => format!("{template} {joined}"),
        };
        Some(expanded.trim().to_string())
    }

    pub fn set(&mut self, name: impl Into<String>, expansion: impl Into<String>) {
        self.entries.insert(name.into(), expansion.into());
    }

    /// Removes an alias, returning whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Finds the first single-word `{placeholder}` token in a template.
fn find_placeholder(template: &str) -> Option<&str> {
    template
        .split_whitespace()
        .find(|t| t.len() > 2 && t.starts_with('{') && t.ends_with('}'))
}
